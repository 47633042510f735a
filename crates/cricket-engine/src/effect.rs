//! Effect processors placed on effect buses.
//!
//! An [`Effect`] is the control-thread handle; the processor itself lives in
//! an [`EffectSlot`] on the audio side and is only touched there. Every
//! setter is a command.

use std::sync::Arc;

use cricket_core::{EffectProcessor, Sample};
use cricket_effects::{EffectKind, EffectRegistry};

use crate::arena::{EffectId, NodeId};
use crate::command::Command;
use crate::graph::AudioGraph;

/// Audio-side state of one effect.
pub struct EffectSlot {
    pub(crate) processor: Box<dyn EffectProcessor>,
    pub(crate) bypass: bool,
    pub(crate) wet_dry: f32,
    /// Bus the effect is attached to. Looked up by id, never owned.
    pub(crate) owner: Option<NodeId>,
}

impl EffectSlot {
    pub(crate) fn new(processor: Box<dyn EffectProcessor>) -> Self {
        Self {
            processor,
            bypass: false,
            wet_dry: 1.0,
            owner: None,
        }
    }

    pub(crate) fn apply(&mut self, cmd: EffectCommand) {
        match cmd {
            EffectCommand::SetParam(id, value) => self.processor.set_param(id, value),
            EffectCommand::Reset => self.processor.reset(),
            EffectCommand::SetBypassed(bypass) => {
                if bypass && !self.bypass {
                    self.processor.reset();
                }
                self.bypass = bypass;
            }
            EffectCommand::SetWetDry(ratio) => self.wet_dry = ratio.clamp(0.0, 1.0),
        }
    }
}

/// Operations on an effect slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectCommand {
    /// Sets processor parameter `id`.
    SetParam(u32, f32),
    /// Clears processor state.
    Reset,
    /// Skips the processor; entering bypass also resets it.
    SetBypassed(bool),
    /// Wet/dry ratio in `[0, 1]`.
    SetWetDry(f32),
}

/// Control-thread handle to an effect.
///
/// Dropping the handle detaches the effect from its bus and frees it after
/// the audio thread has let go of it.
pub struct Effect<T: Sample> {
    graph: Arc<AudioGraph<T>>,
    id: EffectId,
    bypass: bool,
    wet_dry: f32,
}

impl<T: Sample> Effect<T> {
    /// Creates a built-in effect.
    pub fn new(graph: &Arc<AudioGraph<T>>, registry: &EffectRegistry, kind: EffectKind) -> Self {
        let processor = registry.create(kind, graph.sample_rate() as f32);
        Self::from_processor(graph, processor)
    }

    /// Creates an effect from a custom processor registered under `id`.
    pub fn custom(graph: &Arc<AudioGraph<T>>, registry: &EffectRegistry, id: u32) -> Option<Self> {
        let processor = registry.create_custom(id, graph.sample_rate() as f32)?;
        Some(Self::from_processor(graph, processor))
    }

    /// Wraps an already configured processor.
    pub fn from_processor(graph: &Arc<AudioGraph<T>>, processor: Box<dyn EffectProcessor>) -> Self {
        let id = graph.create_effect(EffectSlot::new(processor));
        Self {
            graph: Arc::clone(graph),
            id,
            bypass: false,
            wet_dry: 1.0,
        }
    }

    /// Id used by effect buses.
    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Sets processor parameter `param`.
    pub fn set_param(&mut self, param: u32, value: f32) {
        self.send(EffectCommand::SetParam(param, value));
    }

    /// Clears the processor's state.
    pub fn reset(&mut self) {
        self.send(EffectCommand::Reset);
    }

    /// Bypasses the processor.
    pub fn set_bypassed(&mut self, bypass: bool) {
        self.bypass = bypass;
        self.send(EffectCommand::SetBypassed(bypass));
    }

    /// Whether the processor is bypassed.
    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    /// Sets the wet/dry ratio, clamped to `[0, 1]`.
    pub fn set_wet_dry_ratio(&mut self, ratio: f32) {
        self.wet_dry = ratio.clamp(0.0, 1.0);
        self.send(EffectCommand::SetWetDry(self.wet_dry));
    }

    /// Wet/dry ratio.
    pub fn wet_dry_ratio(&self) -> f32 {
        self.wet_dry
    }

    fn send(&self, cmd: EffectCommand) {
        self.graph.execute(Command::Effect(self.id, cmd));
    }
}

impl<T: Sample> Drop for Effect<T> {
    fn drop(&mut self) {
        self.graph.destroy_effect(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gain(f32, u32);

    impl EffectProcessor for Gain {
        fn set_param(&mut self, _id: u32, value: f32) {
            self.0 = value;
        }
        fn reset(&mut self) {
            self.1 += 1;
        }
        fn process_fixed(&mut self, _buf: &mut [i32]) {}
        fn process_float(&mut self, buf: &mut [f32]) {
            buf.iter_mut().for_each(|s| *s *= self.0);
        }
    }

    #[test]
    fn bypass_resets_only_on_entry() {
        let mut slot = EffectSlot::new(Box::new(Gain(1.0, 0)));
        slot.apply(EffectCommand::SetBypassed(true));
        slot.apply(EffectCommand::SetBypassed(true));
        slot.apply(EffectCommand::SetBypassed(false));
        slot.apply(EffectCommand::SetWetDry(3.0));
        assert!(!slot.bypass);
        assert_eq!(slot.wet_dry, 1.0);

        slot.apply(EffectCommand::SetParam(0, 0.5));
        let mut buf = [1.0f32, 1.0];
        f32::run_effect(&mut *slot.processor, &mut buf);
        assert_eq!(buf, [0.5, 0.5]);
    }
}
