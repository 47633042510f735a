//! Effect bus handles.

use std::sync::Arc;

use cricket_core::Sample;

use crate::arena::NodeId;
use crate::command::Command;
use crate::effect::Effect;
use crate::graph::AudioGraph;
use crate::node::{BusCommand, EffectBusNode, Node};

/// Control-thread handle to an effect bus.
///
/// A new bus feeds the master mix; [`set_output_bus`](Self::set_output_bus)
/// chains it into another bus instead. Dropping the handle removes the bus:
/// its effects are detached and whatever was routed into it moves to the
/// master mix.
pub struct EffectBus<T: Sample> {
    graph: Arc<AudioGraph<T>>,
    id: NodeId,
    output: Option<NodeId>,
    bypass: bool,
    wet_dry: f32,
    global: bool,
}

impl<T: Sample> EffectBus<T> {
    /// Creates a bus feeding the master mix.
    pub fn new(graph: &Arc<AudioGraph<T>>) -> Self {
        let node = EffectBusNode::new(graph.new_mix_node());
        let id = graph.create_node(Node::EffectBus(Box::new(node)));
        graph.execute(Command::AddInput {
            mix: graph.master(),
            input: id,
        });
        Self {
            graph: Arc::clone(graph),
            id,
            output: None,
            bypass: false,
            wet_dry: 1.0,
            global: false,
        }
    }

    /// Handle to the bus every sound passes through on its way out. It
    /// cannot be rerouted or removed.
    pub fn global(graph: &Arc<AudioGraph<T>>) -> Self {
        Self {
            graph: Arc::clone(graph),
            id: graph.global_bus(),
            output: None,
            bypass: false,
            wet_dry: 1.0,
            global: true,
        }
    }

    /// Node id sounds route to.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Whether this is the global bus.
    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Sends this bus into `output`, or back to the master mix with `None`.
    pub fn set_output_bus(&mut self, output: Option<&EffectBus<T>>) -> bool {
        if self.global {
            tracing::error!("the global effect bus has no output bus");
            return false;
        }
        let target = output.map(EffectBus::id);
        if target == Some(self.id) {
            tracing::error!("an effect bus cannot output to itself");
            return false;
        }
        if output.is_some_and(EffectBus::is_global) {
            tracing::error!("the global effect bus already receives every bus");
            return false;
        }
        let current = self.output_bus();
        if target != current {
            let master = self.graph.master();
            self.graph.execute(Command::RemoveInput {
                mix: current.unwrap_or(master),
                input: self.id,
            });
            self.graph.execute(Command::AddInput {
                mix: target.unwrap_or(master),
                input: self.id,
            });
            self.output = target;
        }
        true
    }

    /// Bus this one feeds, if not the master mix.
    pub fn output_bus(&self) -> Option<NodeId> {
        // A removed output bus hands its inputs to the master mix.
        self.output.filter(|&id| self.graph.is_node_live(id))
    }

    /// Appends `effect` to the chain, taking it off any other bus.
    pub fn add_effect(&mut self, effect: &Effect<T>) {
        self.send(BusCommand::AddEffect(effect.id()));
    }

    /// Removes `effect` from the chain.
    pub fn remove_effect(&mut self, effect: &Effect<T>) {
        self.send(BusCommand::RemoveEffect(effect.id()));
    }

    /// Empties the chain.
    pub fn remove_all_effects(&mut self) {
        self.send(BusCommand::RemoveAllEffects);
    }

    /// Resets every effect in the chain.
    pub fn reset(&mut self) {
        self.send(BusCommand::Reset);
    }

    /// Passes the input through untouched.
    pub fn set_bypassed(&mut self, bypass: bool) {
        self.bypass = bypass;
        self.send(BusCommand::SetBypassed(bypass));
    }

    /// Whether the chain is bypassed.
    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    /// Sets the bus wet/dry ratio, clamped to `[0, 1]`.
    pub fn set_wet_dry_ratio(&mut self, ratio: f32) {
        self.wet_dry = ratio.clamp(0.0, 1.0);
        self.send(BusCommand::SetWetDry(self.wet_dry));
    }

    /// Bus wet/dry ratio.
    pub fn wet_dry_ratio(&self) -> f32 {
        self.wet_dry
    }

    fn send(&self, cmd: BusCommand) {
        self.graph.execute(Command::Bus(self.id, cmd));
    }
}

impl<T: Sample> Drop for EffectBus<T> {
    fn drop(&mut self) {
        if !self.global {
            self.graph.destroy_node(self.id);
        }
    }
}

impl<T: Sample> std::fmt::Debug for EffectBus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectBus")
            .field("id", &self.id)
            .field("output", &self.output)
            .field("bypass", &self.bypass)
            .field("wet_dry", &self.wet_dry)
            .finish_non_exhaustive()
    }
}
