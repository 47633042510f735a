//! Effect bus node: an input mix followed by an effect chain.

use cricket_core::{Sample, equal_power_gains, mix_vol};

use super::RenderState;
use super::mix::MixNode;
use crate::arena::{EffectId, NodeId, Slots};
use crate::effect::EffectSlot;
use crate::pool::{BufferHandle, BufferPool};

/// Operations on an effect bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BusCommand {
    /// Appends an effect to the chain (moving it off any other bus).
    AddEffect(EffectId),
    /// Removes an effect from the chain.
    RemoveEffect(EffectId),
    /// Empties the chain.
    RemoveAllEffects,
    /// Resets every effect in the chain.
    Reset,
    /// Passes the input through untouched; entering bypass resets the chain.
    SetBypassed(bool),
    /// Bus wet/dry ratio, clamped to `[0, 1]`.
    SetWetDry(f32),
}

/// Runs the mixed input through an ordered list of effects.
///
/// A wet/dry ratio below 0.99 keeps a copy of the dry signal and crossfades
/// with equal-power gains, per effect and again for the whole bus. A chain
/// whose effects are all bypassed passes the input through untouched.
pub struct EffectBusNode<T> {
    input: MixNode<T>,
    effects: Vec<EffectId>,
    bypass: bool,
    wet_dry: f32,
    prev_active: bool,
}

impl<T: Sample> EffectBusNode<T> {
    pub(crate) fn new(input: MixNode<T>) -> Self {
        Self {
            input,
            effects: Vec::with_capacity(4),
            bypass: false,
            wet_dry: 1.0,
            prev_active: false,
        }
    }

    /// Mix feeding the chain.
    pub fn input(&self) -> &MixNode<T> {
        &self.input
    }

    pub(crate) fn input_mut(&mut self) -> &mut MixNode<T> {
        &mut self.input
    }

    /// Effects in processing order.
    pub fn effects(&self) -> &[EffectId] {
        &self.effects
    }

    /// Whether the chain is bypassed.
    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    /// Bus wet/dry ratio.
    pub fn wet_dry(&self) -> f32 {
        self.wet_dry
    }

    pub(crate) fn apply(
        &mut self,
        self_id: NodeId,
        cmd: BusCommand,
        effects: &mut Slots<EffectSlot>,
    ) -> Option<(NodeId, EffectId)> {
        let mut moved = None;
        match cmd {
            BusCommand::AddEffect(id) => {
                let Some(slot) = effects.get_mut(id.0) else {
                    return None;
                };
                if let Some(owner) = slot.owner.filter(|&o| o != self_id) {
                    moved = Some((owner, id));
                }
                slot.processor.reset();
                slot.owner = Some(self_id);
                if !self.effects.contains(&id) {
                    self.effects.push(id);
                }
            }
            BusCommand::RemoveEffect(id) => {
                self.effects.retain(|&e| e != id);
                if let Some(slot) = effects.get_mut(id.0) {
                    if slot.owner == Some(self_id) {
                        slot.owner = None;
                    }
                }
            }
            BusCommand::RemoveAllEffects => self.release_effects(effects),
            BusCommand::Reset => self.reset(effects),
            BusCommand::SetBypassed(bypass) => {
                if bypass && !self.bypass {
                    self.reset(effects);
                }
                self.bypass = bypass;
            }
            BusCommand::SetWetDry(ratio) => self.wet_dry = ratio.clamp(0.0, 1.0),
        }
        moved
    }

    /// Drops `id` from the chain without touching the slot.
    pub(crate) fn forget_effect(&mut self, id: EffectId) {
        self.effects.retain(|&e| e != id);
    }

    /// Clears the owner of every effect and empties the chain.
    pub(crate) fn release_effects(&mut self, effects: &mut Slots<EffectSlot>) {
        for id in self.effects.drain(..) {
            if let Some(slot) = effects.get_mut(id.0) {
                slot.owner = None;
            }
        }
    }

    fn reset(&self, effects: &mut Slots<EffectSlot>) {
        for id in &self.effects {
            if let Some(slot) = effects.get_mut(id.0) {
                slot.processor.reset();
            }
        }
    }

    pub(crate) fn render(
        &mut self,
        st: &mut RenderState<T>,
        frames: usize,
        post: bool,
        needs_post: &mut bool,
    ) -> Option<BufferHandle> {
        let rendered = self.input.render(st, frames, post, needs_post);
        // post passes only carry chained sources; they say nothing about
        // whether the bus went quiet
        if !post {
            if rendered.is_none() && self.prev_active {
                self.reset(&mut st.effects);
            }
            self.prev_active = rendered.is_some();
        }
        let mut buf = rendered?;

        let bus_wet = self.wet_dry;
        let any_active = self
            .effects
            .iter()
            .any(|id| st.effects.get(id.0).is_some_and(|fx| !fx.bypass));
        if self.bypass || !any_active || bus_wet < 0.01 {
            return Some(buf);
        }

        let n = frames * 2;
        let bus_dry = if bus_wet < 0.99 {
            Some(snapshot(&mut st.pool, buf, n))
        } else {
            None
        };

        for id in &self.effects {
            let Some(fx) = st.effects.get_mut(id.0) else {
                continue;
            };
            if fx.bypass {
                continue;
            }
            let fx_dry = if fx.wet_dry < 0.99 {
                Some(snapshot(&mut st.pool, buf, n))
            } else {
                None
            };

            let out = if fx.processor.is_in_place() {
                T::run_effect(&mut *fx.processor, &mut st.pool.get_mut(buf)[..n]);
                buf
            } else {
                let out = st.pool.acquire();
                let (src, dst) = st.pool.pair_mut(buf, out);
                T::run_effect_to(&mut *fx.processor, &src[..n], &mut dst[..n]);
                st.pool.release(buf);
                out
            };

            if let Some(dry) = fx_dry {
                crossfade(&mut st.pool, dry, out, fx.wet_dry, n);
            }
            buf = out;
        }

        if let Some(dry) = bus_dry {
            crossfade(&mut st.pool, dry, buf, bus_wet, n);
        }
        Some(buf)
    }
}

/// Copies the first `n` samples of `src` into a fresh buffer.
fn snapshot<T: Sample>(pool: &mut BufferPool<T>, src: BufferHandle, n: usize) -> BufferHandle {
    let copy = pool.acquire();
    let (from, to) = pool.pair_mut(src, copy);
    to[..n].copy_from_slice(&from[..n]);
    copy
}

/// `wet_buf = dry · dry_gain + wet_buf · wet_gain`, then releases `dry`.
fn crossfade<T: Sample>(pool: &mut BufferPool<T>, dry: BufferHandle, wet: BufferHandle, ratio: f32, n: usize) {
    let (wet_gain, dry_gain) = equal_power_gains(ratio);
    let (src, dst) = pool.pair_mut(dry, wet);
    mix_vol(&src[..n], dry_gain, &mut dst[..n], wet_gain);
    pool.release(dry);
}
