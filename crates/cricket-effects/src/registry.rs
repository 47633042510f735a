//! Effect registry and factory.
//!
//! Built-in processors are selected by [`EffectKind`]. Applications add their
//! own processors under integer ids; the registry owns the factories and
//! hands out fresh boxed processors on request.
//!
//! # Example
//!
//! ```rust
//! use cricket_core::EffectProcessor;
//! use cricket_effects::{EffectKind, EffectRegistry};
//!
//! struct Mute;
//!
//! impl EffectProcessor for Mute {
//!     fn set_param(&mut self, _id: u32, _value: f32) {}
//!     fn reset(&mut self) {}
//!     fn process_fixed(&mut self, buf: &mut [i32]) { buf.fill(0) }
//!     fn process_float(&mut self, buf: &mut [f32]) { buf.fill(0.0) }
//! }
//!
//! let mut registry = EffectRegistry::new();
//! registry.register_custom(7, |_| Box::new(Mute));
//!
//! let filter = registry.create(EffectKind::BiquadFilter, 48000.0);
//! let mute = registry.create_custom(7, 48000.0);
//! assert!(mute.is_some());
//! assert!(registry.create_custom(8, 48000.0).is_none());
//! # let _ = filter;
//! ```

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec::Vec};

use cricket_core::EffectProcessor;

use crate::{BiquadFilter, BitCrusher, Distortion, RingMod};

/// Built-in processor kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    /// [`BiquadFilter`].
    BiquadFilter,
    /// [`BitCrusher`].
    BitCrusher,
    /// [`RingMod`].
    RingMod,
    /// [`Distortion`].
    Distortion,
}

impl EffectKind {
    /// All built-in kinds.
    pub const ALL: [EffectKind; 4] = [
        EffectKind::BiquadFilter,
        EffectKind::BitCrusher,
        EffectKind::RingMod,
        EffectKind::Distortion,
    ];

    /// Describes this kind.
    pub const fn descriptor(self) -> EffectDescriptor {
        match self {
            EffectKind::BiquadFilter => EffectDescriptor {
                id: "biquad",
                name: "Biquad Filter",
                description: "RBJ biquad with seven filter types",
                param_count: 4,
            },
            EffectKind::BitCrusher => EffectDescriptor {
                id: "bitcrusher",
                name: "Bit Crusher",
                description: "Bit depth masking with sample-and-hold",
                param_count: 2,
            },
            EffectKind::RingMod => EffectDescriptor {
                id: "ringmod",
                name: "Ring Modulator",
                description: "Carrier multiplication with a parabolic sine",
                param_count: 1,
            },
            EffectKind::Distortion => EffectDescriptor {
                id: "distortion",
                name: "Distortion",
                description: "Cubic soft clipper with drive and offset",
                param_count: 2,
            },
        }
    }

    /// Looks a kind up by its descriptor id.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.descriptor().id == id)
    }
}

/// Describes a built-in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectDescriptor {
    /// Unique identifier (lowercase, no spaces).
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description.
    pub description: &'static str,
    /// Number of parameters.
    pub param_count: usize,
}

/// Factory for a custom processor, called with the graph sample rate.
pub type EffectFactory = fn(f32) -> Box<dyn EffectProcessor>;

struct CustomEntry {
    id: u32,
    factory: EffectFactory,
}

/// Registry of built-in and custom effect processors.
pub struct EffectRegistry {
    custom: Vec<CustomEntry>,
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectRegistry {
    /// Creates a registry with no custom processors.
    pub fn new() -> Self {
        Self { custom: Vec::new() }
    }

    /// Creates a built-in processor configured for `sample_rate`.
    pub fn create(&self, kind: EffectKind, sample_rate: f32) -> Box<dyn EffectProcessor> {
        let mut processor: Box<dyn EffectProcessor> = match kind {
            EffectKind::BiquadFilter => Box::new(BiquadFilter::new()),
            EffectKind::BitCrusher => Box::new(BitCrusher::new()),
            EffectKind::RingMod => Box::new(RingMod::new()),
            EffectKind::Distortion => Box::new(Distortion::new()),
        };
        processor.set_sample_rate(sample_rate);
        processor
    }

    /// Registers a custom processor factory under `id`, replacing any
    /// previous registration.
    pub fn register_custom(&mut self, id: u32, factory: EffectFactory) {
        if let Some(entry) = self.custom.iter_mut().find(|e| e.id == id) {
            #[cfg(feature = "tracing")]
            tracing::info!(id, "replacing custom effect");
            entry.factory = factory;
        } else {
            self.custom.push(CustomEntry { id, factory });
        }
    }

    /// Removes the custom processor registered under `id`.
    pub fn unregister_custom(&mut self, id: u32) -> bool {
        match self.custom.iter().position(|e| e.id == id) {
            Some(index) => {
                self.custom.swap_remove(index);
                true
            }
            None => {
                #[cfg(feature = "tracing")]
                tracing::warn!(id, "unregistering unknown custom effect");
                false
            }
        }
    }

    /// Whether a custom processor is registered under `id`.
    pub fn has_custom(&self, id: u32) -> bool {
        self.custom.iter().any(|e| e.id == id)
    }

    /// Creates a custom processor, or `None` when `id` is not registered.
    pub fn create_custom(&self, id: u32, sample_rate: f32) -> Option<Box<dyn EffectProcessor>> {
        let Some(entry) = self.custom.iter().find(|e| e.id == id) else {
            #[cfg(feature = "tracing")]
            tracing::error!(id, "no custom effect registered");
            return None;
        };
        let mut processor = (entry.factory)(sample_rate);
        processor.set_sample_rate(sample_rate);
        Some(processor)
    }

    /// Ids of all registered custom processors, in registration order
    /// except where removals reordered them.
    pub fn custom_ids(&self) -> Vec<u32> {
        self.custom.iter().map(|e| e.id).collect()
    }

    /// Removes every custom registration.
    pub fn clear_custom(&mut self) {
        self.custom.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gain(f32);

    impl EffectProcessor for Gain {
        fn set_param(&mut self, _id: u32, value: f32) {
            self.0 = value;
        }
        fn reset(&mut self) {}
        fn process_fixed(&mut self, _buf: &mut [i32]) {}
        fn process_float(&mut self, buf: &mut [f32]) {
            for s in buf {
                *s *= self.0;
            }
        }
    }

    fn half(_sr: f32) -> Box<dyn EffectProcessor> {
        Box::new(Gain(0.5))
    }

    fn quarter(_sr: f32) -> Box<dyn EffectProcessor> {
        Box::new(Gain(0.25))
    }

    #[test]
    fn builtin_ids_are_unique() {
        for kind in EffectKind::ALL {
            assert_eq!(EffectKind::from_id(kind.descriptor().id), Some(kind));
        }
        assert_eq!(EffectKind::from_id("reverb"), None);
    }

    #[test]
    fn custom_registration_replaces() {
        let mut registry = EffectRegistry::new();
        registry.register_custom(3, half);
        registry.register_custom(3, quarter);
        assert_eq!(registry.custom_ids(), vec![3]);

        let mut effect = registry.create_custom(3, 44100.0).unwrap();
        let mut buf = [1.0f32; 2];
        effect.process_float(&mut buf);
        assert_eq!(buf, [0.25, 0.25]);
    }

    #[test]
    fn unknown_custom_ids() {
        let mut registry = EffectRegistry::new();
        assert!(registry.create_custom(9, 44100.0).is_none());
        assert!(!registry.unregister_custom(9));
        registry.register_custom(9, half);
        assert!(registry.unregister_custom(9));
        assert!(!registry.has_custom(9));
    }

    #[test]
    fn builtins_process() {
        let registry = EffectRegistry::new();
        for kind in EffectKind::ALL {
            let mut effect = registry.create(kind, 48000.0);
            let mut buf = [0.25f32; 64];
            effect.process_float(&mut buf);
            assert!(buf.iter().all(|s| s.is_finite()), "{kind:?}");
        }
    }
}
