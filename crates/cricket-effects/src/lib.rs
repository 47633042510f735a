//! Cricket Effects - built-in effect processors
//!
//! Stereo processors run by cricket effect buses. Each implements
//! [`cricket_core::EffectProcessor`] with matching 8.24 fixed-point and float
//! paths, operating in place on interleaved stereo buffers.
//!
//! # Available Processors
//!
//! - [`BiquadFilter`] - RBJ biquad with seven [`BiquadType`]s
//! - [`BitCrusher`] - Bit depth masking with sample-and-hold
//! - [`RingMod`] - Ring modulation by a parabolic sine carrier
//! - [`Distortion`] - Cubic soft clipper
//!
//! Processors are created through an [`EffectRegistry`], which also holds
//! application-defined processors registered under integer ids.
//!
//! Parameters are addressed by integer id; each processor documents its ids
//! as associated `PARAM_*` constants. Unknown ids are ignored and logged.
//!
//! # Example
//!
//! ```rust
//! use cricket_core::EffectProcessor;
//! use cricket_effects::{Distortion, EffectKind, EffectRegistry};
//!
//! let registry = EffectRegistry::new();
//! let mut dist = registry.create(EffectKind::Distortion, 44100.0);
//! dist.set_param(Distortion::PARAM_DRIVE, 3.0);
//!
//! let mut buf = [0.1f32, -0.1, 0.2, -0.2];
//! dist.process_float(&mut buf);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod biquad;
pub mod bitcrusher;
pub mod distortion;
pub mod registry;
pub mod ring_mod;

pub use biquad::{BiquadFilter, BiquadType};
pub use bitcrusher::BitCrusher;
pub use distortion::Distortion;
pub use registry::{EffectDescriptor, EffectFactory, EffectKind, EffectRegistry};
pub use ring_mod::RingMod;
