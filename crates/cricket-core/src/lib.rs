//! Cricket Core - mixing DSP primitives
//!
//! The signal-level building blocks of the cricket mixing engine. Everything
//! here is allocation-free on the audio path and generic over the session's
//! sample representation.
//!
//! # Core Abstractions
//!
//! ## Sample Representations
//!
//! - [`Sample`] - Arithmetic shared by the 8.24 fixed-point (`i32`) and
//!   float (`f32`) pipelines
//! - [`FixedPoint`] - 8.24 and 16.16 fixed-point helpers
//!
//! ## Buffer Operations
//!
//! - [`convert`] - Format conversion among float, 8.24, i16 and i8
//! - [`mix`] - Summing, weighted mixing, scaling, stereo upmix, clamping
//! - [`equal_power_gains`] - Wet/dry crossfade curve
//!
//! ## Panning
//!
//! - [`VolumeMatrix`] - 2×2 stereo gain matrix with equal-power and balance pan
//! - [`stereo_pan`], [`mono_pan`] - Matrix application with linear ramping
//!
//! ## Resampling and Codecs
//!
//! - [`resample`] - Linear resampler with carried state
//! - [`adpcm`] - 4-bit ADPCM block codec and predictor-search encoder
//!
//! ## Effects
//!
//! - [`EffectProcessor`] - Trait for processors run by effect buses
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible. Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! cricket-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use cricket_core::{VolumeMatrix, mono_pan, volume_rate};
//!
//! let mono = [0.5f32; 64];
//! let mut stereo = [0.0f32; 128];
//! let mut current = VolumeMatrix::IDENTITY;
//! let mut target = VolumeMatrix::IDENTITY;
//! target.set_pan(-1.0);
//!
//! let rate = volume_rate(1.0, 44100.0);
//! mono_pan(&mono, &mut stereo, 64, &target, &mut current, rate);
//! assert_eq!(current, target);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod adpcm;
pub mod convert;
pub mod fixed;
pub mod mix;
pub mod processor;
pub mod resample;
pub mod sample;
pub mod volume;

pub use adpcm::AdpcmEncoder;
pub use fixed::{Fixed8_24, Fixed16_16, FixedPoint};
pub use mix::{clamp, clamp_in_place, equal_power_gains, mix_vol};
pub use processor::EffectProcessor;
pub use sample::{FIXED_MAX, Sample, SampleType};
pub use volume::{
    VOLUME_TOLERANCE, VolumeMatrix, mono_pan, ramp_frames, stereo_pan, stereo_pan_static,
    volume_rate,
};
