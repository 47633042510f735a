//! Sample representations.
//!
//! A mixing session runs entirely in one representation, chosen at startup:
//!
//! | Representation | Rust type | Full scale | Clamp range |
//! |----------------|-----------|------------|-------------|
//! | Fixed point | `i32` (8.24) | `1 << 24` | `±((1 << 24) - 1)` |
//! | Floating point | `f32` | `1.0` | `±1.0` |
//!
//! Every DSP primitive and graph node is generic over [`Sample`], so the
//! two signal paths share one implementation of the control logic and only
//! the per-sample arithmetic differs.

use core::fmt::Debug;
use core::ops::{Add, Sub};

use crate::fixed::Fixed8_24;
use crate::processor::EffectProcessor;
use crate::resample;

/// Representation selected for a mixing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    /// 8.24 fixed point in `i32`.
    Fixed,
    /// 32-bit float.
    Float,
}

impl SampleType {
    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            SampleType::Fixed => "fixed-point",
            SampleType::Float => "floating-point",
        }
    }
}

/// Arithmetic a sample representation provides to the mixing pipeline.
///
/// Gains are carried as [`Sample::Coeff`], so a fixed-point ramp accumulates
/// 8.24 increments exactly as the integer pipeline would, rather than
/// round-tripping through float each frame.
pub trait Sample:
    Copy + Default + PartialEq + PartialOrd + Debug + Send + Sync + 'static
{
    /// Gain coefficient type.
    type Coeff: Copy + PartialEq + Debug + Add<Output = Self::Coeff> + Sub<Output = Self::Coeff>;

    /// Silence.
    const ZERO: Self;

    /// Which representation this is.
    const TYPE: SampleType;

    /// Converts a normalized float sample (truncating for fixed point).
    fn from_f32(value: f32) -> Self;

    /// Converts to a normalized float sample.
    fn to_f32(self) -> f32;

    /// Converts a 16-bit PCM sample.
    fn from_i16(value: i16) -> Self;

    /// Converts an 8-bit PCM sample.
    fn from_i8(value: i8) -> Self;

    /// Converts to 16-bit PCM (no clamping).
    fn to_i16(self) -> i16;

    /// Gain coefficient for `gain`.
    fn coeff(gain: f32) -> Self::Coeff;

    /// Gain coefficient back to float.
    fn coeff_to_f32(coeff: Self::Coeff) -> f32;

    /// `self * coeff`.
    fn scale(self, coeff: Self::Coeff) -> Self;

    /// `self + other`.
    fn mix(self, other: Self) -> Self;

    /// `a * ca + b * cb`, formed at full precision before narrowing.
    fn weighted_sum(a: Self, ca: Self::Coeff, b: Self, cb: Self::Coeff) -> Self;

    /// Hard-limits to the representable range; the flag reports clipping.
    fn clip(self) -> (Self, bool);

    /// Linear resampling of interleaved `channels`-channel frames.
    ///
    /// See [`crate::resample`] for the interpolation contract. `last` holds
    /// one frame of carried input per channel.
    fn resample(
        last: &mut [Self; 2],
        input: &[Self],
        in_frames: usize,
        output: &mut [Self],
        out_frames: usize,
        channels: usize,
    );

    /// Runs `processor` over `buf` in place on this representation's path.
    fn run_effect(processor: &mut dyn EffectProcessor, buf: &mut [Self]);

    /// Runs `processor` from `input` into `output`.
    fn run_effect_to(processor: &mut dyn EffectProcessor, input: &[Self], output: &mut [Self]);
}

/// Largest fixed-point sample magnitude after clamping.
pub const FIXED_MAX: i32 = (1 << 24) - 1;

impl Sample for i32 {
    type Coeff = i32;

    const ZERO: Self = 0;
    const TYPE: SampleType = SampleType::Fixed;

    #[inline]
    fn from_f32(value: f32) -> Self {
        (value * (1 << 24) as f32) as i32
    }

    #[inline]
    fn to_f32(self) -> f32 {
        self as f32 * (1.0 / (1 << 24) as f32)
    }

    #[inline]
    fn from_i16(value: i16) -> Self {
        i32::from(value) << 9
    }

    #[inline]
    fn from_i8(value: i8) -> Self {
        i32::from(value) << 17
    }

    #[inline]
    fn to_i16(self) -> i16 {
        (self >> 9) as i16
    }

    #[inline]
    fn coeff(gain: f32) -> i32 {
        Fixed8_24::from_f32(gain)
    }

    #[inline]
    fn coeff_to_f32(coeff: i32) -> f32 {
        Fixed8_24::to_f32(coeff)
    }

    #[inline]
    fn scale(self, coeff: i32) -> Self {
        ((i64::from(self) * i64::from(coeff)) >> 24) as i32
    }

    #[inline]
    fn mix(self, other: Self) -> Self {
        self.wrapping_add(other)
    }

    #[inline]
    fn weighted_sum(a: Self, ca: i32, b: Self, cb: i32) -> Self {
        ((i64::from(a) * i64::from(ca) + i64::from(b) * i64::from(cb)) >> 24) as i32
    }

    #[inline]
    fn clip(self) -> (Self, bool) {
        if self > FIXED_MAX {
            (FIXED_MAX, true)
        } else if self < -FIXED_MAX {
            (-FIXED_MAX, true)
        } else {
            (self, false)
        }
    }

    fn resample(
        last: &mut [Self; 2],
        input: &[Self],
        in_frames: usize,
        output: &mut [Self],
        out_frames: usize,
        channels: usize,
    ) {
        resample::linear_fixed(last, input, in_frames, output, out_frames, channels);
    }

    fn run_effect(processor: &mut dyn EffectProcessor, buf: &mut [Self]) {
        processor.process_fixed(buf);
    }

    fn run_effect_to(processor: &mut dyn EffectProcessor, input: &[Self], output: &mut [Self]) {
        processor.process_fixed_to(input, output);
    }
}

impl Sample for f32 {
    type Coeff = f32;

    const ZERO: Self = 0.0;
    const TYPE: SampleType = SampleType::Float;

    #[inline]
    fn from_f32(value: f32) -> Self {
        value
    }

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_i16(value: i16) -> Self {
        f32::from(value) / 32767.0
    }

    #[inline]
    fn from_i8(value: i8) -> Self {
        f32::from(value) / 127.0
    }

    #[inline]
    fn to_i16(self) -> i16 {
        (self * 32767.0) as i16
    }

    #[inline]
    fn coeff(gain: f32) -> f32 {
        gain
    }

    #[inline]
    fn coeff_to_f32(coeff: f32) -> f32 {
        coeff
    }

    #[inline]
    fn scale(self, coeff: f32) -> Self {
        self * coeff
    }

    #[inline]
    fn mix(self, other: Self) -> Self {
        self + other
    }

    #[inline]
    fn weighted_sum(a: Self, ca: f32, b: Self, cb: f32) -> Self {
        a * ca + b * cb
    }

    #[inline]
    fn clip(self) -> (Self, bool) {
        if self > 1.0 {
            (1.0, true)
        } else if self < -1.0 {
            (-1.0, true)
        } else {
            (self, false)
        }
    }

    fn resample(
        last: &mut [Self; 2],
        input: &[Self],
        in_frames: usize,
        output: &mut [Self],
        out_frames: usize,
        channels: usize,
    ) {
        resample::linear_float(last, input, in_frames, output, out_frames, channels);
    }

    fn run_effect(processor: &mut dyn EffectProcessor, buf: &mut [Self]) {
        processor.process_float(buf);
    }

    fn run_effect_to(processor: &mut dyn EffectProcessor, input: &[Self], output: &mut [Self]) {
        processor.process_float_to(input, output);
    }
}
