//! Buffer mixing, scaling, upmixing and clamping.
//!
//! All functions operate on interleaved buffers and process the first
//! `min(input.len(), output.len())` samples (or frames, for the stereo
//! upmixers). Gains are plain `f32`; they are converted once per call to
//! the representation's coefficient type.

use crate::sample::Sample;

/// `output += input`.
pub fn mix<T: Sample>(input: &[T], output: &mut [T]) {
    for (o, &i) in output.iter_mut().zip(input) {
        *o = o.mix(i);
    }
}

/// `output = input * in_vol + output * out_vol`.
pub fn mix_vol<T: Sample>(input: &[T], in_vol: f32, output: &mut [T], out_vol: f32) {
    let ci = T::coeff(in_vol);
    let co = T::coeff(out_vol);
    for (o, &i) in output.iter_mut().zip(input) {
        *o = T::weighted_sum(i, ci, *o, co);
    }
}

/// Scales a buffer in place.
pub fn scale<T: Sample>(buf: &mut [T], volume: f32) {
    let c = T::coeff(volume);
    for s in buf.iter_mut() {
        *s = s.scale(c);
    }
}

/// Duplicates each mono sample into a stereo frame.
pub fn convert_to_stereo<T: Sample>(input: &[T], output: &mut [T]) {
    for (frame, &i) in output.chunks_exact_mut(2).zip(input) {
        frame[0] = i;
        frame[1] = i;
    }
}

/// Duplicates each mono sample into a stereo frame, scaled by `volume`.
pub fn convert_to_stereo_scaled<T: Sample>(input: &[T], output: &mut [T], volume: f32) {
    let c = T::coeff(volume);
    for (frame, &i) in output.chunks_exact_mut(2).zip(input) {
        let s = i.scale(c);
        frame[0] = s;
        frame[1] = s;
    }
}

/// Equal-power crossfade gains for a wet/dry `ratio` in `[0, 1]`.
///
/// Returns `(wet, dry)` with `wet² + dry² = 1`:
///
/// ```text
/// wet = sqrt(0.5 - 0.5·cos(π·ratio))
/// dry = sqrt(0.5 + 0.5·cos(π·ratio))
/// ```
pub fn equal_power_gains(ratio: f32) -> (f32, f32) {
    let c = 0.5 * libm::cosf(core::f32::consts::PI * ratio);
    let wet = libm::sqrtf((0.5 - c).max(0.0));
    let dry = libm::sqrtf((0.5 + c).max(0.0));
    (wet, dry)
}

/// Clamps `input` into `output`; returns whether any sample clipped.
pub fn clamp<T: Sample>(input: &[T], output: &mut [T]) -> bool {
    let mut clipped = false;
    for (o, &i) in output.iter_mut().zip(input) {
        let (s, c) = i.clip();
        *o = s;
        clipped |= c;
    }
    clipped
}

/// Clamps a buffer in place; returns whether any sample clipped.
pub fn clamp_in_place<T: Sample>(buf: &mut [T]) -> bool {
    let mut clipped = false;
    for s in buf.iter_mut() {
        let (v, c) = s.clip();
        *s = v;
        clipped |= c;
    }
    clipped
}
