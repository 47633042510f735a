//! Buffer format conversion.
//!
//! | From | To | Rule |
//! |------|----|------|
//! | f32 | 8.24 | `trunc(x * 2^24)` |
//! | 8.24 | f32 | `x / 2^24` |
//! | 8.24 | i16 | `x >> 9` |
//! | i16 | 8.24 | `x << 9` |
//! | i16 | f32 | `x / 32767` |
//! | f32 | i16 | `trunc(x * 32767)` |
//! | i8 | f32 | `x / 127` |
//! | i8 | 8.24 | `x << 17` |
//!
//! Conversions to i16 do not clamp; clamp first if the input may exceed
//! full scale. Input and output are distinct slices and the first
//! `min(input.len(), output.len())` samples are converted.

use crate::sample::Sample;

/// Converts 16-bit PCM into the session representation.
pub fn from_i16<T: Sample>(input: &[i16], output: &mut [T]) {
    for (o, &i) in output.iter_mut().zip(input) {
        *o = T::from_i16(i);
    }
}

/// Converts 8-bit PCM into the session representation.
pub fn from_i8<T: Sample>(input: &[i8], output: &mut [T]) {
    for (o, &i) in output.iter_mut().zip(input) {
        *o = T::from_i8(i);
    }
}

/// Converts float samples into the session representation.
pub fn from_f32<T: Sample>(input: &[f32], output: &mut [T]) {
    for (o, &i) in output.iter_mut().zip(input) {
        *o = T::from_f32(i);
    }
}

/// Converts session samples to float.
pub fn to_f32<T: Sample>(input: &[T], output: &mut [f32]) {
    for (o, &i) in output.iter_mut().zip(input) {
        *o = i.to_f32();
    }
}

/// Converts session samples to 16-bit PCM.
pub fn to_i16<T: Sample>(input: &[T], output: &mut [i16]) {
    for (o, &i) in output.iter_mut().zip(input) {
        *o = i.to_i16();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i16_through_fixed_is_lossless() {
        let pcm = [i16::MIN, -1, 0, 1, 12345, i16::MAX];
        let mut fixed = [0i32; 6];
        let mut back = [0i16; 6];
        from_i16(&pcm, &mut fixed);
        to_i16(&fixed, &mut back);
        assert_eq!(back, pcm);
    }

    #[test]
    fn float_to_fixed_table() {
        let mut fixed = [0i32; 3];
        from_f32(&[1.0, -0.5, 0.25], &mut fixed);
        assert_eq!(fixed, [1 << 24, -(1 << 23), 1 << 22]);

        let mut float = [0.0f32; 3];
        to_f32(&fixed, &mut float);
        assert_eq!(float, [1.0, -0.5, 0.25]);
    }

    #[test]
    fn i8_scaling() {
        let mut float = [0.0f32; 2];
        from_i8(&[127, -127], &mut float);
        assert_eq!(float, [1.0, -1.0]);

        let mut fixed = [0i32; 1];
        from_i8(&[1], &mut fixed);
        assert_eq!(fixed, [1 << 17]);
    }

    #[test]
    fn float_to_i16_truncates() {
        let mut pcm = [0i16; 3];
        to_i16(&[1.0f32, -1.0, 0.99999], &mut pcm);
        assert_eq!(pcm, [32767, -32767, 32766]);
    }
}
