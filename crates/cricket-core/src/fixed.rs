//! Fixed-point arithmetic for the integer signal path.
//!
//! Two formats are used throughout the engine:
//!
//! - [`Fixed8_24`]: signed 8.24, the sample and gain format of the fixed-point
//!   pipeline. `1.0` is `1 << 24`, leaving 7 bits of headroom above full scale.
//! - [`Fixed16_16`]: signed 16.16, used for resampler phase accumulation.
//!
//! Products are formed in 64 bits and shifted back down, so multiplying two
//! in-range values never overflows the intermediate.

/// Signed fixed-point format with `FRAC` fractional bits stored in an `i32`.
///
/// This is a namespace type; values are plain `i32`s so they can live in
/// sample buffers without wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPoint<const FRAC: u32>;

impl<const FRAC: u32> FixedPoint<FRAC> {
    /// Number of fractional bits.
    pub const FRAC_BITS: u32 = FRAC;

    /// The value `1.0`.
    pub const ONE: i32 = 1 << FRAC;

    /// Converts a float, rounding half away from zero.
    #[inline]
    pub fn from_f32(value: f32) -> i32 {
        let scaled = value * Self::ONE as f32;
        if value >= 0.0 {
            (scaled + 0.5) as i32
        } else {
            (scaled - 0.5) as i32
        }
    }

    /// Converts back to a float.
    #[inline]
    pub fn to_f32(value: i32) -> f32 {
        value as f32 / Self::ONE as f32
    }

    /// Converts an integer to fixed point.
    #[inline]
    pub fn from_int(value: i32) -> i32 {
        value << FRAC
    }

    /// Integer part, truncated toward negative infinity.
    #[inline]
    pub fn to_int(value: i32) -> i32 {
        value >> FRAC
    }

    /// Fractional bits only.
    #[inline]
    pub fn frac(value: i32) -> i32 {
        value & (Self::ONE - 1)
    }

    /// Multiplies two fixed-point values.
    #[inline]
    pub fn mul(a: i32, b: i32) -> i32 {
        ((i64::from(a) * i64::from(b)) >> FRAC) as i32
    }

    /// Divides two fixed-point values. `b` must be nonzero.
    #[inline]
    pub fn div(a: i32, b: i32) -> i32 {
        ((i64::from(a) << FRAC) / i64::from(b)) as i32
    }
}

/// 8.24 fixed point: sample and gain format of the integer pipeline.
pub type Fixed8_24 = FixedPoint<24>;

/// 16.16 fixed point: resampler phase.
pub type Fixed16_16 = FixedPoint<16>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_round_trips() {
        assert_eq!(Fixed8_24::from_f32(1.0), 1 << 24);
        assert_eq!(Fixed8_24::to_f32(Fixed8_24::ONE), 1.0);
        assert_eq!(Fixed16_16::from_f32(1.0), 1 << 16);
    }

    #[test]
    fn rounds_half_away_from_zero() {
        // 1.5 LSB either side of zero
        let lsb = 1.0 / (1u32 << 24) as f32;
        assert_eq!(Fixed8_24::from_f32(1.5 * lsb), 2);
        assert_eq!(Fixed8_24::from_f32(-1.5 * lsb), -2);
    }

    #[test]
    fn mul_and_div() {
        let half = Fixed8_24::from_f32(0.5);
        let quarter = Fixed8_24::mul(half, half);
        assert_eq!(quarter, Fixed8_24::from_f32(0.25));
        assert_eq!(Fixed8_24::div(quarter, half), half);

        let neg = Fixed8_24::from_f32(-0.75);
        assert_eq!(Fixed8_24::mul(neg, Fixed8_24::ONE), neg);
    }

    #[test]
    fn int_and_frac_parts() {
        let v = Fixed16_16::from_f32(3.25);
        assert_eq!(Fixed16_16::to_int(v), 3);
        assert_eq!(Fixed16_16::frac(v), 1 << 14);
        assert_eq!(Fixed16_16::from_int(7), 7 << 16);
    }
}
