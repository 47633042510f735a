//! Cubic soft-clipping distortion.
//!
//! ```text
//! x = (in + offset) · drive
//! y = x - x³/3
//! ```
//!
//! The cubic is the first two Taylor terms of a soft saturator and stays
//! monotonic on `|x| ≤ 1`, where it peaks at ±2/3. Above that range it folds
//! back, which is the intended character at high drive. A nonzero offset
//! makes the curve asymmetric and adds even harmonics.
//!
//! The processor is stateless. The fixed-point path wraps rather than
//! saturates once `|x|³` leaves the 8.24 range.

use cricket_core::{EffectProcessor, Fixed8_24};

const THIRD: f32 = 0.33333;

/// Stereo cubic distortion.
///
/// ## Parameters
///
/// | Id | Name | Range | Default |
/// |----|------|-------|---------|
/// | 0 | Drive | any | 1.0 |
/// | 1 | Offset | any | 0.0 |
#[derive(Debug, Clone)]
pub struct Distortion {
    drive: f32,
    offset: f32,
}

impl Default for Distortion {
    fn default() -> Self {
        Self::new()
    }
}

impl Distortion {
    /// Drive parameter.
    pub const PARAM_DRIVE: u32 = 0;
    /// DC offset parameter.
    pub const PARAM_OFFSET: u32 = 1;

    /// Creates a distortion with unity drive and no offset.
    pub fn new() -> Self {
        Self { drive: 1.0, offset: 0.0 }
    }

    /// Current drive.
    pub fn drive(&self) -> f32 {
        self.drive
    }

    /// Current offset.
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Shapes a single float sample.
    #[inline]
    pub fn shape(&self, input: f32) -> f32 {
        let x = (input + self.offset) * self.drive;
        x - x * x * x * THIRD
    }
}

impl EffectProcessor for Distortion {
    fn set_param(&mut self, id: u32, value: f32) {
        match id {
            Self::PARAM_DRIVE => self.drive = value,
            Self::PARAM_OFFSET => self.offset = value,
            _ => {
                #[cfg(feature = "tracing")]
                tracing::error!(id, "distortion: unknown param id");
            }
        }
    }

    fn reset(&mut self) {}

    fn process_fixed(&mut self, buf: &mut [i32]) {
        let drive = Fixed8_24::from_f32(self.drive);
        let offset = Fixed8_24::from_f32(self.offset);
        let third = Fixed8_24::from_f32(THIRD);
        for s in buf.iter_mut() {
            let x = Fixed8_24::mul(s.wrapping_add(offset), drive);
            let cube = Fixed8_24::mul(Fixed8_24::mul(x, x), x);
            *s = x.wrapping_sub(Fixed8_24::mul(cube, third));
        }
    }

    fn process_float(&mut self, buf: &mut [f32]) {
        for s in buf.iter_mut() {
            *s = self.shape(*s);
        }
    }
}
