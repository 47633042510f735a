//! Ring modulator with a parabolic sine approximation.
//!
//! # Theory
//!
//! Ring modulation multiplies the input by a carrier, producing sum and
//! difference frequencies `f_in ± f_carrier` while suppressing both originals.
//!
//! The carrier is a sine approximated by a parabola over one period:
//!
//! ```text
//! sin(φ) ≈ φ · (B + C·|φ|)    B = 4/π    C = -4/π²    φ ∈ [-π, π]
//! ```
//!
//! The phase advances by `2π · f / fs` per frame and wraps at π. The
//! approximation's peak error is about 5.6%, inaudible next to the
//! sidebands ring modulation creates.
//!
//! The fixed-point path carries the phase and both coefficients in 8.24.

use core::f32::consts::PI;

use cricket_core::{EffectProcessor, Fixed8_24};

const B: f32 = 4.0 / PI;
const C: f32 = -4.0 / (PI * PI);

/// Stereo ring modulator.
///
/// ## Parameters
///
/// | Id | Name | Range | Default |
/// |----|------|-------|---------|
/// | 0 | Freq | ≥ 0 Hz | 500 Hz |
///
/// A carrier frequency of zero disables the processor.
#[derive(Debug, Clone)]
pub struct RingMod {
    freq: f32,
    sample_rate: f32,
    phase: f32,
    phase_inc: f32,
    phase_fixed: i64,
    phase_inc_fixed: i64,
}

impl Default for RingMod {
    fn default() -> Self {
        Self::new()
    }
}

impl RingMod {
    /// Carrier frequency parameter (Hz).
    pub const PARAM_FREQ: u32 = 0;

    /// Creates a ring modulator with a 500 Hz carrier.
    pub fn new() -> Self {
        let mut ring = Self {
            freq: 500.0,
            sample_rate: 44100.0,
            phase: 0.0,
            phase_inc: 0.0,
            phase_fixed: 0,
            phase_inc_fixed: 0,
        };
        ring.update_increment();
        ring
    }

    /// Current carrier frequency in Hz.
    pub fn freq(&self) -> f32 {
        self.freq
    }

    fn update_increment(&mut self) {
        self.phase_inc = 2.0 * PI * self.freq / self.sample_rate;
        self.phase_inc_fixed = i64::from(Fixed8_24::from_f32(self.phase_inc));
    }
}

impl EffectProcessor for RingMod {
    fn set_param(&mut self, id: u32, value: f32) {
        if id == Self::PARAM_FREQ {
            self.freq = value.max(0.0);
            self.update_increment();
        } else {
            #[cfg(feature = "tracing")]
            tracing::error!(id, "ring mod: unknown param id");
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
        self.phase_fixed = 0;
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_increment();
    }

    fn process_fixed(&mut self, buf: &mut [i32]) {
        if self.freq == 0.0 {
            return;
        }
        let b = i64::from(Fixed8_24::from_f32(B));
        let c = i64::from(Fixed8_24::from_f32(C));
        let pi = i64::from(Fixed8_24::from_f32(PI));
        let two_pi = i64::from(Fixed8_24::from_f32(2.0 * PI));

        for frame in buf.chunks_exact_mut(2) {
            let phase = self.phase_fixed;
            let slope = b + ((c * phase.abs()) >> 24);
            let carrier = (phase * slope) >> 24;
            for s in frame.iter_mut() {
                *s = ((i64::from(*s) * carrier) >> 24) as i32;
            }
            self.phase_fixed += self.phase_inc_fixed;
            while self.phase_fixed > pi {
                self.phase_fixed -= two_pi;
            }
        }
    }

    fn process_float(&mut self, buf: &mut [f32]) {
        if self.freq == 0.0 {
            return;
        }
        for frame in buf.chunks_exact_mut(2) {
            let carrier = self.phase * (B + C * libm::fabsf(self.phase));
            frame[0] *= carrier;
            frame[1] *= carrier;
            self.phase += self.phase_inc;
            while self.phase > PI {
                self.phase -= 2.0 * PI;
            }
        }
    }
}
