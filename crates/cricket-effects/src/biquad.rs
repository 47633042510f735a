//! Biquad filter processor with RBJ cookbook coefficients.
//!
//! # Theory
//!
//! A biquad is a second-order IIR section, run here in Direct Form I with
//! independent history per stereo channel:
//!
//! ```text
//! y[n] = (b0/a0)·x[n] + (b1/a0)·x[n-1] + (b2/a0)·x[n-2]
//!      - (a1/a0)·y[n-1] - (a2/a0)·y[n-2]
//! ```
//!
//! Coefficients follow Robert Bristow-Johnson's "Audio EQ Cookbook" with
//!
//! ```text
//! w0 = 2π·freq/fs    alpha = sin(w0)/(2Q)    A = 10^(gain/40)
//! ```
//!
//! The fixed-point path stores the normalized coefficients as 8.24 and
//! accumulates each output in 64 bits before shifting back down.
//!
//! Coefficients are recomputed lazily on the next process call after any
//! parameter or sample-rate change.

use cricket_core::{EffectProcessor, Fixed8_24};

/// Filter type id for [`BiquadFilter::PARAM_TYPE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BiquadType {
    /// Attenuates above the cutoff.
    #[default]
    LowPass = 0,
    /// Attenuates below the cutoff.
    HighPass = 1,
    /// Passes a band around the center frequency.
    BandPass = 2,
    /// Rejects a band around the center frequency.
    Notch = 3,
    /// Boosts or cuts around the center frequency.
    Peak = 4,
    /// Boosts or cuts below the corner frequency.
    LowShelf = 5,
    /// Boosts or cuts above the corner frequency.
    HighShelf = 6,
}

impl BiquadType {
    /// All filter types in id order.
    pub const ALL: [BiquadType; 7] = [
        BiquadType::LowPass,
        BiquadType::HighPass,
        BiquadType::BandPass,
        BiquadType::Notch,
        BiquadType::Peak,
        BiquadType::LowShelf,
        BiquadType::HighShelf,
    ];

    /// Filter type for a parameter value, truncated and clamped to the
    /// valid range.
    pub fn from_param(value: f32) -> Self {
        let index = (value as i32).clamp(0, 6) as usize;
        Self::ALL[index]
    }

    /// Lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            BiquadType::LowPass => "lowpass",
            BiquadType::HighPass => "highpass",
            BiquadType::BandPass => "bandpass",
            BiquadType::Notch => "notch",
            BiquadType::Peak => "peak",
            BiquadType::LowShelf => "lowshelf",
            BiquadType::HighShelf => "highshelf",
        }
    }

    /// Parses a lowercase name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// Normalized coefficients `[b0, b1, b2, a1, a2]`, all divided by `a0`.
pub fn coefficients(kind: BiquadType, freq: f32, q: f32, gain_db: f32, sample_rate: f32) -> [f32; 5] {
    let w0 = core::f32::consts::TAU * freq / sample_rate;
    let cos_w0 = libm::cosf(w0);
    let sin_w0 = libm::sinf(w0);
    let alpha = sin_w0 / (2.0 * q);
    let a = libm::powf(10.0, gain_db / 40.0);

    let (b0, b1, b2, a0, a1, a2) = match kind {
        BiquadType::LowPass => {
            let b0 = (1.0 - cos_w0) * 0.5;
            (b0, 1.0 - cos_w0, b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
        }
        BiquadType::HighPass => {
            let b0 = (1.0 + cos_w0) * 0.5;
            (b0, -(1.0 + cos_w0), b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
        }
        BiquadType::BandPass => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
        BiquadType::Notch => (1.0, -2.0 * cos_w0, 1.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
        BiquadType::Peak => (
            1.0 + alpha * a,
            -2.0 * cos_w0,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w0,
            1.0 - alpha / a,
        ),
        BiquadType::LowShelf => {
            let x = 2.0 * libm::sqrtf(a) * alpha;
            (
                a * ((a + 1.0) - (a - 1.0) * cos_w0 + x),
                2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                a * ((a + 1.0) - (a - 1.0) * cos_w0 - x),
                (a + 1.0) + (a - 1.0) * cos_w0 + x,
                -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                (a + 1.0) + (a - 1.0) * cos_w0 - x,
            )
        }
        BiquadType::HighShelf => {
            let x = 2.0 * libm::sqrtf(a) * alpha;
            (
                a * ((a + 1.0) + (a - 1.0) * cos_w0 + x),
                -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                a * ((a + 1.0) + (a - 1.0) * cos_w0 - x),
                (a + 1.0) - (a - 1.0) * cos_w0 + x,
                2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                (a + 1.0) - (a - 1.0) * cos_w0 - x,
            )
        }
    };

    [b0 / a0, b1 / a0, b2 / a0, a1 / a0, a2 / a0]
}

/// Stereo biquad filter.
///
/// ## Parameters
///
/// | Id | Name | Range | Default |
/// |----|------|-------|---------|
/// | 0 | Type | 0–6 ([`BiquadType`]) | LowPass |
/// | 1 | Freq | > 0.01 Hz | 2000 Hz |
/// | 2 | Q | > 0.01 | 1.0 |
/// | 3 | Gain | dB (peak and shelves) | 1.0 dB |
///
/// # Example
///
/// ```rust
/// use cricket_core::EffectProcessor;
/// use cricket_effects::{BiquadFilter, BiquadType};
///
/// let mut filter = BiquadFilter::new();
/// filter.set_sample_rate(44100.0);
/// filter.set_param(BiquadFilter::PARAM_TYPE, BiquadType::HighPass as u8 as f32);
/// filter.set_param(BiquadFilter::PARAM_FREQ, 200.0);
///
/// let mut buf = [0.5f32; 64];
/// filter.process_float(&mut buf);
/// assert!(buf.iter().all(|s| s.is_finite()));
/// ```
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    kind: BiquadType,
    freq: f32,
    q: f32,
    gain_db: f32,
    sample_rate: f32,
    dirty: bool,
    coeffs: [f32; 5],
    coeffs_fixed: [i64; 5],
    /// `[x1, x2, y1, y2]` per channel.
    history: [[f32; 4]; 2],
    history_fixed: [[i64; 4]; 2],
}

impl Default for BiquadFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl BiquadFilter {
    /// Filter type parameter.
    pub const PARAM_TYPE: u32 = 0;
    /// Frequency parameter (Hz).
    pub const PARAM_FREQ: u32 = 1;
    /// Q parameter.
    pub const PARAM_Q: u32 = 2;
    /// Gain parameter (dB).
    pub const PARAM_GAIN: u32 = 3;

    /// Creates a low-pass filter at 2 kHz, Q 1.
    pub fn new() -> Self {
        Self {
            kind: BiquadType::LowPass,
            freq: 2000.0,
            q: 1.0,
            gain_db: 1.0,
            sample_rate: 44100.0,
            dirty: true,
            coeffs: [0.0; 5],
            coeffs_fixed: [0; 5],
            history: [[0.0; 4]; 2],
            history_fixed: [[0; 4]; 2],
        }
    }

    /// Current filter type.
    pub fn kind(&self) -> BiquadType {
        self.kind
    }

    /// Current frequency in Hz.
    pub fn freq(&self) -> f32 {
        self.freq
    }

    /// Current Q.
    pub fn q(&self) -> f32 {
        self.q
    }

    /// Current gain in dB.
    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    fn update_coeffs(&mut self) {
        if self.dirty {
            self.coeffs = coefficients(self.kind, self.freq, self.q, self.gain_db, self.sample_rate);
            for (f, c) in self.coeffs_fixed.iter_mut().zip(self.coeffs) {
                *f = i64::from(Fixed8_24::from_f32(c));
            }
            self.dirty = false;
        }
    }
}

impl EffectProcessor for BiquadFilter {
    fn set_param(&mut self, id: u32, value: f32) {
        match id {
            Self::PARAM_TYPE => self.kind = BiquadType::from_param(value),
            Self::PARAM_FREQ => self.freq = value.max(0.01),
            Self::PARAM_Q => self.q = value.max(0.01),
            Self::PARAM_GAIN => self.gain_db = value,
            _ => {
                #[cfg(feature = "tracing")]
                tracing::error!(id, "biquad filter: unknown param id");
                return;
            }
        }
        self.dirty = true;
    }

    fn reset(&mut self) {
        self.history = [[0.0; 4]; 2];
        self.history_fixed = [[0; 4]; 2];
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.dirty = true;
    }

    fn process_fixed(&mut self, buf: &mut [i32]) {
        self.update_coeffs();
        let [b0, b1, b2, a1, a2] = self.coeffs_fixed;
        for frame in buf.chunks_exact_mut(2) {
            for (s, h) in frame.iter_mut().zip(self.history_fixed.iter_mut()) {
                let x0 = i64::from(*s);
                let y0 = (b0 * x0 + b1 * h[0] + b2 * h[1] - a1 * h[2] - a2 * h[3]) >> 24;
                *s = y0 as i32;
                *h = [x0, h[0], y0, h[2]];
            }
        }
    }

    fn process_float(&mut self, buf: &mut [f32]) {
        self.update_coeffs();
        let [b0, b1, b2, a1, a2] = self.coeffs;
        for frame in buf.chunks_exact_mut(2) {
            for (s, h) in frame.iter_mut().zip(self.history.iter_mut()) {
                let x0 = *s;
                let y0 = b0 * x0 + b1 * h[0] + b2 * h[1] - a1 * h[2] - a2 * h[3];
                *s = y0;
                *h = [x0, h[0], y0, h[2]];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let f = BiquadFilter::new();
        assert_eq!(f.kind(), BiquadType::LowPass);
        assert_eq!(f.freq(), 2000.0);
        assert_eq!(f.q(), 1.0);
        assert_eq!(f.gain_db(), 1.0);
    }

    #[test]
    fn params_are_clamped() {
        let mut f = BiquadFilter::new();
        f.set_param(BiquadFilter::PARAM_TYPE, 42.0);
        assert_eq!(f.kind(), BiquadType::HighShelf);
        f.set_param(BiquadFilter::PARAM_TYPE, -3.0);
        assert_eq!(f.kind(), BiquadType::LowPass);
        f.set_param(BiquadFilter::PARAM_FREQ, 0.0);
        assert_eq!(f.freq(), 0.01);
        f.set_param(BiquadFilter::PARAM_Q, -1.0);
        assert_eq!(f.q(), 0.01);
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut f = BiquadFilter::new();
        f.set_sample_rate(44100.0);
        let mut buf = vec![0.5f32; 2 * 4096];
        f.process_float(&mut buf);
        let tail = &buf[buf.len() - 2..];
        assert!((tail[0] - 0.5).abs() < 1e-3);
        assert!((tail[1] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn highpass_blocks_dc_in_fixed_point() {
        let mut f = BiquadFilter::new();
        f.set_sample_rate(44100.0);
        f.set_param(BiquadFilter::PARAM_TYPE, 1.0);
        f.set_param(BiquadFilter::PARAM_FREQ, 500.0);
        let mut buf = vec![1 << 23; 2 * 8192];
        f.process_fixed(&mut buf);
        let tail = buf[buf.len() - 1];
        assert!(tail.abs() < 1 << 12, "residual {tail}");
    }

    #[test]
    fn reset_clears_history() {
        let mut f = BiquadFilter::new();
        let mut buf = [1.0f32; 32];
        f.process_float(&mut buf);
        f.reset();
        let mut silent = [0.0f32; 8];
        f.process_float(&mut silent);
        assert!(silent.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn names_round_trip() {
        for t in BiquadType::ALL {
            assert_eq!(BiquadType::from_name(t.name()), Some(t));
        }
    }
}
