//! Bitcrusher: bit depth masking with sample-and-hold rate reduction.
//!
//! # Theory
//!
//! Samples are quantized by clearing the low bits of their 8.24 fixed-point
//! representation:
//!
//! ```text
//! shift = 24 - bits
//! mask  = 0xffff_ffff << shift
//! y     = x & mask
//! ```
//!
//! Masking truncates toward negative infinity, so a crushed signal carries a
//! small negative DC offset of roughly half an output step.
//!
//! Rate reduction is a zero-order hold: a quantized frame is latched and
//! repeated for `hold_frames = floor(fs · hold_ms / 1000)` frames before the
//! next input frame is sampled. The hold countdown spans process calls.

use cricket_core::EffectProcessor;

const FIXED_ONE: f32 = (1 << 24) as f32;

/// Stereo bitcrusher.
///
/// ## Parameters
///
/// | Id | Name | Range | Default |
/// |----|------|-------|---------|
/// | 0 | Bits | 1–24 | 8 |
/// | 1 | Hold | ≥ 0 ms | 1 ms |
///
/// With 24 bits and a zero hold the processor passes audio through
/// untouched.
#[derive(Debug, Clone)]
pub struct BitCrusher {
    bits: u32,
    hold_ms: f32,
    sample_rate: f32,
    hold_frames: u32,
    hold_left: u32,
    held: [i32; 2],
}

impl Default for BitCrusher {
    fn default() -> Self {
        Self::new()
    }
}

impl BitCrusher {
    /// Bit depth parameter.
    pub const PARAM_BITS: u32 = 0;
    /// Hold time parameter (ms).
    pub const PARAM_HOLD_MS: u32 = 1;

    /// Creates a bitcrusher at 8 bits with a 1 ms hold.
    pub fn new() -> Self {
        let mut crusher = Self {
            bits: 8,
            hold_ms: 1.0,
            sample_rate: 44100.0,
            hold_frames: 0,
            hold_left: 0,
            held: [0; 2],
        };
        crusher.update_hold();
        crusher
    }

    /// Current bit depth.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Current hold time in milliseconds.
    pub fn hold_ms(&self) -> f32 {
        self.hold_ms
    }

    /// Frames each sampled value is held for.
    pub fn hold_frames(&self) -> u32 {
        self.hold_frames
    }

    fn update_hold(&mut self) {
        self.hold_frames = (self.sample_rate * self.hold_ms * 0.001) as u32;
    }

    fn shift(&self) -> u32 {
        24 - self.bits
    }

    fn mask(&self) -> i32 {
        (u32::MAX << self.shift()) as i32
    }

    fn is_bypassed(&self) -> bool {
        self.hold_frames == 0 && self.shift() == 0
    }

    /// Runs the hold state machine over stereo frames, mapping samples in
    /// and out of 8.24 through `to_fixed`/`from_fixed`.
    fn crush<S: Copy>(&mut self, buf: &mut [S], to_fixed: impl Fn(S) -> i32, from_fixed: impl Fn(i32) -> S) {
        let mask = self.mask();
        for frame in buf.chunks_exact_mut(2) {
            if self.hold_left > 0 {
                self.hold_left -= 1;
            } else {
                self.held = [to_fixed(frame[0]) & mask, to_fixed(frame[1]) & mask];
                self.hold_left = self.hold_frames;
            }
            frame[0] = from_fixed(self.held[0]);
            frame[1] = from_fixed(self.held[1]);
        }
    }
}

impl EffectProcessor for BitCrusher {
    fn set_param(&mut self, id: u32, value: f32) {
        match id {
            Self::PARAM_BITS => self.bits = (value as i32).clamp(1, 24) as u32,
            Self::PARAM_HOLD_MS => {
                self.hold_ms = value.max(0.0);
                self.update_hold();
            }
            _ => {
                #[cfg(feature = "tracing")]
                tracing::error!(id, "bitcrusher: unknown param id");
            }
        }
    }

    fn reset(&mut self) {
        self.hold_left = 0;
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_hold();
    }

    fn process_fixed(&mut self, buf: &mut [i32]) {
        if !self.is_bypassed() {
            self.crush(buf, |s| s, |s| s);
        }
    }

    fn process_float(&mut self, buf: &mut [f32]) {
        if !self.is_bypassed() {
            self.crush(buf, |s| (s * FIXED_ONE) as i32, |s| s as f32 / FIXED_ONE);
        }
    }
}
