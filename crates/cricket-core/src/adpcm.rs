//! Microsoft-style 4-bit ADPCM.
//!
//! Each channel is coded in independent blocks of [`FRAMES_PER_BLOCK`]
//! samples packed into [`BYTES_PER_BLOCK`] bytes:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 1 | predictor index (0..7) |
//! | 1 | 2 | step size (`i16` LE) |
//! | 3 | 2 | first sample (`i16` LE, verbatim) |
//! | 5 | 2 | second sample (`i16` LE, verbatim) |
//! | 7 | 17 | 34 nibbles, low nibble first |
//!
//! A stereo block is the channel 0 block followed by the channel 1 block.
//!
//! Prediction uses 8.8 coefficient pairs over the two previous samples:
//!
//! ```text
//! pred = (s1·c1 + s2·c2) / 256
//! ```
//!
//! The step size adapts after every nibble through a 16-entry table and never
//! drops below 16.
//!
//! # Reference
//!
//! "Microsoft Multimedia Standards Update", 1992 (the `WAVE_FORMAT_ADPCM`
//! description).

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Samples per channel in one block.
pub const FRAMES_PER_BLOCK: usize = 36;

/// Encoded bytes per channel in one block.
pub const BYTES_PER_BLOCK: usize = 24;

/// Bytes before the nibble data.
const HEADER_BYTES: usize = 7;

/// Initial step size for a fresh encoder channel.
pub const INITIAL_DELTA: i16 = 2048;

/// Smallest step size.
pub const MIN_DELTA: i16 = 16;

/// 8.8 predictor coefficient pairs `(c1, c2)`.
pub const COEFFS: [(i32, i32); 7] = [
    (256, 0),    // repeat last sample
    (512, -256), // linear extrapolation
    (0, 0),      // silence
    (192, 64),
    (240, 0),
    (460, -208),
    (392, -232),
];

/// Number of predictors.
pub const NUM_PREDICTORS: usize = COEFFS.len();

const ADAPTATION: [i32; 16] = [
    230, 230, 230, 230, 307, 409, 512, 614, 768, 614, 512, 409, 307, 230, 230, 230,
];

#[inline]
fn adapt(delta: i16, code: usize) -> i16 {
    let next = (i32::from(delta) * ADAPTATION[code] / 256) as i16;
    if next < MIN_DELTA { MIN_DELTA } else { next }
}

#[inline]
fn predict(s1: i16, s2: i16, predictor: usize) -> i32 {
    let (c1, c2) = COEFFS[predictor];
    (i32::from(s1) * c1 + i32::from(s2) * c2) / 256
}

/// Encodes one channel block.
///
/// Reads `FRAMES_PER_BLOCK` samples from `input` at `stride` (1 for mono,
/// 2 for one channel of interleaved stereo) and writes `BYTES_PER_BLOCK`
/// bytes. `delta` is the starting step size and receives the final one.
pub fn encode_block(
    input: &[i16],
    stride: usize,
    output: &mut [u8],
    predictor: usize,
    delta: &mut i16,
) -> usize {
    debug_assert!(predictor < NUM_PREDICTORS);
    debug_assert!(input.len() > (FRAMES_PER_BLOCK - 1) * stride);
    debug_assert!(output.len() >= BYTES_PER_BLOCK);

    let mut d = (*delta).max(MIN_DELTA);
    let mut s2 = input[0];
    let mut s1 = input[stride];

    output[0] = predictor as u8;
    output[1..3].copy_from_slice(&d.to_le_bytes());
    output[3..5].copy_from_slice(&s2.to_le_bytes());
    output[5..7].copy_from_slice(&s1.to_le_bytes());

    let mut samples = input.iter().step_by(stride).skip(2).take(FRAMES_PER_BLOCK - 2);
    for byte in &mut output[HEADER_BYTES..BYTES_PER_BLOCK] {
        let mut packed = 0u8;
        for nibble in 0..2 {
            let x = i32::from(samples.next().copied().unwrap_or(0));
            let pred = predict(s1, s2, predictor);
            let code = ((x - pred) / i32::from(d)).clamp(-8, 7);
            packed |= ((code & 0xf) as u8) << (nibble * 4);

            let decoded = (pred + i32::from(d) * code).clamp(i32::from(i16::MIN), i32::from(i16::MAX));
            d = adapt(d, (code & 0xf) as usize);
            s2 = s1;
            s1 = decoded as i16;
        }
        *byte = packed;
    }

    *delta = d;
    BYTES_PER_BLOCK
}

/// Decodes one channel block into `FRAMES_PER_BLOCK` samples written at
/// `stride`. Returns the number of samples decoded.
pub fn decode_block(input: &[u8], output: &mut [i16], stride: usize) -> usize {
    debug_assert!(input.len() >= BYTES_PER_BLOCK);
    debug_assert!(output.len() > (FRAMES_PER_BLOCK - 1) * stride);

    let predictor = usize::from(input[0]).min(NUM_PREDICTORS - 1);
    let mut d = i16::from_le_bytes([input[1], input[2]]).max(MIN_DELTA);
    let mut s2 = i16::from_le_bytes([input[3], input[4]]);
    let mut s1 = i16::from_le_bytes([input[5], input[6]]);

    output[0] = s2;
    output[stride] = s1;

    let mut out = 2 * stride;
    for &byte in &input[HEADER_BYTES..BYTES_PER_BLOCK] {
        for nibble in 0..2 {
            let code = usize::from((byte >> (nibble * 4)) & 0xf);
            let signed = if code & 0x8 != 0 { code as i32 - 16 } else { code as i32 };
            let pred = predict(s1, s2, predictor) + i32::from(d) * signed;
            let sample = pred.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
            output[out] = sample;
            out += stride;

            d = adapt(d, code);
            s2 = s1;
            s1 = sample;
        }
    }

    FRAMES_PER_BLOCK
}

/// Blocks needed for `frames` frames (the last block is zero-padded).
pub fn block_count(frames: usize) -> usize {
    frames.div_ceil(FRAMES_PER_BLOCK)
}

/// Encoded size of `frames` frames of `channels` channels.
pub fn encoded_len(frames: usize, channels: usize) -> usize {
    block_count(frames) * BYTES_PER_BLOCK * channels
}

fn mean_sq_diff(a: &[i16], stride: usize, b: &[i16]) -> f32 {
    let sum: f32 = a
        .iter()
        .step_by(stride)
        .zip(b)
        .map(|(&x, &y)| {
            let d = f32::from(x) - f32::from(y);
            d * d
        })
        .sum();
    sum / FRAMES_PER_BLOCK as f32
}

/// Streaming encoder with per-block predictor search.
///
/// For every block and channel, each predictor is tried from the channel's
/// current step size; the block is decoded again and the predictor with the
/// lowest mean squared error wins (ties keep the lower index). The winner's
/// final step size carries into the channel's next block.
///
/// # Example
///
/// ```rust
/// use cricket_core::adpcm::{AdpcmEncoder, encoded_len};
///
/// let pcm: Vec<i16> = (0..100).map(|i| (i * 50) as i16).collect();
/// let mut enc = AdpcmEncoder::new(1);
/// let mut out = Vec::new();
/// enc.encode(&pcm, &mut out);
/// enc.finish(&mut out);
/// assert_eq!(out.len(), encoded_len(100, 1));
/// ```
#[derive(Debug, Clone)]
pub struct AdpcmEncoder {
    channels: usize,
    delta: [i16; 2],
    pending: Vec<i16>,
    candidate: [u8; BYTES_PER_BLOCK],
    best: [u8; BYTES_PER_BLOCK],
    decoded: [i16; FRAMES_PER_BLOCK],
}

impl AdpcmEncoder {
    /// Creates an encoder for 1 or 2 interleaved channels.
    pub fn new(channels: usize) -> Self {
        assert!(channels == 1 || channels == 2, "ADPCM supports 1 or 2 channels");
        Self {
            channels,
            delta: [INITIAL_DELTA; 2],
            pending: Vec::with_capacity(FRAMES_PER_BLOCK * channels),
            candidate: [0; BYTES_PER_BLOCK],
            best: [0; BYTES_PER_BLOCK],
            decoded: [0; FRAMES_PER_BLOCK],
        }
    }

    /// Channel count.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Appends interleaved frames, emitting every completed block.
    pub fn encode(&mut self, input: &[i16], output: &mut Vec<u8>) {
        let block_samples = FRAMES_PER_BLOCK * self.channels;
        let mut rest = input;
        while !rest.is_empty() {
            let take = (block_samples - self.pending.len()).min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.pending.len() == block_samples {
                self.flush_block(output);
            }
        }
    }

    /// Zero-pads and emits a final partial block, if any.
    pub fn finish(&mut self, output: &mut Vec<u8>) {
        if !self.pending.is_empty() {
            self.pending.resize(FRAMES_PER_BLOCK * self.channels, 0);
            self.flush_block(output);
        }
    }

    fn flush_block(&mut self, output: &mut Vec<u8>) {
        for ch in 0..self.channels {
            self.best_encoding(ch);
            output.extend_from_slice(&self.best);
        }
        self.pending.clear();
    }

    fn best_encoding(&mut self, ch: usize) {
        let input = &self.pending[ch..];
        let mut best_err = f32::INFINITY;
        let mut best_delta = self.delta[ch];
        for predictor in 0..NUM_PREDICTORS {
            let mut delta = self.delta[ch];
            encode_block(input, self.channels, &mut self.candidate, predictor, &mut delta);
            decode_block(&self.candidate, &mut self.decoded, 1);
            let err = mean_sq_diff(input, self.channels, &self.decoded);
            if err < best_err {
                best_err = err;
                best_delta = delta;
                self.best = self.candidate;
            }
        }
        self.delta[ch] = best_delta;

        #[cfg(feature = "tracing")]
        tracing::trace!(channel = ch, mse = best_err, "adpcm block");
    }
}

/// Encodes a whole interleaved buffer.
pub fn encode(input: &[i16], channels: usize) -> Vec<u8> {
    let mut enc = AdpcmEncoder::new(channels);
    let mut out = Vec::with_capacity(encoded_len(input.len() / channels, channels));
    enc.encode(input, &mut out);
    enc.finish(&mut out);
    out
}

/// Decodes whole blocks of interleaved data.
pub fn decode(input: &[u8], channels: usize) -> Vec<i16> {
    let block_bytes = BYTES_PER_BLOCK * channels;
    let blocks = input.len() / block_bytes;
    let mut out = Vec::new();
    out.resize(blocks * FRAMES_PER_BLOCK * channels, 0i16);
    for (b, block) in input.chunks_exact(block_bytes).enumerate() {
        let frames = &mut out[b * FRAMES_PER_BLOCK * channels..];
        for ch in 0..channels {
            decode_block(&block[ch * BYTES_PER_BLOCK..], &mut frames[ch..], channels);
        }
    }
    out
}
