//! Linear-interpolation resampler.
//!
//! Converts `in_frames` interleaved frames to `out_frames` frames. Each call
//! carries one frame of input state per channel so consecutive calls join
//! without a seam.
//!
//! # Interpolation grid
//!
//! Positions are measured in input frames. Position `0` is the carried frame
//! from the previous call and position `k` (for `k >= 1`) is `input[k - 1]`.
//! Output frame `j` is interpolated at position `(j + 1) * in_frames / out_frames`,
//! so the final output frame always lands on the last input frame.
//!
//! Consequences:
//!
//! - At a ratio of exactly 1 the output equals the input.
//! - Splitting a stream into chunks with the same in/out ratio produces the
//!   same output as one call over the whole stream.
//!
//! The fixed-point path advances a 16.16 accumulator; the float path computes
//! each position directly.

use crate::fixed::Fixed16_16;

/// Sample at grid position `pos`, clamped to the last input frame.
#[inline]
fn at<T: Copy>(last: T, input: &[T], in_frames: usize, channels: usize, ch: usize, pos: usize) -> T {
    if pos == 0 {
        last
    } else {
        input[(pos.min(in_frames) - 1) * channels + ch]
    }
}

/// Float resampler. `channels` is 1 or 2.
pub fn linear_float(
    last: &mut [f32; 2],
    input: &[f32],
    in_frames: usize,
    output: &mut [f32],
    out_frames: usize,
    channels: usize,
) {
    debug_assert!(channels == 1 || channels == 2);
    debug_assert!(input.len() >= in_frames * channels);
    debug_assert!(output.len() >= out_frames * channels);

    if out_frames == 0 {
        return;
    }
    if in_frames == 0 {
        for frame in output[..out_frames * channels].chunks_exact_mut(channels) {
            frame.copy_from_slice(&last[..channels]);
        }
        return;
    }
    if in_frames == out_frames {
        output[..out_frames * channels].copy_from_slice(&input[..in_frames * channels]);
    } else {
        let factor = in_frames as f32 / out_frames as f32;
        for j in 0..out_frames {
            let pos = (j + 1) as f32 * factor;
            let i0 = pos as usize;
            let frac = pos - i0 as f32;
            for ch in 0..channels {
                let s0 = at(last[ch], input, in_frames, channels, ch, i0);
                let s1 = at(last[ch], input, in_frames, channels, ch, i0 + 1);
                output[j * channels + ch] = s0 + frac * (s1 - s0);
            }
        }
    }

    let tail = (in_frames - 1) * channels;
    last[..channels].copy_from_slice(&input[tail..tail + channels]);
}

/// 8.24 fixed-point resampler with a 16.16 phase accumulator.
pub fn linear_fixed(
    last: &mut [i32; 2],
    input: &[i32],
    in_frames: usize,
    output: &mut [i32],
    out_frames: usize,
    channels: usize,
) {
    debug_assert!(channels == 1 || channels == 2);
    debug_assert!(input.len() >= in_frames * channels);
    debug_assert!(output.len() >= out_frames * channels);

    if out_frames == 0 {
        return;
    }
    if in_frames == 0 {
        for frame in output[..out_frames * channels].chunks_exact_mut(channels) {
            frame.copy_from_slice(&last[..channels]);
        }
        return;
    }
    if in_frames == out_frames {
        output[..out_frames * channels].copy_from_slice(&input[..in_frames * channels]);
    } else {
        let shift = Fixed16_16::FRAC_BITS;
        let mask = (1u64 << shift) - 1;
        let step = ((in_frames as u64) << shift) / out_frames as u64;
        let mut t = 0u64;
        for j in 0..out_frames {
            t += step;
            let i0 = (t >> shift) as usize;
            let frac = (t & mask) as i64;
            for ch in 0..channels {
                let s0 = at(last[ch], input, in_frames, channels, ch, i0);
                let s1 = at(last[ch], input, in_frames, channels, ch, i0 + 1);
                let delta = i64::from(s1) - i64::from(s0);
                output[j * channels + ch] = s0 + ((frac * delta) >> shift) as i32;
            }
        }
    }

    let tail = (in_frames - 1) * channels;
    last[..channels].copy_from_slice(&input[tail..tail + channels]);
}
