//! Test tone source.

use super::AudioSource;
use crate::format::{AudioFormat, SampleInfo};

/// Endless PCM16 sine wave.
///
/// The period is rounded to a whole number of samples so the waveform
/// repeats exactly; the actual frequency is `sample_rate / period`.
pub struct SineSource {
    info: SampleInfo,
    period: usize,
    pos: usize,
}

impl SineSource {
    /// Tone of roughly `freq_hz` at `sample_rate` Hz.
    pub fn new(channels: u8, sample_rate: u16, freq_hz: f32) -> Self {
        let period = (f32::from(sample_rate) / freq_hz.max(f32::MIN_POSITIVE)).round().max(1.0) as usize;
        let mut info = SampleInfo::new(AudioFormat::PcmI16, channels, sample_rate, 0);
        info.blocks = -1;
        Self { info, period, pos: 0 }
    }

    /// Samples per cycle.
    pub fn period(&self) -> usize {
        self.period
    }
}

impl AudioSource for SineSource {
    fn is_inited(&self) -> bool {
        true
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn is_failed(&self) -> bool {
        false
    }

    fn sample_info(&self) -> Option<SampleInfo> {
        Some(self.info)
    }

    fn read(&mut self, buf: &mut [u8], blocks: usize) -> usize {
        let channels = usize::from(self.info.channels);
        let frame_bytes = 2 * channels;
        let frames = blocks.min(buf.len() / frame_bytes);
        let step = std::f32::consts::TAU / self.period as f32;
        for frame in buf[..frames * frame_bytes].chunks_exact_mut(frame_bytes) {
            let value = (self.pos as f32 * step).sin();
            let sample = ((value * f32::from(i16::MAX)) as i16).to_le_bytes();
            for ch in frame.chunks_exact_mut(2) {
                ch.copy_from_slice(&sample);
            }
            self.pos = (self.pos + 1) % self.period;
        }
        frames
    }

    fn block_pos(&self) -> usize {
        self.pos
    }

    fn set_block_pos(&mut self, block: usize) {
        self.pos = block % self.period;
    }

    fn num_blocks(&self) -> Option<usize> {
        None
    }

    fn set_loop(&mut self, _start: i32, _end: i32) {}

    fn loop_bounds(&self) -> (i32, i32) {
        (0, -1)
    }

    fn set_loop_count(&mut self, _count: i32) {}

    fn loop_count(&self) -> i32 {
        -1
    }

    fn current_loop(&self) -> i32 {
        0
    }

    fn release_loop(&mut self) {}

    fn is_loop_released(&self) -> bool {
        false
    }

    fn is_done(&self) -> bool {
        false
    }

    fn reset(&mut self) {
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_is_whole_samples() {
        let src = SineSource::new(1, 44100, 1000.0);
        assert_eq!(src.period(), 44);
    }

    #[test]
    fn repeats_every_period() {
        let mut src = SineSource::new(2, 8000, 1000.0);
        let mut buf = vec![0u8; 16 * 4];
        assert_eq!(src.read(&mut buf, 16), 16);
        let samples: Vec<i16> = buf
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples[0], 0);
        // quarter period peak, both channels equal
        assert_eq!(samples[4], i16::MAX);
        assert_eq!(samples[5], i16::MAX);
        assert_eq!(&samples[..16], &samples[16..]);
        assert!(!src.is_done());
    }
}
