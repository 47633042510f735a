//! Block-to-sample decoding.
//!
//! PCM formats have one frame per block, so frame and block positions are
//! the same. ADPCM decodes one 36-frame block at a time and keeps the
//! remainder for the next call; seeking lands on a block boundary and skips
//! forward inside the block.

use cricket_core::Sample;
use cricket_core::adpcm::{self, BYTES_PER_BLOCK, FRAMES_PER_BLOCK};

use crate::format::{AudioFormat, SampleInfo};
use crate::source::AudioSource;

#[derive(Debug)]
struct AdpcmState {
    decoded: [i16; FRAMES_PER_BLOCK * 2],
    block: usize,
    offset: usize,
    valid: bool,
}

/// Decoder for one source's format. Holds no reference to the source; every
/// call is handed the source it reads from.
#[derive(Debug)]
pub struct Decoder {
    format: AudioFormat,
    channels: usize,
    block_bytes: usize,
    scratch: Vec<u8>,
    adpcm: AdpcmState,
}

impl Decoder {
    /// Decoder able to produce up to `max_frames` frames per call.
    pub fn new(info: &SampleInfo, max_frames: usize) -> Self {
        let block_bytes = usize::from(info.block_bytes.max(1));
        let scratch_blocks = match info.format {
            AudioFormat::Adpcm => 1,
            _ => max_frames.max(1),
        };
        Self {
            format: info.format,
            channels: usize::from(info.channels.clamp(1, 2)),
            block_bytes,
            scratch: vec![0; scratch_blocks * block_bytes],
            adpcm: AdpcmState {
                decoded: [0; FRAMES_PER_BLOCK * 2],
                block: 0,
                offset: 0,
                valid: false,
            },
        }
    }

    /// Encoding handled.
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Interleaved channels produced.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Decodes up to `frames` frames into `out`. Returns the frames written.
    pub fn decode<T: Sample>(&mut self, source: &mut dyn AudioSource, out: &mut [T], frames: usize) -> usize {
        if self.is_done(source) {
            return 0;
        }
        let frames = frames.min(out.len() / self.channels);
        match self.format {
            AudioFormat::Adpcm => self.decode_adpcm(source, out, frames),
            _ => self.decode_pcm(source, out, frames),
        }
    }

    fn decode_pcm<T: Sample>(&mut self, source: &mut dyn AudioSource, out: &mut [T], frames: usize) -> usize {
        let frames = frames.min(self.scratch.len() / self.block_bytes);
        let bytes = frames * self.block_bytes;
        let read = source.read(&mut self.scratch[..bytes], frames);
        let data = &self.scratch[..read * self.block_bytes];
        let samples = read * self.channels;
        match self.format {
            AudioFormat::PcmI16 => {
                for (o, b) in out[..samples].iter_mut().zip(data.chunks_exact(2)) {
                    *o = T::from_i16(i16::from_le_bytes([b[0], b[1]]));
                }
            }
            AudioFormat::PcmI8 => {
                for (o, &b) in out[..samples].iter_mut().zip(data) {
                    *o = T::from_i8(b as i8);
                }
            }
            AudioFormat::PcmF32 => {
                for (o, b) in out[..samples].iter_mut().zip(data.chunks_exact(4)) {
                    *o = T::from_f32(f32::from_le_bytes([b[0], b[1], b[2], b[3]]));
                }
            }
            AudioFormat::Adpcm => unreachable!("ADPCM takes the block path"),
        }
        read
    }

    fn decode_adpcm<T: Sample>(&mut self, source: &mut dyn AudioSource, out: &mut [T], frames: usize) -> usize {
        let ch = self.channels;
        let mut copied = 0;
        while copied < frames && !self.is_done(source) {
            if !self.adpcm.valid {
                if !self.decode_block(source) {
                    break;
                }
                self.adpcm.valid = true;
            }
            let state = &mut self.adpcm;
            let n = (frames - copied).min(FRAMES_PER_BLOCK - state.offset);
            let src = &state.decoded[state.offset * ch..(state.offset + n) * ch];
            for (o, &s) in out[copied * ch..(copied + n) * ch].iter_mut().zip(src) {
                *o = T::from_i16(s);
            }
            state.offset += n;
            if state.offset >= FRAMES_PER_BLOCK {
                state.offset = 0;
                state.valid = false;
            }
            copied += n;
        }
        copied
    }

    fn decode_block(&mut self, source: &mut dyn AudioSource) -> bool {
        let block = source.block_pos();
        let encoded = &mut self.scratch[..self.block_bytes];
        if source.read(encoded, 1) == 0 {
            return false;
        }
        let stride = self.channels;
        adpcm::decode_block(&encoded[..BYTES_PER_BLOCK], &mut self.adpcm.decoded, stride);
        if stride == 2 {
            adpcm::decode_block(
                &encoded[BYTES_PER_BLOCK..2 * BYTES_PER_BLOCK],
                &mut self.adpcm.decoded[1..],
                stride,
            );
        }
        self.adpcm.block = block;
        true
    }

    /// Whether the source is exhausted and nothing is left buffered.
    pub fn is_done(&self, source: &dyn AudioSource) -> bool {
        match self.format {
            AudioFormat::Adpcm => source.is_done() && !self.adpcm.valid,
            _ => source.is_done(),
        }
    }

    /// Seeks to `frame`.
    pub fn set_frame_pos(&mut self, source: &mut dyn AudioSource, frame: usize) {
        match self.format {
            AudioFormat::Adpcm => {
                let block = frame / FRAMES_PER_BLOCK;
                source.set_block_pos(block);
                self.adpcm.valid = false;
                self.adpcm.offset = frame - block * FRAMES_PER_BLOCK;
            }
            _ => source.set_block_pos(frame),
        }
    }

    /// Frame the next decode starts at.
    pub fn frame_pos(&self, source: &dyn AudioSource) -> usize {
        match self.format {
            AudioFormat::Adpcm if self.adpcm.valid => {
                self.adpcm.block * FRAMES_PER_BLOCK + self.adpcm.offset
            }
            AudioFormat::Adpcm => source.block_pos() * FRAMES_PER_BLOCK + self.adpcm.offset,
            _ => source.block_pos(),
        }
    }

    /// Total frames, if the source knows its length.
    pub fn num_frames(&self, source: &dyn AudioSource) -> Option<usize> {
        let blocks = source.num_blocks()?;
        Some(match self.format {
            AudioFormat::Adpcm => blocks * FRAMES_PER_BLOCK,
            _ => blocks,
        })
    }

    /// Drops any partially consumed block.
    pub fn reset(&mut self) {
        self.adpcm.valid = false;
        self.adpcm.offset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::BufferSource;

    #[test]
    fn pcm16_to_both_representations() {
        let pcm: Vec<i16> = vec![0, 16384, -16384, 32767];
        let bytes: Vec<u8> = pcm.iter().flat_map(|s| s.to_le_bytes()).collect();
        let info = SampleInfo::new(AudioFormat::PcmI16, 2, 44100, 2);
        let mut src = BufferSource::from_bytes(bytes, info);
        let mut dec = Decoder::new(&info, 64);

        let mut out = [0.0f32; 4];
        assert_eq!(dec.decode(&mut src, &mut out, 8), 2);
        assert_eq!(out[1], 16384.0 / 32767.0);
        assert_eq!(out[2], -16384.0 / 32767.0);
        assert!(dec.is_done(&src));

        dec.set_frame_pos(&mut src, 1);
        let mut fixed = [0i32; 2];
        assert_eq!(dec.decode(&mut src, &mut fixed, 1), 1);
        assert_eq!(fixed[0], -(1 << 23));
    }

    #[test]
    fn pcm8_and_float() {
        let info8 = SampleInfo::new(AudioFormat::PcmI8, 1, 8000, 2);
        let mut src = BufferSource::from_bytes(vec![64, 0xC0], info8);
        let mut dec = Decoder::new(&info8, 8);
        let mut out = [0.0f32; 2];
        dec.decode(&mut src, &mut out, 2);
        assert_eq!(out, [64.0 / 127.0, -64.0 / 127.0]);

        let info32 = SampleInfo::new(AudioFormat::PcmF32, 1, 8000, 2);
        let bytes = [0.25f32, -1.0].iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut src = BufferSource::from_bytes(bytes, info32);
        let mut dec = Decoder::new(&info32, 8);
        dec.decode(&mut src, &mut out, 2);
        assert_eq!(out, [0.25, -1.0]);
    }

    #[test]
    fn adpcm_matches_block_decoder_and_seeks() {
        let pcm: Vec<i16> = (0..100).map(|i| ((i as f32 * 0.2).sin() * 12000.0) as i16).collect();
        let encoded = adpcm::encode(&pcm, 1);
        let reference = adpcm::decode(&encoded, 1);
        let info = SampleInfo::new(AudioFormat::Adpcm, 1, 22050, pcm.len());
        let mut src = BufferSource::from_bytes(encoded, info);
        let mut dec = Decoder::new(&info, 256);

        let mut out = vec![0i32; 108];
        let mut total = 0;
        while total < 108 {
            let n = dec.decode(&mut src, &mut out[total..], 10);
            if n == 0 {
                break;
            }
            total += n;
        }
        assert_eq!(total, 108);
        assert!(dec.is_done(&src));
        for (o, r) in out.iter().zip(&reference) {
            assert_eq!(*o, i32::from(*r) << 9);
        }

        dec.set_frame_pos(&mut src, 40);
        assert_eq!(dec.frame_pos(&src), 40);
        let mut one = [0i32; 1];
        dec.decode(&mut src, &mut one, 1);
        assert_eq!(one[0], i32::from(reference[40]) << 9);
        assert_eq!(dec.frame_pos(&src), 41);
        assert_eq!(dec.num_frames(&src), Some(108));
    }

    #[test]
    fn adpcm_stereo_interleaves_channels() {
        let pcm: Vec<i16> = (0..72).map(|i| if i % 2 == 0 { 1000 } else { -1000 }).collect();
        let encoded = adpcm::encode(&pcm, 2);
        let reference = adpcm::decode(&encoded, 2);
        let info = SampleInfo::new(AudioFormat::Adpcm, 2, 22050, 36);
        let mut src = BufferSource::from_bytes(encoded, info);
        let mut dec = Decoder::new(&info, 64);

        let mut out = vec![0.0f32; 72];
        assert_eq!(dec.decode(&mut src, &mut out, 36), 36);
        for (o, r) in out.iter().zip(&reference) {
            assert_eq!(*o, f32::from(*r) / 32767.0);
        }
    }
}
