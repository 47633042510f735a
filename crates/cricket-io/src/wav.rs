//! WAV capture and import.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cricket_core::{Sample, adpcm};
use cricket_engine::{AudioFormat, AudioGraph, AudioWriter, MemoryStream, SampleInfo, Sound};
use hound::{SampleFormat, WavReader};

use crate::{Error, Result};

/// WAV audio encoding format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavFormat {
    /// Linear PCM (integer samples).
    Pcm,
    /// IEEE 754 floating-point samples.
    IeeeFloat,
}

/// WAV file metadata extracted without loading sample data.
#[derive(Debug, Clone)]
pub struct WavInfo {
    /// Number of audio channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit depth per sample.
    pub bits_per_sample: u16,
    /// Total number of sample frames (samples per channel).
    pub num_frames: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Audio encoding format.
    pub format: WavFormat,
}

/// Read WAV metadata without loading sample data.
pub fn read_wav_info<P: AsRef<Path>>(path: P) -> Result<WavInfo> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let num_frames = u64::from(reader.duration());
    let duration_secs = num_frames as f64 / f64::from(spec.sample_rate);

    let format = match spec.sample_format {
        SampleFormat::Float => WavFormat::IeeeFloat,
        SampleFormat::Int => WavFormat::Pcm,
    };

    Ok(WavInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        num_frames,
        duration_secs,
        format,
    })
}

/// Reads a WAV file as 16-bit PCM, keeping at most the first two channels.
fn read_pcm16(path: &Path) -> Result<(Vec<i16>, u8, u16)> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(Error::UnsupportedFormat("WAV file has no channels".into()));
    }
    let sample_rate = u16::try_from(spec.sample_rate).map_err(|_| {
        Error::UnsupportedFormat(format!("sample rate {} Hz is above 65535 Hz", spec.sample_rate))
    })?;
    let in_channels = usize::from(spec.channels);
    let channels = in_channels.min(2);
    if in_channels > 2 {
        tracing::warn!(channels = in_channels, "keeping the first two WAV channels");
    }

    let all: Vec<i16> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * 32767.0) as i16))
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            reader
                .into_samples::<i32>()
                .map(|s| {
                    s.map(|v| {
                        if bits <= 16 {
                            (v << (16 - bits)) as i16
                        } else {
                            (v >> (bits - 16)) as i16
                        }
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    let pcm = if in_channels == channels {
        all
    } else {
        all.chunks_exact(in_channels)
            .flat_map(|frame| frame[..channels].iter().copied())
            .collect()
    };
    Ok((pcm, channels as u8, sample_rate))
}

/// Reads a WAV file and encodes it as engine sample data in `format`.
///
/// Returns the [`SampleInfo`] describing the data together with the encoded
/// bytes, ready for [`Sound::from_memory`], a [`MemoryStream`] or a bank.
pub fn read_wav<P: AsRef<Path>>(path: P, format: AudioFormat) -> Result<(SampleInfo, Vec<u8>)> {
    let path = path.as_ref();
    let (pcm, channels, sample_rate) = read_pcm16(path)?;
    let frames = pcm.len() / usize::from(channels);
    let info = SampleInfo::new(format, channels, sample_rate, frames);

    let data = match format {
        AudioFormat::PcmI16 => pcm.iter().flat_map(|s| s.to_le_bytes()).collect(),
        AudioFormat::PcmI8 => pcm.iter().map(|&s| (s >> 8) as u8).collect(),
        AudioFormat::PcmF32 => pcm
            .iter()
            .flat_map(|&s| (f32::from(s) / 32768.0).to_le_bytes())
            .collect(),
        AudioFormat::Adpcm => adpcm::encode(&pcm, usize::from(channels)),
    };
    tracing::debug!(
        path = %path.display(),
        format = format.name(),
        channels,
        sample_rate,
        frames,
        "WAV imported"
    );
    Ok((info, data))
}

/// Sound playing a WAV file from memory.
pub fn wav_sound<T: Sample, P: AsRef<Path>>(
    graph: &Arc<AudioGraph<T>>,
    path: P,
    format: AudioFormat,
) -> Result<Sound<T>> {
    let (info, data) = read_wav(path, format)?;
    Ok(Sound::from_memory(graph, info, data)?)
}

/// Stream over a WAV file decoded into memory.
pub fn wav_stream<P: AsRef<Path>>(path: P, format: AudioFormat) -> Result<MemoryStream> {
    let (info, data) = read_wav(path, format)?;
    Ok(MemoryStream::new(info, data))
}

/// Capture writer producing a 16-bit stereo WAV file at the graph rate.
///
/// The file header is finalized when the writer is dropped, which happens
/// on a control thread once the graph hands the writer back.
pub struct WavWriter {
    path: PathBuf,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavWriter {
    /// Creates (or truncates) `path`.
    pub fn create<P: AsRef<Path>>(path: P, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(&path, spec)?;
        Ok(Self {
            path,
            writer: Some(writer),
        })
    }

    /// File being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Finalizes the header, reporting any error.
    pub fn finalize(mut self) -> Result<()> {
        match self.writer.take() {
            Some(writer) => Ok(writer.finalize()?),
            None => Ok(()),
        }
    }
}

impl<T: Sample> AudioWriter<T> for WavWriter {
    fn write(&mut self, samples: &[T]) -> usize {
        let Some(writer) = &mut self.writer else {
            return 0;
        };
        for (i, &s) in samples.iter().enumerate() {
            if let Err(e) = writer.write_sample(s.to_i16()) {
                tracing::error!(path = %self.path.display(), error = %e, "WAV capture write failed");
                return i;
            }
        }
        samples.len()
    }
}

impl Drop for WavWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            match writer.finalize() {
                Ok(()) => tracing::debug!(path = %self.path.display(), "WAV capture finalized"),
                Err(e) => tracing::error!(path = %self.path.display(), error = %e, "WAV capture finalize failed"),
            }
        }
    }
}
