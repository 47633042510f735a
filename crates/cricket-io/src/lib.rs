//! Audio I/O for the cricket mixing engine.
//!
//! This crate provides:
//!
//! - **Device output**: [`CpalOutput`] drives an [`AudioGraph`](cricket_engine::AudioGraph)
//!   from a cpal output callback
//! - **WAV capture**: [`WavWriter`] records the rendered output as 16-bit stereo
//! - **WAV import**: [`read_wav`], [`wav_sound`] and [`wav_stream`] turn WAV
//!   files into engine sample data
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cricket_engine::{AudioGraph, EngineConfig, GraphOutput};
//! use cricket_io::{CpalOutput, wav_sound};
//!
//! let graph = AudioGraph::<f32>::new(&EngineConfig::default());
//! let mut sound = wav_sound(&graph, "hit.wav", cricket_engine::AudioFormat::PcmI16)?;
//! let mut output = CpalOutput::new(&graph);
//! output.start()?;
//! sound.play();
//! ```

mod device;
mod output;
mod wav;

pub use device::{AudioDevice, default_output_device, list_output_devices};
pub use output::CpalOutput;
pub use wav::{WavFormat, WavInfo, WavWriter, read_wav, read_wav_info, wav_sound, wav_stream};

/// Error types for audio I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The file or device format cannot be used by the engine.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Engine data error.
    #[error(transparent)]
    Engine(#[from] cricket_engine::Error),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
