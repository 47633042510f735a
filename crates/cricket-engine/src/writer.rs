//! Capture of the rendered output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Sink for the final clamped output, fed on the audio thread.
pub trait AudioWriter<T>: Send {
    /// Appends interleaved stereo samples. Returns the samples written; a
    /// short count closes the capture.
    fn write(&mut self, samples: &[T]) -> usize;
}

/// Writes samples in the session representation as little-endian words,
/// with no header.
pub struct RawWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl RawWriter {
    /// Creates (or truncates) `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let out = BufWriter::new(File::create(&path)?);
        Ok(Self { path, out })
    }

    /// File being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_words<const N: usize>(&mut self, words: impl Iterator<Item = [u8; N]>) -> usize {
        let mut written = 0;
        for word in words {
            if let Err(e) = self.out.write_all(&word) {
                tracing::error!(path = %self.path.display(), error = %e, "capture write failed");
                break;
            }
            written += 1;
        }
        written
    }
}

impl AudioWriter<i32> for RawWriter {
    fn write(&mut self, samples: &[i32]) -> usize {
        self.write_words(samples.iter().map(|s| s.to_le_bytes()))
    }
}

impl AudioWriter<f32> for RawWriter {
    fn write(&mut self, samples: &[f32]) -> usize {
        self.write_words(samples.iter().map(|s| s.to_le_bytes()))
    }
}

impl Drop for RawWriter {
    fn drop(&mut self) {
        if let Err(e) = self.out.flush() {
            tracing::error!(path = %self.path.display(), error = %e, "capture flush failed");
        }
    }
}
