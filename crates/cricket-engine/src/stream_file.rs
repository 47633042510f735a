//! Stream data providers read by the file thread.
//!
//! A `.cks` stream file is the common header followed by one [`SampleInfo`]
//! and the encoded blocks. The file may be embedded in a larger file, so
//! [`CksFileStream`] reads a sub-range `(offset, length)`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::format::{ByteReader, FileHeader, FileType, HEADER_BYTES, SAMPLE_INFO_BYTES, SampleInfo};

/// Sequential block reader behind a [`StreamSource`](crate::source::StreamSource).
///
/// Every method except [`init`](Self::init) may assume `init` succeeded.
pub trait AudioStream: Send {
    /// Opens the data and reads its format.
    fn init(&mut self) -> Result<SampleInfo>;

    /// Reads up to `blocks` blocks into `buf`. Returns the blocks read.
    fn read(&mut self, buf: &mut [u8], blocks: usize) -> usize;

    /// Total blocks available, if known.
    fn num_blocks(&self) -> Option<usize>;

    /// Moves the read position.
    fn set_block_pos(&mut self, block: usize);

    /// Next block to be read.
    fn block_pos(&self) -> usize;
}

/// Resolves `(offset, length)` against a file of `size` bytes.
///
/// A non-positive length means "to the end of the file".
pub(crate) fn resolve_range(offset: i64, length: i64, size: u64) -> Result<(u64, u64)> {
    let invalid = || Error::InvalidRange {
        offset,
        length,
        size,
    };
    if offset < 0 || offset as u64 >= size {
        return Err(invalid());
    }
    let rest = size - offset as u64;
    let len = if length <= 0 { rest } else { length as u64 };
    if len > rest {
        return Err(invalid());
    }
    Ok((offset as u64, len))
}

fn truncated_on_eof(what: &'static str) -> impl Fn(std::io::Error) -> Error {
    move |e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Truncated(what)
        } else {
            Error::Io(e)
        }
    }
}

/// Stream read from a `.cks` file on disk.
pub struct CksFileStream {
    path: PathBuf,
    offset: i64,
    length: i64,
    file: Option<File>,
    block_bytes: u64,
    data_start: u64,
    data_len: u64,
    pos: u64,
}

impl CksFileStream {
    /// Stream covering the whole file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_range(path, 0, 0)
    }

    /// Stream embedded at `offset` in a larger file; `length <= 0` reads to
    /// the end.
    pub fn with_range(path: impl Into<PathBuf>, offset: i64, length: i64) -> Self {
        Self {
            path: path.into(),
            offset,
            length,
            file: None,
            block_bytes: 1,
            data_start: 0,
            data_len: 0,
            pos: 0,
        }
    }

    /// Path being streamed.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AudioStream for CksFileStream {
    fn init(&mut self) -> Result<SampleInfo> {
        let mut file = File::open(&self.path)?;
        let size = file.metadata()?.len();
        let (start, len) = resolve_range(self.offset, self.length, size)?;
        file.seek(SeekFrom::Start(start))?;

        let mut head = [0u8; HEADER_BYTES + SAMPLE_INFO_BYTES];
        if len < head.len() as u64 {
            return Err(Error::Truncated("stream header"));
        }
        file.read_exact(&mut head).map_err(truncated_on_eof("stream header"))?;
        let mut reader = ByteReader::new(&head);
        FileHeader::parse(&mut reader, FileType::Stream)?;
        let info = SampleInfo::parse(&mut reader)?;

        self.block_bytes = u64::from(info.block_bytes);
        self.data_start = start + head.len() as u64;
        self.data_len = (len - head.len() as u64) / self.block_bytes * self.block_bytes;
        self.pos = 0;
        self.file = Some(file);
        Ok(info)
    }

    fn read(&mut self, buf: &mut [u8], blocks: usize) -> usize {
        let Some(file) = self.file.as_mut() else {
            return 0;
        };
        let bb = self.block_bytes;
        let want = (blocks as u64 * bb)
            .min(buf.len() as u64 / bb * bb)
            .min(self.data_len - self.pos);
        if want == 0 {
            return 0;
        }
        if let Err(e) = file.read_exact(&mut buf[..want as usize]) {
            tracing::error!(path = %self.path.display(), error = %e, "stream read failed");
            return 0;
        }
        self.pos += want;
        (want / bb) as usize
    }

    fn num_blocks(&self) -> Option<usize> {
        Some((self.data_len / self.block_bytes) as usize)
    }

    fn set_block_pos(&mut self, block: usize) {
        self.pos = (block as u64 * self.block_bytes).min(self.data_len);
        let target = self.data_start + self.pos;
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.seek(SeekFrom::Start(target)) {
                tracing::error!(path = %self.path.display(), error = %e, "stream seek failed");
            }
        }
    }

    fn block_pos(&self) -> usize {
        (self.pos / self.block_bytes) as usize
    }
}

/// Stream over encoded blocks already in memory.
///
/// Useful for application-generated audio and for driving the streaming
/// path without touching the disk.
pub struct MemoryStream {
    info: SampleInfo,
    data: Vec<u8>,
    pos: usize,
}

impl MemoryStream {
    /// Wraps `data`, which is truncated to whole blocks.
    pub fn new(info: SampleInfo, mut data: Vec<u8>) -> Self {
        let bb = usize::from(info.block_bytes.max(1));
        data.truncate(data.len() / bb * bb);
        Self { info, data, pos: 0 }
    }
}

impl AudioStream for MemoryStream {
    fn init(&mut self) -> Result<SampleInfo> {
        self.info.validate()?;
        Ok(self.info)
    }

    fn read(&mut self, buf: &mut [u8], blocks: usize) -> usize {
        let bb = usize::from(self.info.block_bytes);
        let n = (blocks * bb).min(buf.len() / bb * bb).min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        n / bb
    }

    fn num_blocks(&self) -> Option<usize> {
        Some(self.data.len() / usize::from(self.info.block_bytes))
    }

    fn set_block_pos(&mut self, block: usize) {
        self.pos = (block * usize::from(self.info.block_bytes)).min(self.data.len());
    }

    fn block_pos(&self) -> usize {
        self.pos / usize::from(self.info.block_bytes)
    }
}

/// Serializes a stream file image.
pub fn stream_bytes(info: &SampleInfo, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_BYTES + SAMPLE_INFO_BYTES + data.len());
    FileHeader::new(FileType::Stream).write(&mut out);
    info.write(&mut out);
    out.extend_from_slice(data);
    out
}

/// Writes a `.cks` stream file.
pub fn write_stream(path: impl AsRef<Path>, info: &SampleInfo, data: &[u8]) -> Result<()> {
    std::fs::write(path, stream_bytes(info, data))?;
    Ok(())
}
