//! On-disk layout shared by bank (`.ckb`) and stream (`.cks`) files.
//!
//! Every file starts with a 16-byte little-endian header:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | marker `"ckmk"` |
//! | 4 | 4 | target mask |
//! | 8 | 4 | file type (0 bank, 1 stream) |
//! | 12 | 4 | format version (2) |
//!
//! followed by type-specific data. [`SampleInfo`] records are 28 bytes:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 1 | format code |
//! | 1 | 1 | channels |
//! | 2 | 2 | sample rate |
//! | 4 | 4 | blocks |
//! | 8 | 2 | bytes per block |
//! | 10 | 2 | frames per block |
//! | 12 | 2 | volume (0..65535) |
//! | 14 | 2 | pan (-32767..32767) |
//! | 16 | 4 | loop start frame |
//! | 20 | 4 | loop end frame (-1 = end of sound) |
//! | 24 | 2 | loop count (-1 = infinite) |
//! | 26 | 2 | padding |
//!
//! All multi-byte values are little-endian.

use cricket_core::adpcm;

use crate::error::{Error, Result};

/// File marker.
pub const MARKER: [u8; 4] = *b"ckmk";
/// Current format version.
pub const FILE_VERSION: u32 = 2;
/// Header size in bytes.
pub const HEADER_BYTES: usize = 16;
/// Serialized [`SampleInfo`] size in bytes.
pub const SAMPLE_INFO_BYTES: usize = 28;
/// Fixed size of bank and sample name fields.
pub const NAME_BYTES: usize = 32;

/// Target platform bits stored in the header mask.
pub mod target {
    /// Android.
    pub const ANDROID: u32 = 1 << 0;
    /// iOS and tvOS.
    pub const IOS: u32 = 1 << 1;
    /// macOS.
    pub const MACOS: u32 = 1 << 2;
    /// Windows.
    pub const WINDOWS: u32 = 1 << 3;
    /// Linux.
    pub const LINUX: u32 = 1 << 4;
    /// Anything else.
    pub const OTHER: u32 = 1 << 5;
    /// Every target; the default for files written by this crate.
    pub const ALL: u32 = ANDROID | IOS | MACOS | WINDOWS | LINUX | OTHER;

    /// The bit for the platform this crate was compiled for.
    pub const CURRENT: u32 = if cfg!(target_os = "android") {
        ANDROID
    } else if cfg!(any(target_os = "ios", target_os = "tvos")) {
        IOS
    } else if cfg!(target_os = "macos") {
        MACOS
    } else if cfg!(target_os = "windows") {
        WINDOWS
    } else if cfg!(target_os = "linux") {
        LINUX
    } else {
        OTHER
    };
}

/// Kind of data following the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Sample bank.
    Bank = 0,
    /// Single streamed sound.
    Stream = 1,
}

/// Sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    /// 16-bit signed PCM; one frame per block.
    PcmI16 = 0,
    /// 8-bit signed PCM; one frame per block.
    PcmI8 = 1,
    /// 4-bit ADPCM; 36 frames per block.
    Adpcm = 2,
    /// 32-bit float PCM; one frame per block.
    PcmF32 = 3,
}

impl AudioFormat {
    /// All formats in code order.
    pub const ALL: [AudioFormat; 4] = [
        AudioFormat::PcmI16,
        AudioFormat::PcmI8,
        AudioFormat::Adpcm,
        AudioFormat::PcmF32,
    ];

    /// Parses a format code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|f| *f as u8 == code)
    }

    /// Format code stored on disk.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Short name.
    pub fn name(self) -> &'static str {
        match self {
            AudioFormat::PcmI16 => "pcm16",
            AudioFormat::PcmI8 => "pcm8",
            AudioFormat::Adpcm => "adpcm",
            AudioFormat::PcmF32 => "float",
        }
    }

    /// Parses a short name as printed by [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// `(bytes, frames)` of one block for `channels` channels.
    pub fn block_layout(self, channels: u8) -> (u16, u16) {
        let ch = u16::from(channels);
        match self {
            AudioFormat::PcmI16 => (2 * ch, 1),
            AudioFormat::PcmI8 => (ch, 1),
            AudioFormat::PcmF32 => (4 * ch, 1),
            AudioFormat::Adpcm => (
                (adpcm::BYTES_PER_BLOCK as u16) * ch,
                adpcm::FRAMES_PER_BLOCK as u16,
            ),
        }
    }
}

/// Little-endian cursor over a byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Starts reading at the beginning of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Everything not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Consumes `n` bytes; `what` names the structure for the error.
    pub fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(Error::Truncated(what))?;
        let bytes = self.data.get(self.pos..end).ok_or(Error::Truncated(what))?;
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    /// Reads a `u8`.
    pub fn u8(&mut self, what: &'static str) -> Result<u8> {
        Ok(self.array::<1>(what)?[0])
    }

    /// Reads a little-endian `u16`.
    pub fn u16(&mut self, what: &'static str) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array(what)?))
    }

    /// Reads a little-endian `i16`.
    pub fn i16(&mut self, what: &'static str) -> Result<i16> {
        Ok(i16::from_le_bytes(self.array(what)?))
    }

    /// Reads a little-endian `u32`.
    pub fn u32(&mut self, what: &'static str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array(what)?))
    }

    /// Reads a little-endian `i32`.
    pub fn i32(&mut self, what: &'static str) -> Result<i32> {
        Ok(i32::from_le_bytes(self.array(what)?))
    }

    /// Reads a NUL-padded fixed-size name field.
    pub fn name(&mut self, what: &'static str) -> Result<String> {
        let raw = self.take(NAME_BYTES, what)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(NAME_BYTES);
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }
}

/// Appends `name` as a NUL-padded fixed-size field, truncated to 31 bytes.
pub fn write_name(out: &mut Vec<u8>, name: &str) {
    let mut field = [0u8; NAME_BYTES];
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_BYTES - 1);
    field[..len].copy_from_slice(&bytes[..len]);
    out.extend_from_slice(&field);
}

/// Parsed file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Target mask.
    pub targets: u32,
    /// Raw file type.
    pub file_type: u32,
    /// Format version.
    pub version: u32,
}

impl FileHeader {
    /// Header for a file this crate writes.
    pub fn new(file_type: FileType) -> Self {
        Self {
            targets: target::ALL,
            file_type: file_type as u32,
            version: FILE_VERSION,
        }
    }

    /// Reads and validates a header, expecting `expected` data to follow.
    ///
    /// Checks run in order: marker, target mask, file type, version.
    pub fn parse(reader: &mut ByteReader<'_>, expected: FileType) -> Result<Self> {
        let marker: [u8; 4] = reader.array("file header")?;
        if marker != MARKER {
            return Err(Error::InvalidMarker(marker));
        }
        let header = Self {
            targets: reader.u32("file header")?,
            file_type: reader.u32("file header")?,
            version: reader.u32("file header")?,
        };
        if header.targets & target::CURRENT == 0 {
            return Err(Error::TargetMismatch {
                found: header.targets,
                current: target::CURRENT,
            });
        }
        if header.file_type != expected as u32 {
            return Err(Error::WrongFileType {
                expected,
                found: header.file_type,
            });
        }
        match header.version.cmp(&FILE_VERSION) {
            std::cmp::Ordering::Less => Err(Error::VersionTooOld(header.version)),
            std::cmp::Ordering::Greater => Err(Error::VersionTooNew(header.version)),
            std::cmp::Ordering::Equal => Ok(header),
        }
    }

    /// Appends the 16 header bytes.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MARKER);
        out.extend_from_slice(&self.targets.to_le_bytes());
        out.extend_from_slice(&self.file_type.to_le_bytes());
        out.extend_from_slice(&self.version.to_le_bytes());
    }
}

/// Format and playback defaults of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    /// Encoding.
    pub format: AudioFormat,
    /// 1 or 2.
    pub channels: u8,
    /// Native sample rate in Hz.
    pub sample_rate: u16,
    /// Number of blocks of data.
    pub blocks: i32,
    /// Bytes per block.
    pub block_bytes: u16,
    /// Frames per block.
    pub block_frames: u16,
    /// Default volume, 65535 = unity.
    pub volume: u16,
    /// Default pan, -32767 (left) ..= 32767 (right).
    pub pan: i16,
    /// Default loop start frame.
    pub loop_start: u32,
    /// Default loop end frame; -1 means the end of the sound.
    pub loop_end: i32,
    /// Default loop count; 0 plays once, -1 loops forever.
    pub loop_count: i16,
}

impl SampleInfo {
    /// Info for `frames` frames of `format` data at unity volume, center pan,
    /// without looping.
    pub fn new(format: AudioFormat, channels: u8, sample_rate: u16, frames: usize) -> Self {
        let (block_bytes, block_frames) = format.block_layout(channels);
        Self {
            format,
            channels,
            sample_rate,
            blocks: frames.div_ceil(usize::from(block_frames)) as i32,
            block_bytes,
            block_frames,
            volume: u16::MAX,
            pan: 0,
            loop_start: 0,
            loop_end: -1,
            loop_count: 0,
        }
    }

    /// Total frames.
    pub fn frames(&self) -> usize {
        self.blocks.max(0) as usize * usize::from(self.block_frames)
    }

    /// Length of the data in bytes.
    pub fn data_bytes(&self) -> usize {
        self.blocks.max(0) as usize * usize::from(self.block_bytes)
    }

    /// Length in milliseconds.
    pub fn length_ms(&self) -> f32 {
        if self.sample_rate == 0 {
            0.0
        } else {
            1000.0 * self.frames() as f32 / f32::from(self.sample_rate)
        }
    }

    /// Default volume as a gain in [0, 1].
    pub fn volume_gain(&self) -> f32 {
        f32::from(self.volume) / f32::from(u16::MAX)
    }

    /// Default pan in [-1, 1].
    pub fn pan_position(&self) -> f32 {
        f32::from(self.pan) / f32::from(i16::MAX)
    }

    /// Checks the fields against each other.
    pub fn validate(&self) -> Result<()> {
        if !(1..=2).contains(&self.channels) {
            return Err(Error::InvalidSampleInfo(format!(
                "{} channels (expecting 1 or 2)",
                self.channels
            )));
        }
        if self.sample_rate == 0 {
            return Err(Error::InvalidSampleInfo("sample rate is zero".into()));
        }
        if (self.block_bytes, self.block_frames) != self.format.block_layout(self.channels) {
            return Err(Error::InvalidSampleInfo(format!(
                "block layout {}x{} does not match {} with {} channels",
                self.block_bytes,
                self.block_frames,
                self.format.name(),
                self.channels
            )));
        }
        if self.blocks < 0 {
            return Err(Error::InvalidSampleInfo(format!("{} blocks", self.blocks)));
        }
        Ok(())
    }

    /// Reads and validates a 28-byte record.
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        const WHAT: &str = "sample info";
        let code = reader.u8(WHAT)?;
        let format = AudioFormat::from_code(code).ok_or(Error::UnsupportedFormat(code))?;
        let info = Self {
            format,
            channels: reader.u8(WHAT)?,
            sample_rate: reader.u16(WHAT)?,
            blocks: reader.i32(WHAT)?,
            block_bytes: reader.u16(WHAT)?,
            block_frames: reader.u16(WHAT)?,
            volume: reader.u16(WHAT)?,
            pan: reader.i16(WHAT)?,
            loop_start: reader.u32(WHAT)?,
            loop_end: reader.i32(WHAT)?,
            loop_count: reader.i16(WHAT)?,
        };
        reader.take(2, WHAT)?;
        info.validate()?;
        Ok(info)
    }

    /// Appends the 28-byte record.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.push(self.format.code());
        out.push(self.channels);
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&self.blocks.to_le_bytes());
        out.extend_from_slice(&self.block_bytes.to_le_bytes());
        out.extend_from_slice(&self.block_frames.to_le_bytes());
        out.extend_from_slice(&self.volume.to_le_bytes());
        out.extend_from_slice(&self.pan.to_le_bytes());
        out.extend_from_slice(&self.loop_start.to_le_bytes());
        out.extend_from_slice(&self.loop_end.to_le_bytes());
        out.extend_from_slice(&self.loop_count.to_le_bytes());
        out.extend_from_slice(&[0, 0]);
    }
}
