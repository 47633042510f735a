//! Sample banks (`.ckb`).
//!
//! Body layout after the common header:
//!
//! | Size | Field |
//! |------|-------|
//! | 32 | bank name |
//! | 4 | sample count `n` |
//! | n × 68 | sample records: name (32), [`SampleInfo`] (28), data size (4), data offset (4) |
//! | rest | data region |
//!
//! Offsets are relative to the start of the data region and are checked
//! against it before any sample becomes playable.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::format::{ByteReader, FileHeader, FileType, NAME_BYTES, SAMPLE_INFO_BYTES, SampleInfo, write_name};
use crate::loader::AsyncLoader;
use crate::source::BufferSource;
use crate::stream_file::resolve_range;

/// Serialized size of one sample record.
pub const RECORD_BYTES: usize = NAME_BYTES + SAMPLE_INFO_BYTES + 8;

/// One sample inside a bank.
#[derive(Debug, Clone)]
pub struct SampleEntry {
    /// Sample name.
    pub name: String,
    /// Format and playback defaults.
    pub info: SampleInfo,
    range: Range<usize>,
}

impl SampleEntry {
    /// Size of the encoded data.
    pub fn data_len(&self) -> usize {
        self.range.len()
    }
}

/// Parsed, validated bank contents.
#[derive(Debug)]
pub struct BankData {
    name: String,
    samples: Vec<SampleEntry>,
    data: Arc<Vec<u8>>,
}

impl BankData {
    /// Parses a bank file image.
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        let (name, samples) = {
            let mut reader = ByteReader::new(&bytes);
            FileHeader::parse(&mut reader, FileType::Bank)?;
            let name = reader.name("bank name")?;
            let count = reader.u32("sample count")? as usize;
            if count > reader.remaining().len() / RECORD_BYTES {
                return Err(Error::Truncated("sample table"));
            }

            let mut records = Vec::with_capacity(count);
            for _ in 0..count {
                let sample_name = reader.name("sample name")?;
                let info = SampleInfo::parse(&mut reader)?;
                let size = reader.u32("sample size")?;
                let offset = reader.u32("sample offset")?;
                records.push((sample_name, info, size, offset));
            }

            let region_start = reader.position();
            let region = bytes.len() - region_start;
            let mut samples = Vec::with_capacity(count);
            for (sample_name, info, size, offset) in records {
                let end = offset as usize + size as usize;
                if end > region {
                    return Err(Error::CorruptOffset {
                        name: sample_name,
                        offset,
                        size,
                        region,
                    });
                }
                if size as usize != info.data_bytes() {
                    return Err(Error::InvalidSampleInfo(format!(
                        "sample '{}' holds {} bytes but describes {}",
                        sample_name,
                        size,
                        info.data_bytes()
                    )));
                }
                let start = region_start + offset as usize;
                samples.push(SampleEntry {
                    name: sample_name,
                    info,
                    range: start..start + size as usize,
                });
            }
            (name, samples)
        };

        Ok(Self {
            name,
            samples,
            data: Arc::new(bytes),
        })
    }

    /// Bank name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the bank holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// All samples in file order.
    pub fn samples(&self) -> &[SampleEntry] {
        &self.samples
    }

    /// Sample by index.
    pub fn sample(&self, index: usize) -> Option<&SampleEntry> {
        self.samples.get(index)
    }

    /// Index of the sample named `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.samples.iter().position(|s| s.name == name)
    }

    /// Encoded bytes of sample `index`.
    pub fn sample_data(&self, index: usize) -> Option<&[u8]> {
        self.samples.get(index).map(|s| &self.data[s.range.clone()])
    }

    /// A playable source over sample `index`, sharing the bank's memory.
    pub fn source(&self, index: usize) -> Option<BufferSource> {
        let entry = self.samples.get(index)?;
        Some(BufferSource::new(Arc::clone(&self.data), entry.range.clone(), entry.info))
    }
}

/// Builds bank file images.
#[derive(Debug, Default)]
pub struct BankWriter {
    name: String,
    samples: Vec<(String, SampleInfo, Vec<u8>)>,
}

impl BankWriter {
    /// Empty bank called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            samples: Vec::new(),
        }
    }

    /// Appends a sample; `data` must hold `info.data_bytes()` bytes.
    pub fn add(&mut self, name: impl Into<String>, info: SampleInfo, data: impl Into<Vec<u8>>) -> &mut Self {
        self.samples.push((name.into(), info, data.into()));
        self
    }

    /// Serializes the bank.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        FileHeader::new(FileType::Bank).write(&mut out);
        write_name(&mut out, &self.name);
        out.extend_from_slice(&(self.samples.len() as u32).to_le_bytes());
        let mut offset = 0u32;
        for (name, info, data) in &self.samples {
            write_name(&mut out, name);
            info.write(&mut out);
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            offset += data.len() as u32;
        }
        for (_, _, data) in &self.samples {
            out.extend_from_slice(data);
        }
        out
    }

    /// Writes the bank to `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_bytes())?;
        Ok(())
    }
}

/// Reads `length` bytes at `offset` (non-positive length: to the end).
pub fn read_range(path: &Path, offset: i64, length: i64) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    let (start, len) = resolve_range(offset, length, size)?;
    file.seek(SeekFrom::Start(start))?;
    let mut bytes = vec![0; len as usize];
    file.read_exact(&mut bytes)?;
    Ok(bytes)
}

const LOADING: u8 = 0;
const LOADED: u8 = 1;
const FAILED: u8 = 2;

type SoundUnloader = Box<dyn FnOnce() + Send>;

/// A bank that may still be loading.
///
/// The load state is published with release ordering after the data is in
/// place, so an acquire read of "loaded" guarantees the data is visible.
pub struct Bank {
    state: AtomicU8,
    data: OnceLock<BankData>,
    sounds: Mutex<Vec<SoundUnloader>>,
}

impl Bank {
    fn loading() -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(LOADING),
            data: OnceLock::new(),
            sounds: Mutex::new(Vec::new()),
        })
    }

    fn loaded(data: BankData) -> Arc<Self> {
        let bank = Self::loading();
        bank.complete(Ok(data));
        bank
    }

    /// Loads a bank synchronously from a file region.
    pub fn load(path: impl AsRef<Path>, offset: i64, length: i64) -> Result<Arc<Self>> {
        let bytes = read_range(path.as_ref(), offset, length)?;
        Ok(Self::loaded(BankData::parse(bytes)?))
    }

    /// Wraps an in-memory bank image.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Arc<Self>> {
        Ok(Self::loaded(BankData::parse(bytes)?))
    }

    /// Starts loading a bank on `loader`'s thread.
    ///
    /// The range is checked against the file size right away; the read and
    /// parse happen in the background.
    pub fn load_async(loader: &AsyncLoader, path: impl AsRef<Path>, offset: i64, length: i64) -> Result<Arc<Self>> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        resolve_range(offset, length, size)?;

        let bank = Self::loading();
        let pending = Arc::clone(&bank);
        let shown = path.display().to_string();
        let queued = loader.load(path, offset, length, move |bytes| {
            let result = bytes.and_then(BankData::parse);
            if let Err(e) = &result {
                tracing::error!(path = %shown, error = %e, "bank could not be loaded");
            }
            pending.complete(result);
        });
        if !queued {
            bank.state.store(FAILED, Ordering::Release);
        }
        Ok(bank)
    }

    fn complete(&self, result: Result<BankData>) {
        let state = match result {
            Ok(data) => {
                tracing::info!(name = data.name(), samples = data.len(), "bank loaded");
                if self.data.set(data).is_ok() { LOADED } else { FAILED }
            }
            Err(_) => FAILED,
        };
        self.state.store(state, Ordering::Release);
    }

    /// Whether loading has finished, successfully or not.
    pub fn is_loaded(&self) -> bool {
        self.state.load(Ordering::Acquire) != LOADING
    }

    /// Whether loading finished without usable data.
    pub fn is_failed(&self) -> bool {
        self.state.load(Ordering::Acquire) == FAILED
    }

    /// Parsed contents, once loaded.
    pub fn data(&self) -> Option<&BankData> {
        if self.state.load(Ordering::Acquire) == LOADED {
            self.data.get()
        } else {
            None
        }
    }

    /// Bank name, once loaded.
    pub fn name(&self) -> Option<&str> {
        self.data().map(BankData::name)
    }

    /// Number of sounds, or 0 before loading finishes.
    pub fn num_sounds(&self) -> usize {
        self.data().map_or(0, BankData::len)
    }

    /// Name of sound `index`.
    pub fn sound_name(&self, index: usize) -> Option<&str> {
        let data = self.data()?;
        match data.sample(index) {
            Some(s) => Some(&s.name),
            None => {
                tracing::error!(index, bank = data.name(), sounds = data.len(), "sound index out of range");
                None
            }
        }
    }

    /// Index of the sound named `name`.
    pub fn find_sound(&self, name: &str) -> Option<usize> {
        self.data()?.find(name)
    }

    /// Blocks until loading finishes.
    pub fn wait(&self) {
        if self.is_loaded() {
            return;
        }
        tracing::warn!("bank is being destroyed before it is loaded; waiting for it to finish");
        while !self.is_loaded() {
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Registers cleanup for a sound built from this bank.
    pub(crate) fn on_unload(&self, unload: SoundUnloader) {
        self.sounds.lock().push(unload);
    }

    /// Destroys every sound built from this bank.
    pub(crate) fn unload_sounds(&self) {
        let sounds = std::mem::take(&mut *self.sounds.lock());
        for unload in sounds {
            unload();
        }
    }
}

impl std::fmt::Debug for Bank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bank")
            .field("state", &self.state.load(Ordering::Relaxed))
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::AudioFormat;
    use crate::source::AudioSource;

    fn two_sample_bank() -> Vec<u8> {
        let mut writer = BankWriter::new("sfx");
        writer
            .add("tick", SampleInfo::new(AudioFormat::PcmI8, 1, 8000, 4), vec![1, 2, 3, 4])
            .add("tock", SampleInfo::new(AudioFormat::PcmI16, 1, 8000, 2), vec![5, 6, 7, 8]);
        writer.to_bytes()
    }

    #[test]
    fn parses_written_bank() {
        let data = BankData::parse(two_sample_bank()).unwrap();
        assert_eq!(data.name(), "sfx");
        assert_eq!(data.len(), 2);
        assert_eq!(data.find("tock"), Some(1));
        assert_eq!(data.find("missing"), None);
        assert_eq!(data.sample_data(1).unwrap(), &[5, 6, 7, 8]);

        let mut src = data.source(0).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(src.read(&mut buf, 4), 4);
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn corrupt_offset_is_rejected() {
        let mut bytes = two_sample_bank();
        // second record's offset field
        let offset_at = 16 + NAME_BYTES + 4 + 2 * RECORD_BYTES - 4;
        bytes[offset_at..offset_at + 4].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(
            BankData::parse(bytes),
            Err(Error::CorruptOffset { offset: 1000, .. })
        ));
    }

    #[test]
    fn truncated_table_is_rejected() {
        let mut bytes = two_sample_bank();
        bytes.truncate(16 + NAME_BYTES + 4 + RECORD_BYTES);
        assert!(matches!(BankData::parse(bytes), Err(Error::Truncated(_))));
    }

    #[test]
    fn load_from_embedded_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packed.bin");
        let bank = two_sample_bank();
        let mut image = vec![0u8; 10];
        image.extend_from_slice(&bank);
        std::fs::write(&path, &image).unwrap();

        let loaded = Bank::load(&path, 10, bank.len() as i64).unwrap();
        assert!(loaded.is_loaded() && !loaded.is_failed());
        assert_eq!(loaded.name(), Some("sfx"));
        assert_eq!(loaded.sound_name(0), Some("tick"));
        assert_eq!(loaded.sound_name(5), None);

        assert!(matches!(Bank::load(&path, -1, 0), Err(Error::InvalidRange { .. })));
        assert!(matches!(Bank::load(&path, 10, image.len() as i64), Err(Error::InvalidRange { .. })));
    }

    #[test]
    fn unload_runs_registered_sounds() {
        use std::sync::atomic::AtomicUsize;

        let bank = Bank::from_bytes(two_sample_bank()).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            bank.on_unload(Box::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }
        bank.unload_sounds();
        bank.unload_sounds();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
