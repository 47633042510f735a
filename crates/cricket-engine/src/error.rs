//! Error types for bank and stream files.

use crate::format::FileType;

/// Errors raised while reading or writing engine data files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the `ckmk` marker.
    #[error("Invalid file marker: {0:?} (expecting \"ckmk\")")]
    InvalidMarker([u8; 4]),

    /// The file was built for other targets.
    #[error("Invalid file target mask: {found:#x} (does not include current target {current:#x})")]
    TargetMismatch {
        /// Target mask stored in the header.
        found: u32,
        /// Target bit of this build.
        current: u32,
    },

    /// A bank was expected and a stream was found, or vice versa.
    #[error("Invalid file type: {found} (expecting {expected:?})")]
    WrongFileType {
        /// File type the caller asked for.
        expected: FileType,
        /// Raw file type stored in the header.
        found: u32,
    },

    /// The file predates the current format; rebuild it.
    #[error("File version {0} is too old (expecting {expected})", expected = crate::format::FILE_VERSION)]
    VersionTooOld(u32),

    /// The file was written by a newer engine.
    #[error("File version {0} is too new (expecting {expected})", expected = crate::format::FILE_VERSION)]
    VersionTooNew(u32),

    /// The data ended inside a structure.
    #[error("Unexpected end of data while reading {0}")]
    Truncated(&'static str),

    /// A sample record points outside the bank's data region.
    #[error("Sample '{name}' data range {offset}+{size} lies outside the {region} byte data region")]
    CorruptOffset {
        /// Sample name.
        name: String,
        /// Offset into the data region.
        offset: u32,
        /// Size of the sample data.
        size: u32,
        /// Length of the data region.
        region: usize,
    },

    /// Sample metadata is inconsistent.
    #[error("Invalid sample info: {0}")]
    InvalidSampleInfo(String),

    /// The sample format code is unknown.
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(u8),

    /// A requested byte range lies outside the file.
    #[error("Invalid range: offset {offset}, length {length} in a file of {size} bytes")]
    InvalidRange {
        /// Requested start offset.
        offset: i64,
        /// Requested length (non-positive means "rest of file").
        length: i64,
        /// Actual file size.
        size: u64,
    },
}

/// Convenience result type for engine file operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_messages_name_expected_version() {
        let old = Error::VersionTooOld(1).to_string();
        let new = Error::VersionTooNew(7).to_string();
        assert!(old.contains("too old") && old.contains("expecting 2"), "got: {old}");
        assert!(new.contains("too new") && new.contains('7'), "got: {new}");
    }

    #[test]
    fn io_converts() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn corrupt_offset_display() {
        let err = Error::CorruptOffset {
            name: "hit".into(),
            offset: 900,
            size: 200,
            region: 1000,
        };
        let msg = err.to_string();
        assert!(msg.contains("'hit'") && msg.contains("900+200"), "got: {msg}");
    }
}
