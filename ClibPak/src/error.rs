//! Error types for `ClibPak`

use std::path::PathBuf;

use thiserror::Error;

/// Broad classification of an [`Error`].
///
/// Every category is terminal for the build that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected before anything was written to disk.
    Validation,
    /// A listed source file could not be located.
    SourceNotFound,
    /// Reading or writing failed (including "disk full").
    Io,
    /// The writer broke one of its own layout invariants.
    FormatInvariant,
    /// An existing library is malformed or unsupported.
    Format,
}

/// The error type for `ClibPak` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An output volume could not be opened for writing.
    #[error("unable to open file '{}' for writing: {source}", path.display())]
    OpenFailed {
        /// The output path.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Writing payload or header bytes to an output volume failed.
    #[error("error writing file '{name}': possibly disk full ({source})")]
    WriteFailed {
        /// The entry (or volume) being written.
        name: String,
        /// The underlying error.
        source: std::io::Error,
    },

    // ==================== Validation Errors ====================
    /// A recorded file name does not fit the engine's name buffer.
    #[error("filename too long: {name} ({length} bytes, limit is {max})")]
    FileNameTooLong {
        /// The offending name.
        name: String,
        /// Its length in bytes.
        length: usize,
        /// Maximum allowed length (exclusive).
        max: usize,
    },

    /// A volume file name does not fit the engine's name buffer.
    #[error("data file name too long: {name} (limit is {max} bytes)")]
    VolumeNameTooLong {
        /// The offending volume name.
        name: String,
        /// Maximum allowed length (exclusive).
        max: usize,
    },

    /// The library would hold more entries than the engine accepts.
    #[error("too many files for one library: {count} (limit is {max})")]
    TooManyFiles {
        /// The number of entries requested.
        count: usize,
        /// Maximum number of entries.
        max: usize,
    },

    /// A source file is larger than a 32-bit length field can describe.
    #[error("file is too large for the library format: {} ({size} bytes)", path.display())]
    FileTooLarge {
        /// The source path.
        path: PathBuf,
        /// Its size in bytes.
        size: u64,
    },

    /// The build manifest is malformed or incomplete.
    #[error("invalid build manifest: {0}")]
    InvalidManifest(String),

    // ==================== Source Errors ====================
    /// A listed file exists in none of the search locations.
    #[error(
        "unable to find file '{name}' for compilation in directory '{}'. Do not remove files during the compilation process.",
        working_dir.display()
    )]
    SourceNotFound {
        /// The file name as listed.
        name: String,
        /// The directory the search was rooted at.
        working_dir: PathBuf,
    },

    // ==================== Format Invariant Errors ====================
    /// The back-patched header differs in size from the placeholder.
    #[error("header size changed between passes: placeholder {expected} bytes, final {actual} bytes")]
    HeaderSizeMismatch {
        /// Size of the placeholder header.
        expected: usize,
        /// Size of the final header.
        actual: usize,
    },

    /// An entry offset does not fit the 32-bit offset field.
    #[error("offset of '{name}' exceeds the library format limit")]
    OffsetOverflow {
        /// The entry name.
        name: String,
    },

    // ==================== Library Format Errors ====================
    /// Neither a leading `CLIB` signature nor an end signature was found.
    #[error("invalid library signature: not a CLIB data file")]
    InvalidSignature,

    /// The library uses a format revision this crate does not read.
    #[error("unsupported library version: {version} (supported: {supported})")]
    UnsupportedVersion {
        /// The version byte found in the file.
        version: u8,
        /// The version this crate reads.
        supported: u8,
    },

    /// The opened file is a continuation volume, not the first in the chain.
    #[error("not the first data file in the chain (volume index {index})")]
    NotPrimaryVolume {
        /// The volume index found in the signature.
        index: u8,
    },

    /// A continuation volume referenced by the header is missing.
    #[error("data file not found: {}", path.display())]
    VolumeMissing {
        /// The expected path of the volume.
        path: PathBuf,
    },

    /// The requested entry is not in the library.
    #[error("file not found in library: {0}")]
    EntryNotFound(String),

    /// Unexpected end of file.
    #[error("unexpected end of file")]
    UnexpectedEof,

    /// Invalid format error (use specific variants when possible).
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Invalid file path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDirError(String),
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::FileNameTooLong { .. }
            | Error::VolumeNameTooLong { .. }
            | Error::TooManyFiles { .. }
            | Error::FileTooLarge { .. }
            | Error::InvalidManifest(_)
            | Error::InvalidPath(_) => ErrorCategory::Validation,
            Error::SourceNotFound { .. } => ErrorCategory::SourceNotFound,
            Error::Io(_)
            | Error::OpenFailed { .. }
            | Error::WriteFailed { .. }
            | Error::WalkDirError(_) => ErrorCategory::Io,
            Error::HeaderSizeMismatch { .. } | Error::OffsetOverflow { .. } => {
                ErrorCategory::FormatInvariant
            }
            Error::InvalidSignature
            | Error::UnsupportedVersion { .. }
            | Error::NotPrimaryVolume { .. }
            | Error::VolumeMissing { .. }
            | Error::EntryNotFound(_)
            | Error::UnexpectedEof
            | Error::InvalidFormat(_) => ErrorCategory::Format,
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDirError(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::InvalidManifest(err.to_string())
    }
}

/// A specialized Result type for `ClibPak` operations.
pub type Result<T> = std::result::Result<T, Error>;
