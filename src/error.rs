//! Error types for DAMD operations

use std::path::PathBuf;
use thiserror::Error;

/// DAMD operation errors
///
/// Every engine-level failure surfaces as a `DamdError`. Lookup misses
/// (unknown keys) are not errors; those calls return `None` or `false`.
#[derive(Error, Debug)]
pub enum DamdError {
    /// Load target is missing or cannot be opened for reading
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Segment key is empty or contains characters outside `[A-Za-z0-9_.-]`
    #[error("Invalid segment key: {0}")]
    InvalidKey(String),

    /// Container marker present but a record could not be decoded
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Materialized payload does not match its stored checksum
    #[error("Corrupt segment '{key}': expected checksum {expected}, got {actual}")]
    CorruptSegment {
        key: String,
        expected: String,
        actual: String,
    },

    /// Container body does not match the CRC recorded in its trailer
    #[error("Corrupt container: expected crc32 {expected:#010x}, got {actual:#010x}")]
    CorruptContainer { expected: u32, actual: u32 },

    #[error("Unsupported container version: {0}")]
    UnsupportedVersion(u16),

    /// Text was requested but the payload is not valid UTF-8
    #[error("Segment '{0}' does not contain valid UTF-8 text")]
    InvalidText(String),

    /// Host content shrank between load and save
    #[error("Host content truncated: expected at least {expected} bytes, found {actual}")]
    HostTruncated { expected: u64, actual: u64 },

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat classification of a [`DamdError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FileNotFound,
    InvalidKey,
    MalformedRecord,
    CorruptSegment,
    CorruptContainer,
    UnsupportedVersion,
    InvalidText,
    HostTruncated,
    Compression,
    Serialization,
    Io,
}

impl DamdError {
    /// Kind of this error, for callers that match on one type
    pub fn kind(&self) -> ErrorKind {
        match self {
            DamdError::FileNotFound(_) => ErrorKind::FileNotFound,
            DamdError::InvalidKey(_) => ErrorKind::InvalidKey,
            DamdError::MalformedRecord(_) => ErrorKind::MalformedRecord,
            DamdError::CorruptSegment { .. } => ErrorKind::CorruptSegment,
            DamdError::CorruptContainer { .. } => ErrorKind::CorruptContainer,
            DamdError::UnsupportedVersion(_) => ErrorKind::UnsupportedVersion,
            DamdError::InvalidText(_) => ErrorKind::InvalidText,
            DamdError::HostTruncated { .. } => ErrorKind::HostTruncated,
            DamdError::Compression(_) => ErrorKind::Compression,
            DamdError::Serialization(_) => ErrorKind::Serialization,
            DamdError::Io(_) => ErrorKind::Io,
        }
    }

    /// True for errors caused by damaged on-disk metadata
    pub fn is_corruption(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MalformedRecord
                | ErrorKind::CorruptSegment
                | ErrorKind::CorruptContainer
                | ErrorKind::Compression
        )
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        DamdError::MalformedRecord(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, DamdError>;
