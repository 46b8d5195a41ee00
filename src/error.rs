//! Error types for the formaverter library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`ConvertError`]: **fatal** for one request: the conversion cannot
//!   proceed or did not produce its artifact. Returned as
//!   `Err(ConvertError)` from [`crate::Dispatcher::convert`] and, for
//!   structural problems only, from [`crate::convert_dir`].
//!
//! * [`CodecError`]: raised inside a codec ([`crate::codec`]). The
//!   dispatcher attributes it to a request (paths, formats) and re-classifies
//!   it as [`ConvertError::DecodeError`] or [`ConvertError::EncodeError`].
//!
//! * [`FileFailure`]: **non-fatal** in batch mode: one file failed but the
//!   rest of the directory is fine. Stored inside
//!   [`crate::output::BatchReport`] so callers can inspect partial success.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors a single conversion request can end in.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source file does not exist.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    // ── Validation errors ─────────────────────────────────────────────────
    /// The source format tag is not a key of the capability table.
    #[error("Unsupported source format '{tag}' for '{path}'\n{listing}")]
    UnsupportedSource {
        path: PathBuf,
        tag: String,
        listing: String,
    },

    /// The target format tag is not reachable from the source format.
    #[error("Unsupported conversion '{source_tag}' → '{target_tag}' ('{source_path}' → '{target_path}')\n{listing}")]
    UnsupportedTarget {
        source_path: PathBuf,
        target_path: PathBuf,
        source_tag: String,
        target_tag: String,
        listing: String,
    },

    /// Identity conversion onto the source file itself.
    #[error("Refusing to convert '{path}' onto itself ({tag} → {tag})\nChoose a different output path.")]
    NoOpSamePath { path: PathBuf, tag: String },

    // ── Codec errors ──────────────────────────────────────────────────────
    /// The source file could not be decoded as its tagged format.
    #[error("Failed to decode '{path}' as {format}: {detail}")]
    DecodeError {
        path: PathBuf,
        format: String,
        detail: String,
    },

    /// The decoded content could not be written as the target format.
    #[error("Failed to encode '{path}' as {format}: {detail}")]
    EncodeError {
        path: PathBuf,
        format: String,
        detail: String,
    },

    // ── Execution errors ──────────────────────────────────────────────────
    /// Any other failure while executing a validated request.
    #[error("Conversion '{source_path}' → '{target_path}' failed: {details}")]
    ConversionFailed {
        source_path: PathBuf,
        target_path: PathBuf,
        details: String,
    },

    /// The conversion reported success but no readable artifact exists.
    #[error("Conversion reported success but '{path}' is missing or unreadable")]
    OutputMissing { path: PathBuf },

    // ── Batch errors ──────────────────────────────────────────────────────
    /// The batch source directory could not be listed at all.
    #[error("Cannot read directory '{path}': {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse classification of a [`ConvertError`], cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnsupportedSource,
    UnsupportedTarget,
    NoOpSamePath,
    DecodeError,
    EncodeError,
    ConversionFailed,
    OutputMissing,
    InputNotFound,
    DirectoryUnreadable,
    InvalidConfig,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl ConvertError {
    /// The classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::InputNotFound { .. } => ErrorKind::InputNotFound,
            ConvertError::UnsupportedSource { .. } => ErrorKind::UnsupportedSource,
            ConvertError::UnsupportedTarget { .. } => ErrorKind::UnsupportedTarget,
            ConvertError::NoOpSamePath { .. } => ErrorKind::NoOpSamePath,
            ConvertError::DecodeError { .. } => ErrorKind::DecodeError,
            ConvertError::EncodeError { .. } => ErrorKind::EncodeError,
            ConvertError::ConversionFailed { .. } => ErrorKind::ConversionFailed,
            ConvertError::OutputMissing { .. } => ErrorKind::OutputMissing,
            ConvertError::DirectoryUnreadable { .. } => ErrorKind::DirectoryUnreadable,
            ConvertError::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    /// True for errors detected before any file was opened.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::UnsupportedSource | ErrorKind::UnsupportedTarget | ErrorKind::NoOpSamePath
        )
    }
}

/// Failure raised by a codec, before the dispatcher attributes it.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    Encode(String),
}

/// A non-fatal failure for a single file in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFailure {
    pub source: PathBuf,
    pub target: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
}

impl FileFailure {
    pub(crate) fn new(source: PathBuf, target: PathBuf, err: &ConvertError) -> Self {
        Self {
            source,
            target,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}] {}", self.source.display(), self.kind, self.message)
    }
}
