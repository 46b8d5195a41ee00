//! Result types returned by the dispatcher and the batch driver.

use crate::error::FileFailure;
use crate::format::Format;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a successful request was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    /// Same format on both sides: the source bytes were copied unchanged.
    IdentityCopy,
    /// Decoded with the source codec and re-encoded with the target codec.
    Transcoded,
}

/// A verified output file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub source: PathBuf,
    pub path: PathBuf,
    pub source_format: Format,
    pub target_format: Format,
    pub route: Route,
    pub bytes_written: u64,
}

/// Why a file in a batch directory was not converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The file's tag does not match the expected source format, or it is
    /// not a format that can reach the target.
    FormatMismatch { tag: String },
    /// Already in the target format.
    AlreadyTargetFormat,
    /// Another input in the same run maps to the same output path.
    TargetCollision { with: PathBuf },
}

/// A file the batch driver left alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Outcome of a batch run.
///
/// The run itself succeeded; individual files may still have failed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub converted: Vec<Artifact>,
    pub failed: Vec<FileFailure>,
    pub skipped: Vec<SkippedFile>,
    /// Eligible files never scheduled because the batch was cancelled.
    pub cancelled: Vec<PathBuf>,
    pub duration_ms: u64,
}

impl BatchReport {
    /// Number of files that were eligible for conversion.
    pub fn eligible(&self) -> usize {
        self.converted.len() + self.failed.len() + self.cancelled.len()
    }

    /// True when no eligible file failed or was cancelled.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty()
    }
}
