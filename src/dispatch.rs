//! The format-conversion dispatcher.
//!
//! ## Request lifecycle
//!
//! ```text
//! Received ──▶ Validated ──┬─▶ IdentityCopy ──┬─▶ Verified ──▶ Succeeded
//!                          └─▶ Transcoded ────┘
//!        (any step) ──▶ Failed(kind)
//! ```
//!
//! 1. `Received`     the source must exist (`InputNotFound` otherwise)
//! 2. `Validated`    capability-table lookup, no I/O
//! 3. `IdentityCopy` same format: byte copy, never re-encoded
//!    `Transcoded`   decode with the source codec, encode with the target's
//! 4. `Verified`     output staged in a temp file is renamed onto the target
//!    and re-opened; a missing or unreadable result is `OutputMissing`
//!
//! Nothing is retried. A failed request leaves no file at the target path
//! that it did not already have: the staged temp file is deleted on drop.

use crate::capability;
use crate::codec::{self, EncodeOptions};
use crate::config::DispatcherConfig;
use crate::error::{CodecError, ConvertError, ErrorKind};
use crate::format::{self, Format};
use crate::output::{Artifact, Route};
use std::fs::File;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// A single `(source_path, target_path)` conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub source: PathBuf,
    pub target: PathBuf,
}

impl ConversionRequest {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn source_tag(&self) -> String {
        format::tag(&self.source)
    }

    pub fn target_tag(&self) -> String {
        format::tag(&self.target)
    }
}

/// Check a `(source_tag, target_tag)` pair against the capability table.
///
/// Pure: never touches the filesystem. Identity passes when the table lists
/// it.
pub fn validate(source_tag: &str, target_tag: &str) -> Result<(Format, Format), ErrorKind> {
    let source = Format::from_tag(source_tag)
        .filter(|f| capability::targets(*f).is_some())
        .ok_or(ErrorKind::UnsupportedSource)?;
    let target = Format::from_tag(target_tag)
        .filter(|t| capability::supports(source, *t))
        .ok_or(ErrorKind::UnsupportedTarget)?;
    Ok((source, target))
}

/// Validates, executes and verifies conversion requests.
///
/// Cheap to clone: the configuration is shared behind an `Arc` and is never
/// mutated after construction.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: Arc<DispatcherConfig>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            jpeg_quality: self.config.jpeg_quality,
            background: self.config.background,
        }
    }

    /// [`validate`] with the request's paths and the capability listing
    /// attached to the error.
    pub fn validate_request(
        &self,
        request: &ConversionRequest,
    ) -> Result<(Format, Format), ConvertError> {
        let source_tag = request.source_tag();
        let target_tag = request.target_tag();
        validate(&source_tag, &target_tag).map_err(|kind| match kind {
            ErrorKind::UnsupportedSource => ConvertError::UnsupportedSource {
                path: request.source.clone(),
                tag: source_tag.clone(),
                listing: capability::listing(),
            },
            _ => ConvertError::UnsupportedTarget {
                source_path: request.source.clone(),
                target_path: request.target.clone(),
                source_tag: source_tag.clone(),
                target_tag: target_tag.clone(),
                listing: capability::listing(),
            },
        })
    }

    /// Run one request to a terminal state.
    pub fn convert(&self, request: &ConversionRequest) -> Result<Artifact, ConvertError> {
        let source = request.source.as_path();
        let target = request.target.as_path();
        info!("Converting {} → {}", source.display(), target.display());

        // ── Received ─────────────────────────────────────────────────────
        if !source.is_file() {
            return Err(ConvertError::InputNotFound {
                path: source.to_path_buf(),
            });
        }

        // ── Validated ────────────────────────────────────────────────────
        let (source_format, target_format) = self.validate_request(request)?;
        let route = if source_format == target_format {
            if same_file(source, target) {
                return Err(ConvertError::NoOpSamePath {
                    path: source.to_path_buf(),
                    tag: source_format.tag().to_string(),
                });
            }
            Route::IdentityCopy
        } else {
            Route::Transcoded
        };
        debug!(
            "Validated {} ({} → {}), route {:?}",
            source.display(),
            source_format.tag(),
            target_format.tag(),
            route
        );

        // ── IdentityCopy | Transcoded ────────────────────────────────────
        let staged = self.stage(request)?;
        match route {
            Route::IdentityCopy => {
                std::fs::copy(source, staged.path()).map_err(|e| self.failed(request, e))?;
            }
            Route::Transcoded => {
                self.transcode(request, staged.path(), source_format, target_format)?;
            }
        }

        // ── Verified ─────────────────────────────────────────────────────
        self.persist(request, staged)?;
        let bytes_written = verify_output(target)?;

        info!(
            "Converted {} → {} ({} bytes)",
            source.display(),
            target.display(),
            bytes_written
        );
        Ok(Artifact {
            source: source.to_path_buf(),
            path: target.to_path_buf(),
            source_format,
            target_format,
            route,
            bytes_written,
        })
    }

    /// [`Dispatcher::convert`] on tokio's blocking pool.
    ///
    /// A panic inside the worker is reported as `ConversionFailed`.
    pub async fn convert_async(&self, request: ConversionRequest) -> Result<Artifact, ConvertError> {
        let dispatcher = self.clone();
        let source = request.source.clone();
        let target = request.target.clone();
        tokio::task::spawn_blocking(move || dispatcher.convert(&request))
            .await
            .map_err(|e| ConvertError::ConversionFailed {
                source_path: source,
                target_path: target,
                details: format!("worker task failed: {e}"),
            })?
    }

    /// Create the temp file the output is written to before it is renamed.
    fn stage(&self, request: &ConversionRequest) -> Result<NamedTempFile, ConvertError> {
        let parent = request
            .target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| self.failed(request, e))?;

        let dir = self.config.temp_dir.as_deref().unwrap_or(parent);
        stage_in(dir)
            .map_err(|e| self.failed(request, format!("cannot create temp file in '{}': {e}", dir.display())))
    }

    fn transcode(
        &self,
        request: &ConversionRequest,
        staged: &Path,
        source_format: Format,
        target_format: Format,
    ) -> Result<(), ConvertError> {
        let opts = self.encode_options();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let doc = codec::decode(&request.source, source_format, target_format)?;
            codec::encode(&doc, staged, target_format, &opts)
        }));

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(CodecError::Decode(detail))) => Err(ConvertError::DecodeError {
                path: request.source.clone(),
                format: source_format.to_string(),
                detail,
            }),
            Ok(Err(CodecError::Encode(detail))) => Err(ConvertError::EncodeError {
                path: request.target.clone(),
                format: target_format.to_string(),
                detail,
            }),
            Err(payload) => Err(self.failed(request, format!("codec panicked: {}", panic_message(&*payload)))),
        }
    }

    fn persist(&self, request: &ConversionRequest, staged: NamedTempFile) -> Result<(), ConvertError> {
        persist_staged(staged, &request.target)
            .map_err(|e| self.failed(request, format!("cannot move output into place: {e}")))
    }

    fn failed(&self, request: &ConversionRequest, details: impl ToString) -> ConvertError {
        let details = details.to_string();
        warn!(
            "Conversion {} → {} failed: {}",
            request.source.display(),
            request.target.display(),
            details
        );
        ConvertError::ConversionFailed {
            source_path: request.source.clone(),
            target_path: request.target.clone(),
            details,
        }
    }
}

/// Create an empty `.formaverter-*.part` temp file in `dir`.
pub(crate) fn stage_in(dir: &Path) -> io::Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(".formaverter-")
        .suffix(".part")
        .tempfile_in(dir)
}

/// Move a staged temp file onto `target`.
///
/// `target` is only ever replaced by a rename. When the rename crosses
/// filesystems (a `temp_dir` on another mount) the content is copied into a
/// second temp file beside `target`, which is then renamed. Any other rename
/// error is returned and the staged file is deleted.
pub(crate) fn persist_staged(staged: NamedTempFile, target: &Path) -> io::Result<()> {
    let err = match staged.persist(target) {
        Ok(_) => return Ok(()),
        Err(err) => err,
    };
    if err.error.kind() != io::ErrorKind::CrossesDevices {
        return Err(err.error);
    }
    debug!(
        "Rename onto {} crosses filesystems, staging a local copy",
        target.display()
    );

    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut local = stage_in(parent)?;
    let mut content = File::open(err.file.path())?;
    io::copy(&mut content, local.as_file_mut())?;
    local.as_file().sync_all()?;
    local.persist(target).map(|_| ()).map_err(|e| e.error)
}

/// True when both paths name the same file, lexically or after resolving.
pub(crate) fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn verify_output(path: &Path) -> Result<u64, ConvertError> {
    let missing = || ConvertError::OutputMissing {
        path: path.to_path_buf(),
    };
    let file = File::open(path).map_err(|_| missing())?;
    let meta = file.metadata().map_err(|_| missing())?;
    if !meta.is_file() {
        return Err(missing());
    }
    Ok(meta.len())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
