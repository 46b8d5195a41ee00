//! Batch driver: convert every eligible file in a directory.
//!
//! Enumeration and planning happen up front and are the only steps that can
//! fail the whole batch (`DirectoryUnreadable`). After that each file is an
//! independent [`ConversionRequest`] run on a bounded worker pool; a failing
//! file is recorded in the [`BatchReport`] and the rest carry on.
//!
//! Output paths are derived from input paths (same stem, target tag, same
//! relative sub-directory), so two workers never write the same target.
//! Inputs whose derived target is already claimed by an earlier input, e.g.
//! `a.png` and `a.bmp` both becoming `a.jpg`, are skipped.

use crate::capability;
use crate::dispatch::{same_file, ConversionRequest, Dispatcher};
use crate::error::{ConvertError, FileFailure};
use crate::format::{self, Format};
use crate::output::{Artifact, BatchReport, SkipReason, SkippedFile};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// What to convert in a batch run.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub source_dir: PathBuf,
    pub target_format: Format,
    /// Output directory. Default: `source_dir`.
    pub target_dir: Option<PathBuf>,
    /// Only files with this format are eligible. Default: any format that can
    /// reach `target_format` and is not already in it.
    pub source_format: Option<Format>,
    /// Descend into sub-directories, mirroring them under the target.
    pub recursive: bool,
}

impl BatchRequest {
    pub fn new(source_dir: impl Into<PathBuf>, target_format: Format) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_format,
            target_dir: None,
            source_format: None,
            recursive: false,
        }
    }

    pub fn from_format(mut self, format: Format) -> Self {
        self.source_format = Some(format);
        self
    }

    pub fn target_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.target_dir = Some(dir.into());
        self
    }

    pub fn recursive(mut self, v: bool) -> Self {
        self.recursive = v;
        self
    }

    fn output_dir(&self) -> &Path {
        self.target_dir.as_deref().unwrap_or(&self.source_dir)
    }
}

/// Shared flag that stops a running batch from scheduling more files.
///
/// In-flight conversions are not interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct Plan {
    jobs: Vec<ConversionRequest>,
    skipped: Vec<SkippedFile>,
}

enum Outcome {
    Converted(Artifact),
    Failed(FileFailure),
    Cancelled(PathBuf),
}

/// Convert every eligible file under `request.source_dir`.
///
/// # Errors
/// Only `DirectoryUnreadable`, when the source directory cannot be listed.
/// Per-file problems are reported in [`BatchReport::failed`].
pub async fn convert_dir(
    dispatcher: &Dispatcher,
    request: &BatchRequest,
    cancel: &CancelFlag,
) -> Result<BatchReport, ConvertError> {
    let start = Instant::now();
    info!(
        "Starting batch: {} → {} ({})",
        request.source_dir.display(),
        request.target_format.tag(),
        request.output_dir().display()
    );

    let plan = plan(request)?;
    let total = plan.jobs.len();
    info!(
        "{} files eligible, {} skipped",
        total,
        plan.skipped.len()
    );

    let callback = dispatcher.config().progress_callback.clone();
    if let Some(ref cb) = callback {
        cb.on_batch_start(total);
    }

    let workers = dispatcher.config().workers.max(1);
    let outcomes: Vec<Outcome> = stream::iter(plan.jobs.into_iter().map(|job| {
        let dispatcher = dispatcher.clone();
        let cancel = cancel.clone();
        let callback = callback.clone();
        async move {
            // Checked when a worker slot frees up, so cancelling stops the
            // remaining files from being scheduled.
            if cancel.is_cancelled() {
                return Outcome::Cancelled(job.source);
            }
            if let Some(ref cb) = callback {
                cb.on_file_start(&job.source);
            }

            let source = job.source.clone();
            let target = job.target.clone();
            match dispatcher.convert_async(job).await {
                Ok(artifact) => {
                    if let Some(ref cb) = callback {
                        cb.on_file_complete(&source, &target, artifact.bytes_written);
                    }
                    Outcome::Converted(artifact)
                }
                Err(e) => {
                    warn!("Skipping {} after failure: {}", source.display(), e);
                    if let Some(ref cb) = callback {
                        cb.on_file_error(&source, &e.to_string());
                    }
                    Outcome::Failed(FileFailure::new(source, target, &e))
                }
            }
        }
    }))
    .buffer_unordered(workers)
    .collect()
    .await;

    let mut report = BatchReport {
        skipped: plan.skipped,
        ..BatchReport::default()
    };
    for outcome in outcomes {
        match outcome {
            Outcome::Converted(a) => report.converted.push(a),
            Outcome::Failed(f) => report.failed.push(f),
            Outcome::Cancelled(p) => report.cancelled.push(p),
        }
    }

    // Completion order is arbitrary; report in path order.
    report.converted.sort_by(|a, b| a.source.cmp(&b.source));
    report.failed.sort_by(|a, b| a.source.cmp(&b.source));
    report.cancelled.sort();
    report.duration_ms = start.elapsed().as_millis() as u64;

    if !report.cancelled.is_empty() {
        warn!("Batch cancelled; {} files not scheduled", report.cancelled.len());
    }
    info!(
        "Batch complete: {}/{} converted, {} failed, {}ms",
        report.converted.len(),
        total,
        report.failed.len(),
        report.duration_ms
    );

    if let Some(ref cb) = callback {
        cb.on_batch_complete(total, report.converted.len());
    }

    Ok(report)
}

/// Synchronous wrapper around [`convert_dir`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_dir_sync(
    dispatcher: &Dispatcher,
    request: &BatchRequest,
) -> Result<BatchReport, ConvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::ConversionFailed {
            source_path: request.source_dir.clone(),
            target_path: request.output_dir().to_path_buf(),
            details: format!("failed to create tokio runtime: {e}"),
        })?
        .block_on(convert_dir(dispatcher, request, &CancelFlag::new()))
}

// ── Planning ─────────────────────────────────────────────────────────────

fn plan(request: &BatchRequest) -> Result<Plan, ConvertError> {
    let files = list_files(request)?;
    let out_dir = request.output_dir();
    let target = request.target_format;

    let mut plan = Plan::default();
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();

    for path in files {
        let tag = format::tag(&path);
        let eligible = match (request.source_format, Format::from_tag(&tag)) {
            (Some(expected), Some(f)) if f == expected => Ok(()),
            (Some(_), _) => Err(SkipReason::FormatMismatch { tag }),
            (None, Some(f)) if f == target => Err(SkipReason::AlreadyTargetFormat),
            (None, Some(f)) if capability::supports(f, target) => Ok(()),
            (None, _) => Err(SkipReason::FormatMismatch { tag }),
        };
        if let Err(reason) = eligible {
            debug!("Skipping {}: {:?}", path.display(), reason);
            plan.skipped.push(SkippedFile { path, reason });
            continue;
        }

        let target_path = target_path_for(&path, &request.source_dir, out_dir, target);
        if same_file(&path, &target_path) {
            debug!("Skipping {}: it is its own target", path.display());
            plan.skipped.push(SkippedFile {
                path,
                reason: SkipReason::AlreadyTargetFormat,
            });
            continue;
        }
        if let Some(first) = claimed.get(&target_path) {
            plan.skipped.push(SkippedFile {
                path,
                reason: SkipReason::TargetCollision { with: first.clone() },
            });
            continue;
        }
        claimed.insert(target_path.clone(), path.clone());
        plan.jobs.push(ConversionRequest::new(path, target_path));
    }

    Ok(plan)
}

/// `<out_dir>/<relative parent>/<stem><target tag>`
fn target_path_for(source: &Path, source_dir: &Path, out_dir: &Path, target: Format) -> PathBuf {
    let rel_parent = source
        .strip_prefix(source_dir)
        .ok()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new(""));
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    out_dir
        .join(rel_parent)
        .join(format!("{stem}{}", target.tag()))
}

/// Regular files under the source directory, sorted by path.
fn list_files(request: &BatchRequest) -> Result<Vec<PathBuf>, ConvertError> {
    let root = &request.source_dir;
    let unreadable = |source: std::io::Error| ConvertError::DirectoryUnreadable {
        path: root.clone(),
        source,
    };

    let mut files = Vec::new();
    if request.recursive {
        // Outputs from a previous run must not become inputs.
        let exclude = request.target_dir.as_deref().filter(|d| *d != root.as_path());
        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(unreadable(e.into())),
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            if exclude.is_some_and(|d| path.starts_with(d)) {
                continue;
            }
            if path.is_file() {
                files.push(path.to_path_buf());
            }
        }
    } else {
        for entry in std::fs::read_dir(root).map_err(unreadable)? {
            let path = entry.map_err(unreadable)?.path();
            if path.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        if let Some(parent) = p.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&p, b"").unwrap();
        p
    }

    #[test]
    fn target_path_mirrors_subdirectories() {
        let p = target_path_for(
            Path::new("/in/sub/photo.png"),
            Path::new("/in"),
            Path::new("/out"),
            Format::Jpg,
        );
        assert_eq!(p, PathBuf::from("/out/sub/photo.jpg"));
    }

    #[test]
    fn plan_filters_by_expected_format() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");
        touch(dir.path(), "b.bmp");
        touch(dir.path(), "c.txt");

        let req = BatchRequest::new(dir.path(), Format::Jpg).from_format(Format::Png);
        let plan = plan(&req).unwrap();
        assert_eq!(plan.jobs.len(), 1);
        assert_eq!(plan.jobs[0].target, dir.path().join("a.jpg"));
        assert_eq!(plan.skipped.len(), 2);
    }

    #[test]
    fn plan_without_expected_format_takes_every_reachable_source() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");
        touch(dir.path(), "b.jpg");
        touch(dir.path(), "c.json");
        touch(dir.path(), "d.webp");

        let req = BatchRequest::new(dir.path(), Format::Jpg);
        let plan = plan(&req).unwrap();
        let sources: Vec<_> = plan.jobs.iter().map(|j| j.source.clone()).collect();
        assert_eq!(sources, [dir.path().join("a.png"), dir.path().join("d.webp")]);

        let reasons: Vec<_> = plan.skipped.iter().map(|s| s.reason.clone()).collect();
        assert!(reasons.contains(&SkipReason::AlreadyTargetFormat));
        assert!(reasons.contains(&SkipReason::FormatMismatch { tag: ".json".into() }));
    }

    #[test]
    fn plan_skips_target_collisions() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.bmp");
        touch(dir.path(), "a.png");

        let plan = plan(&BatchRequest::new(dir.path(), Format::Jpg)).unwrap();
        assert_eq!(plan.jobs.len(), 1);
        assert_eq!(plan.jobs[0].source, dir.path().join("a.bmp"));
        assert_eq!(
            plan.skipped[0].reason,
            SkipReason::TargetCollision {
                with: dir.path().join("a.bmp")
            }
        );
    }

    #[test]
    fn plan_recursive_excludes_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "top.png");
        touch(dir.path(), "nested/inner.png");
        touch(dir.path(), "out/old.png");

        let req = BatchRequest::new(dir.path(), Format::Jpg)
            .target_dir(dir.path().join("out"))
            .recursive(true);
        let plan = plan(&req).unwrap();
        let targets: Vec<_> = plan.jobs.iter().map(|j| j.target.clone()).collect();
        assert_eq!(
            targets,
            [
                dir.path().join("out/nested/inner.jpg"),
                dir.path().join("out/top.jpg"),
            ]
        );
    }

    #[test]
    fn plan_non_recursive_ignores_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "nested/inner.png");
        let plan = plan(&BatchRequest::new(dir.path(), Format::Jpg)).unwrap();
        assert!(plan.jobs.is_empty());
    }

    #[test]
    fn missing_directory_is_fatal() {
        let err = plan(&BatchRequest::new("/definitely/not/here", Format::Jpg)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DirectoryUnreadable);
    }

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
