//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::DispatcherConfigBuilder::progress_callback`] to receive
//! events as the batch driver works through a directory.
//!
//! # Example
//!
//! ```rust
//! use formaverter::{BatchProgressCallback, DispatcherConfig};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, source: &Path, _target: &Path, bytes: u64) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{} done ({} bytes)", source.display(), bytes);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = DispatcherConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the batch driver as it processes each file.
///
/// Implementations must be `Send + Sync`: files are converted concurrently,
/// so `on_file_start`, `on_file_complete` and `on_file_error` may be called
/// from different worker threads at once. All methods default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once, after enumeration, with the number of eligible files.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a file is handed to a worker.
    fn on_file_start(&self, source: &Path) {
        let _ = source;
    }

    /// Called when a file converted successfully.
    fn on_file_complete(&self, source: &Path, target: &Path, bytes_written: u64) {
        let _ = (source, target, bytes_written);
    }

    /// Called when a file failed.
    fn on_file_error(&self, source: &Path, error: &str) {
        let _ = (source, error);
    }

    /// Called once after every scheduled file has finished.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DispatcherConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        total: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total_files: usize) {
            self.total.store(total_files, Ordering::SeqCst);
        }

        fn on_file_start(&self, _source: &Path) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_complete(&self, _source: &Path, _target: &Path, _bytes: u64) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_error(&self, _source: &Path, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_file_start(Path::new("a.png"));
        cb.on_file_complete(Path::new("a.png"), Path::new("a.jpg"), 10);
        cb.on_file_error(Path::new("b.png"), "decode failed");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_batch_start(3);
        tracker.on_file_start(Path::new("1.png"));
        tracker.on_file_complete(Path::new("1.png"), Path::new("1.jpg"), 100);
        tracker.on_file_start(Path::new("2.png"));
        tracker.on_file_error(Path::new("2.png"), "truncated");

        assert_eq!(tracker.total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }
}
