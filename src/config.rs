//! Configuration for the conversion dispatcher.
//!
//! Everything a conversion may consult lives in [`DispatcherConfig`], built
//! once at process start via [`DispatcherConfigBuilder`] and shared
//! read-only afterwards (it is cheap to clone; the dispatcher keeps it behind
//! an `Arc`).

use crate::error::ConvertError;
use crate::progress::BatchProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for the dispatcher and the batch driver.
///
/// # Example
/// ```rust
/// use formaverter::DispatcherConfig;
///
/// let config = DispatcherConfig::builder()
///     .workers(4)
///     .jpeg_quality(85)
///     .build()
///     .unwrap();
/// assert_eq!(config.workers, 4);
/// ```
#[derive(Clone)]
pub struct DispatcherConfig {
    /// Directory for in-progress output files. Default: `None`.
    ///
    /// When unset, temp files are created next to the target so the final
    /// rename stays on one filesystem. A directory on another filesystem
    /// still works; the final step then degrades to copy-and-delete.
    pub temp_dir: Option<PathBuf>,

    /// Batch worker-pool size. Default: available parallelism.
    pub workers: usize,

    /// JPEG encoder quality, 1–100. Default: 90.
    pub jpeg_quality: u8,

    /// Opaque colour used when flattening alpha for formats without it.
    /// Default: white.
    pub background: [u8; 3],

    /// Where the CLI sends log records. Default: [`LogSink::Stderr`].
    pub log_sink: LogSink,

    /// Optional batch progress observer.
    pub progress_callback: Option<Arc<dyn BatchProgressCallback>>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            workers: default_workers(),
            jpeg_quality: 90,
            background: [255, 255, 255],
            log_sink: LogSink::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DispatcherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherConfig")
            .field("temp_dir", &self.temp_dir)
            .field("workers", &self.workers)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("background", &self.background)
            .field("log_sink", &self.log_sink)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl DispatcherConfig {
    /// Create a new builder for `DispatcherConfig`.
    pub fn builder() -> DispatcherConfigBuilder {
        DispatcherConfigBuilder {
            config: Self::default(),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Builder for [`DispatcherConfig`].
#[derive(Debug)]
pub struct DispatcherConfigBuilder {
    config: DispatcherConfig,
}

impl DispatcherConfigBuilder {
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n.max(1);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn background(mut self, rgb: [u8; 3]) -> Self {
        self.config.background = rgb;
        self
    }

    pub fn log_sink(mut self, sink: LogSink) -> Self {
        self.config.log_sink = sink;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn BatchProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DispatcherConfig, ConvertError> {
        let c = &self.config;
        if c.workers == 0 {
            return Err(ConvertError::InvalidConfig("Workers must be ≥ 1".into()));
        }
        if !(1..=100).contains(&c.jpeg_quality) {
            return Err(ConvertError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if let Some(ref dir) = c.temp_dir {
            if !dir.is_dir() {
                return Err(ConvertError::InvalidConfig(format!(
                    "Temp directory '{}' does not exist",
                    dir.display()
                )));
            }
        }
        Ok(self.config)
    }
}

/// Destination for log output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogSink {
    /// Standard error (default).
    #[default]
    Stderr,
    /// Append to this file, without ANSI colours.
    File(PathBuf),
}
