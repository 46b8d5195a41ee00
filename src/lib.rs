//! # formaverter
//!
//! Convert files between formats through one table-driven dispatcher:
//! raster images (PNG, JPG, BMP, WebP, GIF), record files (JSON, CSV, XML)
//! and documents (HTML, PDF, OpenDocument text).
//!
//! ## Request Pipeline
//!
//! ```text
//! (source, target)
//!  │
//!  ├─ 1. Exists    the source file must be there          InputNotFound
//!  ├─ 2. Validate  capability-table lookup, no I/O        Unsupported*
//!  ├─ 3. Route     same format → byte copy                NoOpSamePath
//!  │               otherwise → decode + encode            DecodeError / EncodeError
//!  ├─ 4. Persist   temp file renamed onto the target      ConversionFailed
//!  └─ 5. Verify    target exists and is readable          OutputMissing
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use formaverter::{ConversionRequest, Dispatcher, DispatcherConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = Dispatcher::new(DispatcherConfig::default());
//!     let artifact = dispatcher.convert(&ConversionRequest::new("data.json", "data.csv"))?;
//!     eprintln!("wrote {} bytes to {}", artifact.bytes_written, artifact.path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Batch Conversion
//!
//! ```rust,no_run
//! use formaverter::{convert_dir, BatchRequest, CancelFlag, Dispatcher, Format};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = Dispatcher::default();
//! let request = BatchRequest::new("photos/", Format::Jpg).from_format(Format::Png);
//! let report = convert_dir(&dispatcher, &request, &CancelFlag::new()).await?;
//! for failure in &report.failed {
//!     eprintln!("{failure}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `formaverter` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod capability;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod frames;
pub mod output;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{convert_dir, convert_dir_sync, BatchRequest, CancelFlag};
pub use config::{DispatcherConfig, DispatcherConfigBuilder, LogSink};
pub use dispatch::{validate, ConversionRequest, Dispatcher};
pub use error::{ConvertError, ErrorKind, FileFailure};
pub use format::{tag, Format};
pub use frames::split_gif;
pub use output::{Artifact, BatchReport, Route, SkipReason, SkippedFile};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
