//! Animated GIF frame splitting.
//!
//! Every frame is written as its own PNG so transparency survives, named
//! `<gif file name>_<index:03>.png` (e.g. `spinner.gif_000.png`). Frames are
//! staged in the dispatcher's `temp_dir` (or `out_dir` when unset) and
//! renamed into place like single conversions.
//!
//! The split is all or nothing: when a frame fails, the frames already
//! written by this call are removed again.

use crate::dispatch::{persist_staged, stage_in, Dispatcher};
use crate::error::ConvertError;
use crate::format::{self, Format};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, Frame, ImageFormat};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Split `gif_path` into PNG frames inside `out_dir` (created if missing).
///
/// Returns the frame paths in frame order.
pub fn split_gif(
    dispatcher: &Dispatcher,
    gif_path: &Path,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, ConvertError> {
    if !gif_path.is_file() {
        return Err(ConvertError::InputNotFound {
            path: gif_path.to_path_buf(),
        });
    }
    let tag = format::tag(gif_path);
    if Format::from_tag(&tag) != Some(Format::Gif) {
        return Err(ConvertError::UnsupportedSource {
            path: gif_path.to_path_buf(),
            tag,
            listing: "Frame splitting accepts .gif files only".into(),
        });
    }

    let decode_err = |detail: String| ConvertError::DecodeError {
        path: gif_path.to_path_buf(),
        format: Format::Gif.to_string(),
        detail,
    };
    let file = File::open(gif_path).map_err(|e| decode_err(e.to_string()))?;
    let frames = GifDecoder::new(BufReader::new(file))
        .map_err(|e| decode_err(e.to_string()))?
        .into_frames()
        .collect_frames()
        .map_err(|e| decode_err(e.to_string()))?;

    std::fs::create_dir_all(out_dir).map_err(|e| ConvertError::ConversionFailed {
        source_path: gif_path.to_path_buf(),
        target_path: out_dir.to_path_buf(),
        details: e.to_string(),
    })?;

    let base = gif_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frames.gif".to_string());
    let staging_dir = dispatcher.config().temp_dir.as_deref().unwrap_or(out_dir);

    let mut written = Vec::with_capacity(frames.len());
    for (i, frame) in frames.into_iter().enumerate() {
        let target = out_dir.join(format!("{base}_{i:03}.png"));
        if let Err(e) = write_frame(frame, staging_dir, gif_path, &target) {
            remove_written(&written);
            return Err(e);
        }
        debug!("Wrote frame {} → {}", i, target.display());
        written.push(target);
    }

    info!(
        "Split {} frames from {} into {}",
        written.len(),
        gif_path.display(),
        out_dir.display()
    );
    Ok(written)
}

fn write_frame(
    frame: Frame,
    staging_dir: &Path,
    gif_path: &Path,
    target: &Path,
) -> Result<(), ConvertError> {
    let failed = |details: String| ConvertError::ConversionFailed {
        source_path: gif_path.to_path_buf(),
        target_path: target.to_path_buf(),
        details,
    };

    let mut staged = stage_in(staging_dir).map_err(|e| {
        failed(format!(
            "cannot create temp file in '{}': {e}",
            staging_dir.display()
        ))
    })?;
    frame
        .into_buffer()
        .write_to(staged.as_file_mut(), ImageFormat::Png)
        .map_err(|e| ConvertError::EncodeError {
            path: target.to_path_buf(),
            format: Format::Png.to_string(),
            detail: e.to_string(),
        })?;
    persist_staged(staged, target)
        .map_err(|e| failed(format!("cannot move frame into place: {e}")))
}

fn remove_written(frames: &[PathBuf]) {
    for path in frames {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Could not remove partial frame {}: {}", path.display(), e);
        }
    }
}
