//! Format tags: normalised, dot-prefixed file extensions.
//!
//! A format is always derived from the path, never sniffed from magic bytes,
//! so the same file renamed from `.png` to `.jpg` is treated as a JPG (and
//! will fail to decode). That keeps validation free of I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Every format the crate knows how to name.
///
/// Knowing a format does not mean it can be converted; that is decided by the
/// [capability table](crate::capability).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Png,
    Jpg,
    Bmp,
    Webp,
    Gif,
    Json,
    Csv,
    Xml,
    Odt,
    Txt,
    Html,
    Pdf,
}

impl Format {
    pub const ALL: [Format; 12] = [
        Format::Png,
        Format::Jpg,
        Format::Bmp,
        Format::Webp,
        Format::Gif,
        Format::Json,
        Format::Csv,
        Format::Xml,
        Format::Odt,
        Format::Txt,
        Format::Html,
        Format::Pdf,
    ];

    /// Parse a format tag (`".png"`, `"PNG"`, `"jpeg"`).
    ///
    /// The leading dot is optional and case is ignored. `.jpeg` is an alias
    /// for [`Format::Jpg`], `.htm` for [`Format::Html`].
    pub fn from_tag(tag: &str) -> Option<Format> {
        let t = normalize_tag(tag);
        let f = match t.as_str() {
            ".png" => Format::Png,
            ".jpg" | ".jpeg" => Format::Jpg,
            ".bmp" => Format::Bmp,
            ".webp" => Format::Webp,
            ".gif" => Format::Gif,
            ".json" => Format::Json,
            ".csv" => Format::Csv,
            ".xml" => Format::Xml,
            ".odt" => Format::Odt,
            ".txt" => Format::Txt,
            ".html" | ".htm" => Format::Html,
            ".pdf" => Format::Pdf,
            _ => return None,
        };
        Some(f)
    }

    /// Canonical tag, e.g. `".jpg"`.
    pub fn tag(self) -> &'static str {
        match self {
            Format::Png => ".png",
            Format::Jpg => ".jpg",
            Format::Bmp => ".bmp",
            Format::Webp => ".webp",
            Format::Gif => ".gif",
            Format::Json => ".json",
            Format::Csv => ".csv",
            Format::Xml => ".xml",
            Format::Odt => ".odt",
            Format::Txt => ".txt",
            Format::Html => ".html",
            Format::Pdf => ".pdf",
        }
    }

    /// Human-readable name used in listings and error messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Format::Png => "PNG",
            Format::Jpg => "JPEG",
            Format::Bmp => "BMP",
            Format::Webp => "WebP",
            Format::Gif => "GIF",
            Format::Json => "JSON",
            Format::Csv => "CSV",
            Format::Xml => "XML",
            Format::Odt => "ODT",
            Format::Txt => "plain text",
            Format::Html => "HTML",
            Format::Pdf => "PDF",
        }
    }

    pub fn is_raster(self) -> bool {
        matches!(
            self,
            Format::Png | Format::Jpg | Format::Bmp | Format::Webp | Format::Gif
        )
    }

    /// Format of a path, or `None` when the extension is missing or unknown.
    pub fn of_path(path: &Path) -> Option<Format> {
        Format::from_tag(&tag(path))
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Derive the normalised format tag of a path: lowercase, dot-prefixed.
///
/// Returns an empty string when the path has no extension.
pub fn tag(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

fn normalize_tag(tag: &str) -> String {
    let t = tag.trim().to_lowercase();
    if t.is_empty() || t.starts_with('.') {
        t
    } else {
        format!(".{t}")
    }
}
