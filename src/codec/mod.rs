//! Content codecs: decode a file into a [`Document`], encode it back out.
//!
//! Each submodule owns one family of formats:
//!
//! ```text
//! raster   PNG / JPG / BMP / WebP / GIF  ⇄ DynamicImage
//! records  JSON / CSV / XML              ⇄ Vec<Record>
//! html     HTML                          → text, or first table → Vec<Record>
//! odt      ODT                           → text
//! pdf      PDF                           → text
//! text     encoding detection for every text-based reader
//! ```
//!
//! Codecs know nothing about requests, temp files or the capability table;
//! they take a path and a [`Format`] and return `Result<_, CodecError>`. The
//! dispatcher attributes failures to the request that caused them.

pub mod html;
pub mod odt;
pub mod pdf;
pub mod raster;
pub mod records;
pub mod text;

use crate::error::CodecError;
use crate::format::Format;
use image::DynamicImage;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

pub use records::Record;

/// Decoded, format-neutral content.
#[derive(Debug, Clone)]
pub enum Document {
    Raster(DynamicImage),
    Records(Vec<Record>),
    Text(String),
}

impl Document {
    fn describe(&self) -> &'static str {
        match self {
            Document::Raster(_) => "raster image",
            Document::Records(_) => "record set",
            Document::Text(_) => "text",
        }
    }
}

/// Encoder knobs taken from [`crate::DispatcherConfig`].
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub jpeg_quality: u8,
    pub background: [u8; 3],
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: 90,
            background: [255, 255, 255],
        }
    }
}

/// Decode `path` as `format` into the form `target` is encoded from.
///
/// Only HTML depends on `target`: a text target takes the visible text,
/// anything else takes the first table.
pub fn decode(path: &Path, format: Format, target: Format) -> Result<Document, CodecError> {
    let doc = match format {
        Format::Png | Format::Jpg | Format::Bmp | Format::Webp | Format::Gif => {
            Document::Raster(raster::decode(path, format)?)
        }
        Format::Json => Document::Records(records::read_json(path)?),
        Format::Csv => Document::Records(records::read_csv(path)?),
        Format::Xml => Document::Records(records::read_xml(path)?),
        Format::Odt => Document::Text(odt::extract_text(path)?),
        Format::Html if target == Format::Txt => Document::Text(html::extract_text(path)?),
        Format::Html => Document::Records(html::read_table(path)?),
        Format::Pdf => Document::Text(pdf::extract_text(path)?),
        Format::Txt => Document::Text(text::read_text(path)?),
    };
    debug!("Decoded {} as {}", path.display(), doc.describe());
    Ok(doc)
}

/// Encode `doc` as `format`, creating or truncating the file at `path`.
///
/// The extension of `path` is ignored; `format` alone selects the encoder.
pub fn encode(
    doc: &Document,
    path: &Path,
    format: Format,
    opts: &EncodeOptions,
) -> Result<(), CodecError> {
    let file = File::create(path).map_err(|e| CodecError::Encode(e.to_string()))?;
    let mut w = BufWriter::new(file);

    match (doc, format) {
        (Document::Raster(img), Format::Png | Format::Jpg | Format::Bmp | Format::Webp) => {
            raster::encode(img, &mut w, format, opts)?
        }
        (Document::Records(rows), Format::Json) => records::write_json(rows, &mut w)?,
        (Document::Records(rows), Format::Csv) => records::write_csv(rows, &mut w)?,
        (Document::Text(text), Format::Txt) => w
            .write_all(collapse_line_breaks(text).as_bytes())
            .map_err(|e| CodecError::Encode(e.to_string()))?,
        (doc, format) => {
            return Err(CodecError::Encode(format!(
                "cannot encode a {} as {}",
                doc.describe(),
                format
            )))
        }
    }

    w.flush().map_err(|e| CodecError::Encode(e.to_string()))
}

/// Replace every line break with a single space.
pub fn collapse_line_breaks(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}
