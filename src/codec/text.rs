//! Text decoding with encoding detection.
//!
//! A byte-order mark wins. Without one, valid UTF-8 is taken as is and
//! anything else is read as Windows-1252, which maps every byte and so never
//! fails.

use crate::error::CodecError;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::path::Path;
use tracing::debug;

/// Read `path` as text, detecting its encoding.
pub fn read_text(path: &Path) -> Result<String, CodecError> {
    let bytes = std::fs::read(path).map_err(|e| CodecError::Decode(e.to_string()))?;
    let encoding = detect(&bytes);
    if encoding != UTF_8 {
        debug!("Reading {} as {}", path.display(), encoding.name());
    }
    Ok(decode_bytes(&bytes))
}

/// Decode `bytes` with the detected encoding; a BOM is stripped.
pub fn decode_bytes(bytes: &[u8]) -> String {
    let (text, _, _) = detect(bytes).decode(bytes);
    text.into_owned()
}

/// Guess the encoding of `bytes`.
pub fn detect(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    if std::str::from_utf8(bytes).is_ok() {
        UTF_8
    } else {
        WINDOWS_1252
    }
}
