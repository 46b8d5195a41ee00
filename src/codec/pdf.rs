//! PDF text extraction.
//!
//! Only text that the document carries as text is recovered; scanned pages
//! come out empty.

use crate::error::CodecError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use tracing::debug;

/// Extract the text of every page, one trimmed line per text line.
pub fn extract_text(path: &Path) -> Result<String, CodecError> {
    // pdf-extract panics on some malformed cross-reference tables.
    let raw = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text(path)))
        .map_err(|_| CodecError::Decode("PDF parser panicked on malformed input".into()))?
        .map_err(|e| CodecError::Decode(format!("PDF text extraction failed: {e}")))?;

    let text = tidy(&raw);
    debug!("Extracted {} chars from {}", text.len(), path.display());
    Ok(text)
}

/// Form feeds become line breaks; blank lines are dropped.
fn tidy(raw: &str) -> String {
    raw.replace('\u{c}', "\n")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tidy_drops_blank_lines_and_page_breaks() {
        assert_eq!(tidy("\n\n  Title  \n\nbody\u{c}\nnext page\n"), "Title\nbody\nnext page");
    }

    #[test]
    fn not_a_pdf_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();
        assert!(matches!(extract_text(&path), Err(CodecError::Decode(_))));
    }
}
