//! OpenDocument Text extraction.
//!
//! An `.odt` file is a zip container; the body lives in `content.xml`.
//! Paragraphs (`text:p`) and headings (`text:h`) become lines. Inside them,
//! `text:s` stands for `text:c` spaces (default 1), `text:tab` for a tab and
//! `text:line-break` for a line break.

use crate::error::CodecError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

const CONTENT_XML: &str = "content.xml";

/// Largest `text:c` accepted on a single `text:s` element.
const MAX_SPACE_RUN: u64 = 65_535;

/// Upper bound on the extracted text, in bytes.
const MAX_TEXT_LEN: usize = 64 * 1024 * 1024;

/// Extract the plain text of an ODT document, one paragraph per line.
pub fn extract_text(path: &Path) -> Result<String, CodecError> {
    let file = File::open(path).map_err(|e| CodecError::Decode(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| CodecError::Decode(format!("not an OpenDocument container: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(CONTENT_XML)
        .map_err(|e| CodecError::Decode(format!("missing {CONTENT_XML}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| CodecError::Decode(format!("failed to read {CONTENT_XML}: {e}")))?;

    let text = text_from_content_xml(&xml)?;
    debug!("Extracted {} chars from {}", text.len(), path.display());
    Ok(text)
}

/// Walk `content.xml` and collect paragraph text.
pub fn text_from_content_xml(xml: &str) -> Result<String, CodecError> {
    let mut reader = Reader::from_str(xml);

    let mut out = String::new();
    let mut para_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"text:p" | b"text:h" => para_depth += 1,
                _ if para_depth > 0 => push_inline(e, &mut out)?,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"text:p" | b"text:h" => out.push('\n'),
                _ if para_depth > 0 => push_inline(e, &mut out)?,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if para_depth > 0 {
                    let text = e
                        .unescape()
                        .map_err(|e| CodecError::Decode(format!("bad text in {CONTENT_XML}: {e}")))?;
                    out.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => {
                if matches!(e.name().as_ref(), b"text:p" | b"text:h") && para_depth > 0 {
                    para_depth -= 1;
                    if para_depth == 0 {
                        out.push('\n');
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CodecError::Decode(format!(
                    "{CONTENT_XML} parse error at byte {}: {e}",
                    reader.error_position()
                )))
            }
            _ => {}
        }
    }

    Ok(out.trim_end_matches('\n').to_string())
}

fn push_inline(e: &BytesStart<'_>, out: &mut String) -> Result<(), CodecError> {
    match e.name().as_ref() {
        b"text:s" => {
            let count = space_count(e)?;
            if out.len() + count > MAX_TEXT_LEN {
                return Err(CodecError::Decode(format!(
                    "{CONTENT_XML} expands to more than {MAX_TEXT_LEN} bytes of text"
                )));
            }
            out.extend(std::iter::repeat(' ').take(count));
        }
        b"text:tab" => out.push('\t'),
        b"text:line-break" => out.push('\n'),
        _ => {}
    }
    Ok(())
}

/// The `text:c` of a `text:s` element. Missing or unparsable means 1.
fn space_count(e: &BytesStart<'_>) -> Result<usize, CodecError> {
    let mut count = 1u64;
    for attr in e.attributes() {
        let attr = attr.map_err(|e| CodecError::Decode(e.to_string()))?;
        if attr.key.as_ref() == b"text:c" {
            let raw = String::from_utf8_lossy(&attr.value);
            let raw = raw.trim();
            count = match raw.parse::<u64>() {
                Ok(n) => n,
                // All digits but too long for u64.
                Err(_) if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) => u64::MAX,
                Err(_) => 1,
            };
        }
    }
    if count > MAX_SPACE_RUN {
        return Err(CodecError::Decode(format!(
            "text:s asks for {count} spaces, at most {MAX_SPACE_RUN} are allowed"
        )));
    }
    Ok(count as usize)
}
