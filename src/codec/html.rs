//! HTML extraction: the visible text, or the first `<table>` as records.
//!
//! Real-world HTML is not XML, so the quick-xml reader runs leniently: end
//! tag names are not matched, stray end tags are allowed and HTML5 named
//! entities are resolved. Tag names compare case-insensitively and
//! attributes are never parsed. `script` and `style` bodies are removed
//! before parsing since they are raw text.

use super::records::Record;
use super::text;
use crate::error::CodecError;
use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesText, Event};
use quick_xml::name::QName;
use quick_xml::reader::Reader;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Elements that start a new line in extracted text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "footer",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p", "pre",
    "section", "table", "td", "th", "title", "tr", "ul",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Extract the visible text of an HTML document, one block per line.
pub fn extract_text(path: &Path) -> Result<String, CodecError> {
    let text = text_from_html(&text::read_text(path)?)?;
    debug!("Extracted {} chars from {}", text.len(), path.display());
    Ok(text)
}

/// Read the first `<table>` of an HTML document as records.
pub fn read_table(path: &Path) -> Result<Vec<Record>, CodecError> {
    records_from_html(&text::read_text(path)?)
}

pub fn text_from_html(html: &str) -> Result<String, CodecError> {
    let cleaned = strip_raw_text(html);
    let mut reader = lenient_reader(&cleaned);

    let mut out = String::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if is_block(e.name()) {
                    out.push('\n');
                }
            }
            Ok(Event::End(e)) => {
                if is_block(e.name()) {
                    out.push('\n');
                }
            }
            Ok(Event::Text(t)) => out.push_str(&unescape(&t)),
            Ok(Event::CData(c)) => out.push_str(&String::from_utf8_lossy(&c)),
            Ok(Event::Eof) => break,
            Err(e) => return Err(parse_error(&reader, e)),
            _ => {}
        }
    }

    Ok(out
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Rows of the first top-level table.
///
/// A first row made of `<th>` cells names the columns; otherwise columns are
/// named by position (`"0"`, `"1"`, ...). Every value is a string.
pub fn records_from_html(html: &str) -> Result<Vec<Record>, CodecError> {
    let cleaned = strip_raw_text(html);
    let mut reader = lenient_reader(&cleaned);

    let mut table = TableBuilder::default();
    let mut depth = 0usize;
    let mut found = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                if is(name, "table") {
                    depth += 1;
                    found = true;
                } else if depth == 1 {
                    table.open(name);
                }
            }
            Ok(Event::Empty(e)) if depth == 1 => {
                let name = e.name();
                if is(name, "td") || is(name, "th") {
                    table.open(name);
                    table.close(name);
                } else if is(name, "br") {
                    table.push_text(" ");
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                if is(name, "table") && depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                } else if depth == 1 {
                    table.close(name);
                }
            }
            Ok(Event::Text(t)) if depth == 1 => table.push_text(&unescape(&t)),
            Ok(Event::Eof) => break,
            Err(e) => return Err(parse_error(&reader, e)),
            _ => {}
        }
    }

    if !found {
        return Err(CodecError::Decode("HTML document has no <table> element".into()));
    }
    Ok(table.into_records())
}

#[derive(Default)]
struct TableBuilder {
    rows: Vec<(Vec<String>, bool)>,
    row: Option<(Vec<String>, bool)>,
    cell: Option<String>,
}

impl TableBuilder {
    fn open(&mut self, name: QName<'_>) {
        if is(name, "tr") {
            self.finish_row();
            self.row = Some((Vec::new(), false));
        } else if is(name, "td") || is(name, "th") {
            self.finish_cell();
            let row = self.row.get_or_insert_with(|| (Vec::new(), false));
            row.1 |= is(name, "th");
            self.cell = Some(String::new());
        } else if is(name, "br") {
            self.push_text(" ");
        }
    }

    fn close(&mut self, name: QName<'_>) {
        if is(name, "tr") {
            self.finish_row();
        } else if is(name, "td") || is(name, "th") {
            self.finish_cell();
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(cell) = self.cell.as_mut() {
            cell.push_str(text);
        }
    }

    fn finish_cell(&mut self) {
        if let Some(cell) = self.cell.take() {
            let value = cell.split_whitespace().collect::<Vec<_>>().join(" ");
            self.row
                .get_or_insert_with(|| (Vec::new(), false))
                .0
                .push(value);
        }
    }

    fn finish_row(&mut self) {
        self.finish_cell();
        if let Some(row) = self.row.take() {
            if !row.0.is_empty() {
                self.rows.push(row);
            }
        }
    }

    fn into_records(mut self) -> Vec<Record> {
        self.finish_row();
        let mut rows = self.rows.into_iter().peekable();

        let mut names: Vec<String> = match rows.peek() {
            Some((_, true)) => rows.next().map(|(cells, _)| cells).unwrap_or_default(),
            _ => Vec::new(),
        };
        let rows: Vec<Vec<String>> = rows.map(|(cells, _)| cells).collect();

        let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(names.len());
        for i in names.len()..width {
            names.push(i.to_string());
        }
        let names = unique_names(names);

        rows.into_iter()
            .map(|cells| {
                names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| {
                        let value = cells.get(i).cloned().unwrap_or_default();
                        (name.clone(), Value::String(value))
                    })
                    .collect()
            })
            .collect()
    }
}

/// Empty names become their position; repeats get a `.N` suffix.
fn unique_names(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for (i, name) in names.into_iter().enumerate() {
        let base = if name.is_empty() { i.to_string() } else { name };
        let mut candidate = base.clone();
        let mut n = 1;
        while out.contains(&candidate) {
            candidate = format!("{base}.{n}");
            n += 1;
        }
        out.push(candidate);
    }
    out
}

fn lenient_reader(html: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    reader
}

fn is(name: QName<'_>, tag: &str) -> bool {
    name.as_ref().eq_ignore_ascii_case(tag.as_bytes())
}

fn is_block(name: QName<'_>) -> bool {
    BLOCK_ELEMENTS.iter().any(|b| is(name, b))
}

/// Entities quick-xml cannot resolve are kept verbatim.
fn unescape(t: &BytesText<'_>) -> String {
    match t.unescape_with(resolve_html5_entity) {
        Ok(s) => s.into_owned(),
        Err(_) => String::from_utf8_lossy(t).into_owned(),
    }
}

fn parse_error(reader: &Reader<&[u8]>, e: quick_xml::Error) -> CodecError {
    CodecError::Decode(format!(
        "HTML parse error at byte {}: {e}",
        reader.error_position()
    ))
}

/// Remove `<script>` and `<style>` elements including their bodies.
///
/// ASCII lowercasing keeps byte offsets, so positions found in the lowered
/// copy index the original.
fn strip_raw_text(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some((start, tag)) = next_raw_open(&lower, pos) {
        out.push_str(&html[pos..start]);
        let close = format!("</{tag}");
        pos = match lower[start..].find(&close) {
            Some(rel) => {
                let close_start = start + rel;
                lower[close_start..]
                    .find('>')
                    .map_or(html.len(), |gt| close_start + gt + 1)
            }
            None => html.len(),
        };
    }
    out.push_str(&html[pos..]);
    out
}

fn next_raw_open(lower: &str, from: usize) -> Option<(usize, &'static str)> {
    RAW_TEXT_ELEMENTS
        .iter()
        .filter_map(|tag| {
            let needle = format!("<{tag}");
            let mut search = from;
            while let Some(rel) = lower[search..].find(&needle) {
                let at = search + rel;
                // `<scripts>` or `<styled-box>` are not matches.
                match lower.as_bytes().get(at + needle.len()) {
                    Some(b'>') | Some(b'/') | Some(b' ') | Some(b'\t') | Some(b'\n')
                    | Some(b'\r') | None => return Some((at, *tag)),
                    _ => search = at + needle.len(),
                }
            }
            None
        })
        .min_by_key(|(at, _)| *at)
}
