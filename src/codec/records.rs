//! Record codec: JSON arrays of objects, CSV tables and flat XML.
//!
//! All three decode into `Vec<Record>`, where a record is an ordered JSON
//! object. Field order is the order the fields appear in the source
//! (`serde_json` is built with `preserve_order`), so a CSV header follows
//! the order fields are first seen in.
//!
//! JSON and CSV input go through [`super::text`] for encoding detection.

use crate::error::CodecError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;

/// One row: field name → value, in source order.
pub type Record = Map<String, Value>;

fn decode_err(e: impl std::fmt::Display) -> CodecError {
    CodecError::Decode(e.to_string())
}

fn encode_err(e: impl std::fmt::Display) -> CodecError {
    CodecError::Encode(e.to_string())
}

// ── JSON ─────────────────────────────────────────────────────────────────────

/// Read a JSON array of objects.
pub fn read_json(path: &Path) -> Result<Vec<Record>, CodecError> {
    let text = super::text::read_text(path)?;
    let value: Value = serde_json::from_str(&text).map_err(decode_err)?;
    records_from_value(value)
}

fn records_from_value(value: Value) -> Result<Vec<Record>, CodecError> {
    let Value::Array(items) = value else {
        return Err(CodecError::Decode(
            "expected a JSON array of objects at the top level".into(),
        ));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(map),
            other => Err(CodecError::Decode(format!(
                "element {i} is not an object (found {})",
                json_type(&other)
            ))),
        })
        .collect()
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Write records as a pretty-printed JSON array, four-space indented.
pub fn write_json<W: Write>(records: &[Record], w: &mut W) -> Result<(), CodecError> {
    let mut ser = serde_json::Serializer::with_formatter(w, PrettyFormatter::with_indent(b"    "));
    records.serialize(&mut ser).map_err(encode_err)
}

// ── CSV ──────────────────────────────────────────────────────────────────────

/// Read a CSV file whose first row is the header. Every cell is a string.
pub fn read_csv(path: &Path) -> Result<Vec<Record>, CodecError> {
    let text = super::text::read_text(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(decode_err)?.clone();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(decode_err)?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        records.push(record);
    }
    Ok(records)
}

/// Write records as CSV.
///
/// The header is every key of every record, in the order keys are first
/// seen. A record lacking a column gets an empty cell there. No columns at
/// all → empty output.
pub fn write_csv<W: Write>(records: &[Record], w: &mut W) -> Result<(), CodecError> {
    let mut header: Vec<&str> = Vec::new();
    for key in records.iter().flat_map(|r| r.keys()) {
        if !header.contains(&key.as_str()) {
            header.push(key);
        }
    }
    if header.is_empty() {
        return Ok(());
    }

    let mut writer = csv::Writer::from_writer(w);
    writer.write_record(&header).map_err(encode_err)?;

    for record in records {
        let row: Vec<String> = header.iter().map(|k| cell(record.get(*k))).collect();
        writer.write_record(&row).map_err(encode_err)?;
    }
    writer.flush().map_err(encode_err)
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// ── XML ──────────────────────────────────────────────────────────────────────

/// Read the direct children of the root element, one record per child,
/// with the child's attributes as fields.
pub fn read_xml(path: &Path) -> Result<Vec<Record>, CodecError> {
    let mut reader = Reader::from_file(path).map_err(decode_err)?;
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut records = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if depth == 1 {
                    records.push(attributes(e)?);
                }
                seen_root = true;
                depth += 1;
            }
            Ok(Event::Empty(ref e)) => {
                if depth == 1 {
                    records.push(attributes(e)?);
                }
                seen_root = true;
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CodecError::Decode(format!(
                    "XML parse error at byte {}: {e}",
                    reader.error_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(CodecError::Decode("XML document has no root element".into()));
    }
    Ok(records)
}

fn attributes(e: &BytesStart<'_>) -> Result<Record, CodecError> {
    let mut record = Record::new();
    for attr in e.attributes() {
        let attr = attr.map_err(decode_err)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(decode_err)?.into_owned();
        record.insert(key, Value::String(value));
    }
    Ok(record)
}
