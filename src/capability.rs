//! The capability table: which source formats convert to which targets.
//!
//! This is the single source of truth for "is this pair supported". It is
//! plain static data, so validation is one table lookup and the
//! human-readable listing is generated from the same rows that drive
//! dispatch.
//!
//! A format listing itself permits identity conversion (a byte copy). A
//! format that omits itself rejects even identity.

use crate::format::Format;

/// Rows of `(source, allowed targets)`.
static TABLE: &[(Format, &[Format])] = &[
    (Format::Png, &[Format::Png, Format::Jpg, Format::Bmp, Format::Webp]),
    (Format::Jpg, &[Format::Png, Format::Jpg, Format::Bmp, Format::Webp]),
    (Format::Bmp, &[Format::Png, Format::Jpg, Format::Bmp, Format::Webp]),
    (Format::Webp, &[Format::Png, Format::Jpg, Format::Bmp, Format::Webp]),
    (Format::Gif, &[Format::Png, Format::Jpg, Format::Bmp, Format::Webp]),
    (Format::Json, &[Format::Csv, Format::Json]),
    (Format::Csv, &[Format::Json, Format::Csv]),
    (Format::Xml, &[Format::Json]),
    (Format::Odt, &[Format::Txt]),
    (Format::Html, &[Format::Txt, Format::Csv, Format::Json]),
    (Format::Pdf, &[Format::Txt]),
];

/// Allowed targets for `source`, or `None` when it is not a source format.
pub fn targets(source: Format) -> Option<&'static [Format]> {
    TABLE
        .iter()
        .find(|(s, _)| *s == source)
        .map(|(_, targets)| *targets)
}

/// True when `source → target` is listed.
pub fn supports(source: Format, target: Format) -> bool {
    targets(source).is_some_and(|t| t.contains(&target))
}

/// All source formats, in table order.
pub fn sources() -> impl Iterator<Item = Format> {
    TABLE.iter().map(|(s, _)| *s)
}

/// Human-readable listing of every supported conversion.
///
/// ```text
/// Supported file formats and conversions:
/// PNG (.png): can be converted to PNG, JPEG, BMP, WebP
/// ...
/// ```
pub fn listing() -> String {
    let mut out = String::from("Supported file formats and conversions:");
    for (source, targets) in TABLE {
        let names: Vec<&str> = targets.iter().map(|t| t.display_name()).collect();
        out.push_str(&format!(
            "\n{} ({}): can be converted to {}",
            source.display_name(),
            source.tag(),
            names.join(", ")
        ));
    }
    out
}
