//! Integration tests for single-file conversion.
//!
//! Every fixture is generated inside a temporary directory, so these tests
//! need no files on disk and no network.
//!
//! Run with:
//!   cargo test --test conversion

use formaverter::{
    validate, ConversionRequest, ConvertError, Dispatcher, DispatcherConfig, ErrorKind, Route,
};
use image::{ColorType, GenericImageView, Rgba, RgbaImage};
use std::io::Write;
use std::path::{Path, PathBuf};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, body).unwrap();
    p
}

/// 16×16 image: left half fully transparent red, right half opaque blue.
fn half_transparent() -> RgbaImage {
    RgbaImage::from_fn(16, 16, |x, _| {
        if x < 8 {
            Rgba([255, 0, 0, 0])
        } else {
            Rgba([0, 0, 255, 255])
        }
    })
}

/// Minimal OpenDocument text container whose body is `paragraphs`.
fn write_odt(dir: &Path, name: &str, paragraphs: &[&str]) -> PathBuf {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<text:p text:style-name=\"P1\">{p}</text:p>"))
        .collect();
    let content = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0"><office:body><office:text>{body}</office:text></office:body></office:document-content>"#
    );

    let p = dir.join(name);
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&p).unwrap());
    let opts = zip::write::SimpleFileOptions::default();
    zip.start_file("mimetype", opts).unwrap();
    zip.write_all(b"application/vnd.oasis.opendocument.text").unwrap();
    zip.start_file("content.xml", opts).unwrap();
    zip.write_all(content.as_bytes()).unwrap();
    zip.finish().unwrap();
    p
}

/// One-page PDF showing `text` in Helvetica, with a correct xref table.
fn write_pdf(dir: &Path, name: &str, text: &str) -> PathBuf {
    let content = format!("BT /F1 24 Tf 72 720 Td ({text}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{content}\nendstream", content.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{body}\nendobj\n", i + 1));
    }
    let xref = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        pdf.push_str(&format!("{offset:010} 00000 n \n"));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
        objects.len() + 1
    ));

    write(dir, name, &pdf)
}

fn part_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".part"))
        .collect()
}

fn kind(result: Result<formaverter::Artifact, ConvertError>) -> ErrorKind {
    result.unwrap_err().kind()
}

// ── Validation ───────────────────────────────────────────────────────────────

#[test]
fn test_validate_is_pure_table_lookup() {
    assert!(validate(".png", ".jpg").is_ok());
    assert!(validate(".json", ".csv").is_ok());
    assert!(validate(".odt", ".txt").is_ok());
    assert_eq!(validate(".mp3", ".wav").unwrap_err(), ErrorKind::UnsupportedSource);
    assert_eq!(validate(".txt", ".odt").unwrap_err(), ErrorKind::UnsupportedSource);
    assert_eq!(validate(".png", ".csv").unwrap_err(), ErrorKind::UnsupportedTarget);
    assert_eq!(validate(".gif", ".gif").unwrap_err(), ErrorKind::UnsupportedTarget);
}

#[test]
fn test_unsupported_pairs_create_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let d = Dispatcher::default();

    let src = write(dir.path(), "data.json", "[]");
    let target = dir.path().join("data.png");
    assert_eq!(
        kind(d.convert(&ConversionRequest::new(&src, &target))),
        ErrorKind::UnsupportedTarget
    );
    assert!(!target.exists());

    let src = write(dir.path(), "song.mp3", "ID3");
    let target = dir.path().join("song.wav");
    let err = d
        .convert(&ConversionRequest::new(&src, &target))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedSource);
    assert!(
        err.to_string().contains("Supported file formats"),
        "message should carry the capability listing: {err}"
    );
    assert!(!target.exists());

    // Only the two fixtures are in the directory: no stray temp files.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn test_missing_input_reported_before_validation() {
    let dir = tempfile::tempdir().unwrap();
    let d = Dispatcher::default();

    // Both a supported and an unsupported pair report the missing file.
    for (src, dst) in [("missing.json", "out.csv"), ("missing.mp3", "out.wav")] {
        let err = d
            .convert(&ConversionRequest::new(dir.path().join(src), dir.path().join(dst)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputNotFound, "{src}");
        assert!(err.to_string().contains(src));
    }
}

// ── Identity ─────────────────────────────────────────────────────────────────

#[test]
fn test_identity_same_path_refused_and_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let body = r#"[{"a":"1"}]"#;
    let src = write(dir.path(), "same.json", body);

    let err = Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &src))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoOpSamePath);
    assert_eq!(std::fs::read_to_string(&src).unwrap(), body);
}

#[test]
fn test_identity_same_file_through_other_spelling() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "same.csv", "a\n1\n");
    let dotted = dir.path().join(".").join("same.csv");

    let err = Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dotted))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoOpSamePath);
}

#[test]
fn test_identity_copy_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    // Deliberately not canonical JSON: a re-encode would change these bytes.
    let body = "[ {\"k\" : \"v\"} ]\n\n";
    let src = write(dir.path(), "in.json", body);
    let dst = dir.path().join("out.json");

    let artifact = Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap();
    assert_eq!(artifact.route, Route::IdentityCopy);
    assert_eq!(std::fs::read(&dst).unwrap(), body.as_bytes());
    assert_eq!(artifact.bytes_written, body.len() as u64);
}

#[test]
fn test_identity_copy_of_corrupt_image_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "broken.png", "not really a png");
    let dst = dir.path().join("copy.png");

    Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap();
    assert_eq!(std::fs::read(&dst).unwrap(), b"not really a png");
}

// ── Records ──────────────────────────────────────────────────────────────────

#[test]
fn test_json_to_csv_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(
        dir.path(),
        "people.json",
        r#"[{"name":"John","age":"30"},{"name":"Jane","age":"25"}]"#,
    );
    let dst = dir.path().join("people.csv");

    let artifact = Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap();
    assert_eq!(artifact.route, Route::Transcoded);
    assert_eq!(
        std::fs::read_to_string(&dst).unwrap(),
        "name,age\nJohn,30\nJane,25\n"
    );
}

#[test]
fn test_json_csv_json_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let original = r#"[
        {"city":"Oslo","country":"Norway","note":"has, comma"},
        {"city":"Lima","country":"Peru","note":"quote \" inside"},
        {"city":"Pune","country":"India","note":""}
    ]"#;
    let src = write(dir.path(), "cities.json", original);
    let csv = dir.path().join("cities.csv");
    let back = dir.path().join("cities-back.json");

    let d = Dispatcher::default();
    d.convert(&ConversionRequest::new(&src, &csv)).unwrap();
    d.convert(&ConversionRequest::new(&csv, &back)).unwrap();

    let want: serde_json::Value = serde_json::from_str(original).unwrap();
    let got: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&back).unwrap()).unwrap();
    assert_eq!(got, want);
}

#[test]
fn test_json_output_uses_four_space_indent() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "t.csv", "a\n1\n");
    let dst = dir.path().join("t.json");

    Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(&dst).unwrap(),
        "[\n    {\n        \"a\": \"1\"\n    }\n]"
    );
}

#[test]
fn test_xml_to_json() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(
        dir.path(),
        "staff.xml",
        r#"<?xml version="1.0"?>
<staff>
  <person name="Ada" role="engineer"/>
  <person name="Linus" role="maintainer"></person>
</staff>"#,
    );
    let dst = dir.path().join("staff.json");

    Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap();
    let got: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&dst).unwrap()).unwrap();
    assert_eq!(
        got,
        serde_json::json!([
            {"name": "Ada", "role": "engineer"},
            {"name": "Linus", "role": "maintainer"}
        ])
    );
}

#[test]
fn test_malformed_json_is_decode_error_and_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "bad.json", "{ not json");
    let dst = dir.path().join("bad.csv");

    let err = Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeError);
    assert!(!dst.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_failed_conversion_keeps_existing_target() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "bad.json", "[1, 2]");
    let dst = write(dir.path(), "keep.csv", "old\n");

    let err = Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeError);
    assert_eq!(std::fs::read_to_string(&dst).unwrap(), "old\n");
}

#[test]
fn test_sparse_records_keep_every_column() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "sparse.json", r#"[{}, {"a":"1"}, {"b":"2"}]"#);
    let dst = dir.path().join("sparse.csv");

    Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(&dst).unwrap(),
        "a,b\n,\n1,\n,2\n"
    );
}

#[test]
fn test_directory_at_target_path_is_never_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "data.json", r#"[{"k":"v"}]"#);
    let dst = dir.path().join("data.csv");
    std::fs::create_dir(&dst).unwrap();
    write(&dst, "inside.txt", "keep");

    let err = Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConversionFailed);
    assert!(dst.is_dir());
    assert_eq!(std::fs::read_to_string(dst.join("inside.txt")).unwrap(), "keep");
    assert!(part_files(dir.path()).is_empty());
}

#[test]
fn test_conversion_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(
        dir.path(),
        "data.json",
        r#"[{"x":"1","y":"2"},{"x":"3","y":"4"}]"#,
    );
    let dst = dir.path().join("data.csv");
    let d = Dispatcher::default();

    d.convert(&ConversionRequest::new(&src, &dst)).unwrap();
    let first = std::fs::read(&dst).unwrap();
    d.convert(&ConversionRequest::new(&src, &dst)).unwrap();
    assert_eq!(std::fs::read(&dst).unwrap(), first);

    let png = dir.path().join("pic.png");
    half_transparent().save(&png).unwrap();
    let jpg = dir.path().join("pic.jpg");
    d.convert(&ConversionRequest::new(&png, &jpg)).unwrap();
    let first = std::fs::read(&jpg).unwrap();
    d.convert(&ConversionRequest::new(&png, &jpg)).unwrap();
    assert_eq!(std::fs::read(&jpg).unwrap(), first);
}

// ── Raster ───────────────────────────────────────────────────────────────────

#[test]
fn test_rgba_bmp_to_jpg_flattens_onto_white() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("photo.bmp");
    half_transparent().save(&src).unwrap();
    let dst = dir.path().join("photo.jpg");

    Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap();

    let bytes = std::fs::read(&dst).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8], "JPEG SOI marker");
    let img = image::open(&dst).unwrap();
    assert_eq!(img.color(), ColorType::Rgb8);

    let transparent = img.get_pixel(3, 8);
    assert!(transparent.0[..3].iter().all(|&c| c > 235), "{transparent:?}");
    let opaque = img.get_pixel(12, 8);
    assert!(opaque.0[2] > 200 && opaque.0[0] < 60, "{opaque:?}");
}

#[test]
fn test_background_colour_is_configurable() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("a.png");
    half_transparent().save(&src).unwrap();
    let dst = dir.path().join("a.jpg");

    let config = DispatcherConfig::builder()
        .background([0, 0, 0])
        .build()
        .unwrap();
    Dispatcher::new(config)
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap();

    let px = image::open(&dst).unwrap().get_pixel(3, 8);
    assert!(px.0[..3].iter().all(|&c| c < 20), "{px:?}");
}

#[test]
fn test_png_to_webp_and_back_keeps_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.png");
    half_transparent().save(&src).unwrap();
    let webp = dir.path().join("mid.webp");
    let png = dir.path().join("out.png");

    let d = Dispatcher::default();
    d.convert(&ConversionRequest::new(&src, &webp)).unwrap();
    d.convert(&ConversionRequest::new(&webp, &png)).unwrap();

    let img = image::open(&png).unwrap();
    assert_eq!(img.dimensions(), (16, 16));
    // Lossless WebP keeps the transparent half transparent.
    assert_eq!(img.get_pixel(2, 2).0[3], 0);
}

#[test]
fn test_corrupt_image_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "fake.png", "definitely not png");
    let dst = dir.path().join("fake.jpg");

    let err = Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeError);
    assert!(!dst.exists());
}

// ── Documents ────────────────────────────────────────────────────────────────

#[test]
fn test_odt_to_txt_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_odt(dir.path(), "notes.odt", &["Hello world"]);
    let dst = dir.path().join("notes.txt");

    Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap();
    assert_eq!(std::fs::read_to_string(&dst).unwrap(), "Hello world");
}

#[test]
fn test_odt_paragraph_breaks_collapse_to_spaces() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_odt(
        dir.path(),
        "multi.odt",
        &["Hello", "world<text:line-break/>again"],
    );
    let dst = dir.path().join("multi.txt");

    Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap();
    let text = std::fs::read_to_string(&dst).unwrap();
    assert_eq!(text, "Hello world again");
    assert!(!text.contains('\n'));
}

#[test]
fn test_odt_without_content_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("empty.odt");
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&p).unwrap());
    zip.start_file("mimetype", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.finish().unwrap();

    let err = Dispatcher::default()
        .convert(&ConversionRequest::new(&p, dir.path().join("empty.txt")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeError);
}

#[test]
fn test_odt_oversized_space_run_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_odt(
        dir.path(),
        "spaces.odt",
        &[r#"a<text:s text:c="1000000000000"/>b"#],
    );
    let dst = dir.path().join("spaces.txt");

    let err = Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeError);
    assert!(!dst.exists());
    assert!(part_files(dir.path()).is_empty());
}

#[test]
fn test_html_to_txt() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(
        dir.path(),
        "page.html",
        "<html><head><title>Notes</title><script>var x = 1 < 2;</script></head>\
         <body><h1>Hello</h1><p>Fish &amp; chips<br>twice</p></body></html>",
    );
    let dst = dir.path().join("page.txt");

    Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(&dst).unwrap(),
        "Notes Hello Fish & chips twice"
    );
}

#[test]
fn test_html_table_to_csv_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(
        dir.path(),
        "people.htm",
        "<p>Staff</p><TABLE><TR><TH>name</TH><TH>age</TH></TR>\
         <TR><TD>John</TD><TD>30</TD></TR><TR><TD>Jane</TD><TD>25</TD></TR></TABLE>",
    );
    let d = Dispatcher::default();

    let csv = dir.path().join("people.csv");
    d.convert(&ConversionRequest::new(&src, &csv)).unwrap();
    assert_eq!(
        std::fs::read_to_string(&csv).unwrap(),
        "name,age\nJohn,30\nJane,25\n"
    );

    let json = dir.path().join("people.json");
    d.convert(&ConversionRequest::new(&src, &json)).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(
        value,
        serde_json::json!([{"name": "John", "age": "30"}, {"name": "Jane", "age": "25"}])
    );
}

#[test]
fn test_html_without_table_to_csv_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "plain.html", "<p>no rows</p>");
    let dst = dir.path().join("plain.csv");

    assert_eq!(
        kind(Dispatcher::default().convert(&ConversionRequest::new(&src, &dst))),
        ErrorKind::DecodeError
    );
    assert!(!dst.exists());
}

#[test]
fn test_windows_1252_html_is_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("menu.html");
    std::fs::write(&src, b"<p>Caf\xE9 cr\xE8me</p>").unwrap();
    let dst = dir.path().join("menu.txt");

    Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap();
    assert_eq!(std::fs::read_to_string(&dst).unwrap(), "Café crème");
}

#[test]
fn test_pdf_to_txt() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_pdf(dir.path(), "hello.pdf", "Hello world");
    let dst = dir.path().join("hello.txt");

    let artifact = Dispatcher::default()
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap();
    assert_eq!(artifact.route, Route::Transcoded);
    let text = std::fs::read_to_string(&dst).unwrap();
    assert!(text.contains("Hello"), "got: {text:?}");
    assert!(!text.contains('\n'));
}

#[test]
fn test_corrupt_pdf_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "broken.pdf", "%PDF-1.4\nthis is not a pdf body");
    let dst = dir.path().join("broken.txt");

    assert_eq!(
        kind(Dispatcher::default().convert(&ConversionRequest::new(&src, &dst))),
        ErrorKind::DecodeError
    );
    assert!(!dst.exists());
}

// ── Async & config ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_convert_async_matches_sync() {
    let dir = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "a.json", r#"[{"k":"v"}]"#);
    let dst = dir.path().join("a.csv");

    let artifact = Dispatcher::default()
        .convert_async(ConversionRequest::new(&src, &dst))
        .await
        .unwrap();
    assert_eq!(artifact.path, dst);
    assert_eq!(std::fs::read_to_string(&dst).unwrap(), "k\nv\n");
}

#[test]
fn test_temp_dir_is_used_and_left_clean() {
    let dir = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let src = write(dir.path(), "a.json", r#"[{"k":"v"}]"#);
    let dst = dir.path().join("out").join("a.csv");

    let config = DispatcherConfig::builder()
        .temp_dir(staging.path())
        .build()
        .unwrap();
    Dispatcher::new(config)
        .convert(&ConversionRequest::new(&src, &dst))
        .unwrap();

    assert!(dst.is_file());
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}
