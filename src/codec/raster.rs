//! Raster codec: PNG, JPG, BMP, WebP and GIF via the `image` crate.
//!
//! The decoder format is always set from the tag rather than guessed from
//! the bytes. Encoders receive a colour type they support: JPG has no alpha,
//! so transparent pixels are composited over the configured background
//! before encoding; BMP and WebP take 8-bit data only.

use super::EncodeOptions;
use crate::error::CodecError;
use crate::format::Format;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ColorType, DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use tracing::debug;

fn image_format(format: Format) -> Option<ImageFormat> {
    match format {
        Format::Png => Some(ImageFormat::Png),
        Format::Jpg => Some(ImageFormat::Jpeg),
        Format::Bmp => Some(ImageFormat::Bmp),
        Format::Webp => Some(ImageFormat::WebP),
        Format::Gif => Some(ImageFormat::Gif),
        _ => None,
    }
}

/// Decode the image at `path`. For GIF this is the first frame.
pub fn decode(path: &Path, format: Format) -> Result<DynamicImage, CodecError> {
    let image_format = image_format(format)
        .ok_or_else(|| CodecError::Decode(format!("{format} is not a raster format")))?;

    let file = File::open(path).map_err(|e| CodecError::Decode(e.to_string()))?;
    let img = ImageReader::with_format(BufReader::new(file), image_format)
        .decode()
        .map_err(|e| CodecError::Decode(e.to_string()))?;

    debug!(
        "Decoded {} → {}x{} {:?}",
        path.display(),
        img.width(),
        img.height(),
        img.color()
    );
    Ok(img)
}

/// Encode `img` as `format` into `w`.
pub fn encode<W: Write>(
    img: &DynamicImage,
    w: &mut W,
    format: Format,
    opts: &EncodeOptions,
) -> Result<(), CodecError> {
    let result = match format {
        Format::Jpg => {
            let rgb = DynamicImage::ImageRgb8(flatten_alpha(img, opts.background));
            rgb.write_with_encoder(JpegEncoder::new_with_quality(w, opts.jpeg_quality))
        }
        Format::Png => img.write_with_encoder(PngEncoder::new(w)),
        Format::Bmp => eight_bit(img).write_with_encoder(BmpEncoder::new(w)),
        Format::Webp => eight_bit(img).write_with_encoder(WebPEncoder::new_lossless(w)),
        other => {
            return Err(CodecError::Encode(format!(
                "{other} is not an encodable raster format"
            )))
        }
    };
    result.map_err(|e| CodecError::Encode(e.to_string()))
}

/// Composite `img` over an opaque `background`, dropping alpha.
pub fn flatten_alpha(img: &DynamicImage, background: [u8; 3]) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let a = a as u16;
        let blend = |c: u8, bg: u8| ((c as u16 * a + bg as u16 * (255 - a) + 127) / 255) as u8;
        out.put_pixel(
            x,
            y,
            Rgb([
                blend(r, background[0]),
                blend(g, background[1]),
                blend(b, background[2]),
            ]),
        );
    }
    out
}

fn eight_bit(img: &DynamicImage) -> Cow<'_, DynamicImage> {
    match img.color() {
        ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => Cow::Borrowed(img),
        _ if img.color().has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(img.to_rgba8())),
        _ => Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn checkerboard() -> DynamicImage {
        let mut img = RgbaImage::new(4, 4);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 0])
            };
        }
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn flatten_transparent_over_white() {
        let flat = flatten_alpha(&checkerboard(), [255, 255, 255]);
        assert_eq!(flat.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(flat.get_pixel(1, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn flatten_uses_configured_background() {
        let flat = flatten_alpha(&checkerboard(), [0, 0, 0]);
        assert_eq!(flat.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn jpeg_output_has_no_alpha() {
        let mut buf = Vec::new();
        encode(
            &checkerboard(),
            &mut Cursor::new(&mut buf),
            Format::Jpg,
            &EncodeOptions::default(),
        )
        .expect("encode should succeed");

        let decoded = image::load_from_memory_with_format(&buf, ImageFormat::Jpeg).unwrap();
        assert!(!decoded.color().has_alpha());
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }

    #[test]
    fn png_keeps_alpha() {
        let mut buf = Vec::new();
        encode(
            &checkerboard(),
            &mut Cursor::new(&mut buf),
            Format::Png,
            &EncodeOptions::default(),
        )
        .unwrap();
        let decoded = image::load_from_memory_with_format(&buf, ImageFormat::Png).unwrap();
        assert_eq!(decoded.color(), ColorType::Rgba8);
    }

    #[test]
    fn gif_is_not_encodable() {
        let mut buf = Vec::new();
        let err = encode(
            &checkerboard(),
            &mut Cursor::new(&mut buf),
            Format::Gif,
            &EncodeOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::Encode(_)));
    }

    #[test]
    fn sixteen_bit_narrowed_for_bmp() {
        let img = DynamicImage::ImageRgb16(image::ImageBuffer::new(2, 2));
        assert_eq!(eight_bit(&img).color(), ColorType::Rgb8);
    }
}
