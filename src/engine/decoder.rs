// src/engine/decoder.rs
//
// Decoder operations: JPEG (mozjpeg), PNG (zune-png), WebP (libwebp),
// everything else through the image crate.

use crate::engine::common::run_with_panic_policy;
use crate::engine::environment::Limits;
use crate::error::HandleError;
use crate::ops::Format;
use image::{
    DynamicImage, GrayAlphaImage, GrayImage, ImageReader, RgbImage, RgbaImage,
};
use mozjpeg::Decompress;
use std::io::Cursor;
use tracing::debug;
use webp::{BitstreamFeatures, Decoder as WebPDecoder};
use zune_core::bytestream::ZCursor;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_png::PngDecoder;

use super::common::EngineResult;

/// Decode JPEG using mozjpeg (backed by libjpeg-turbo)
/// This is SIGNIFICANTLY faster than image crate's pure Rust decoder
pub fn decode_jpeg_mozjpeg(data: &[u8], limits: &Limits) -> EngineResult<DynamicImage> {
    run_with_panic_policy("decode:mozjpeg", || {
        let corrupt = |message: String| HandleError::decode_failed("jpg", message);
        if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
            return Err(corrupt("missing JPEG EOI marker".into()));
        }

        let decompress = Decompress::new_mem(data)
            .map_err(|e| corrupt(format!("mozjpeg decompress init failed: {e:?}")))?;

        let mut decompress = decompress
            .rgb()
            .map_err(|e| corrupt(format!("mozjpeg rgb conversion failed: {e:?}")))?;

        let width = u32::try_from(decompress.width())
            .map_err(|_| corrupt("width out of range".into()))?;
        let height = u32::try_from(decompress.height())
            .map_err(|_| corrupt("height out of range".into()))?;
        check_dimensions(width, height, limits)?;

        // Read all scanlines
        let pixels: Vec<[u8; 3]> = decompress
            .read_scanlines()
            .map_err(|e| corrupt(format!("failed to read scanlines: {e:?}")))?;

        // Safe conversion from Vec<[u8; 3]> to Vec<u8>
        let flat_pixels: Vec<u8> = pixels.into_iter().flatten().collect();

        let rgb_image = RgbImage::from_raw(width, height, flat_pixels)
            .ok_or_else(|| corrupt("failed to create image from raw data".into()))?;

        Ok(DynamicImage::ImageRgb8(rgb_image))
    })
}

/// Decode PNG using zune-png. 16-bit input is reduced to 8-bit.
pub fn decode_png_zune(data: &[u8], limits: &Limits) -> EngineResult<DynamicImage> {
    run_with_panic_policy("decode:png", || {
        let corrupt = |message: String| HandleError::decode_failed("png", message);
        let options = DecoderOptions::default().png_set_strip_to_8bit(true);
        let mut decoder = PngDecoder::new_with_options(ZCursor::new(data), options);
        let pixels = decoder
            .decode()
            .map_err(|e| corrupt(format!("decode failed: {e}")))?;

        let info = decoder
            .info()
            .ok_or_else(|| corrupt("missing header info".into()))?;
        let width = info.width as u32;
        let height = info.height as u32;
        check_dimensions(width, height, limits)?;

        let buf = match pixels {
            zune_core::result::DecodingResult::U8(v) => v,
            _ => return Err(corrupt("unexpected non-U8 pixel buffer".into())),
        };

        let colorspace = decoder
            .colorspace()
            .ok_or_else(|| corrupt("missing colorspace".into()))?;

        let img = match colorspace {
            ColorSpace::RGB => RgbImage::from_raw(width, height, buf).map(DynamicImage::ImageRgb8),
            ColorSpace::RGBA => {
                RgbaImage::from_raw(width, height, buf).map(DynamicImage::ImageRgba8)
            }
            ColorSpace::Luma => GrayImage::from_raw(width, height, buf).map(DynamicImage::ImageLuma8),
            ColorSpace::LumaA => {
                GrayAlphaImage::from_raw(width, height, buf).map(DynamicImage::ImageLumaA8)
            }
            other => return Err(corrupt(format!("unsupported colorspace {other:?}"))),
        };

        img.ok_or_else(|| corrupt(format!("failed to build {colorspace:?} image")))
    })
}

/// Decode WebP using libwebp (via webp crate). Falls back to image crate for animated WebP.
pub fn decode_webp_libwebp(data: &[u8], limits: &Limits) -> EngineResult<DynamicImage> {
    run_with_panic_policy("decode:webp", || {
        // Parse header first to avoid allocating huge buffers on malformed files
        let features = BitstreamFeatures::new(data).ok_or_else(|| {
            HandleError::decode_failed("webp", "failed to read bitstream features")
        })?;
        check_dimensions(features.width(), features.height(), limits)?;

        if features.has_animation() {
            // first frame only
            return decode_with_image_crate(data, Format::WebP);
        }

        let decoded = WebPDecoder::new(data)
            .decode()
            .ok_or_else(|| HandleError::decode_failed("webp", "decode failed"))?;

        Ok(decoded.to_image())
    })
}

/// Decode any other format using the image crate under the global panic policy.
pub fn decode_with_image_crate(data: &[u8], format: Format) -> EngineResult<DynamicImage> {
    let image_format = format
        .image_format()
        .ok_or_else(|| HandleError::missing_delegate(format.extension()))?;
    run_with_panic_policy("decode:image", || {
        image::load_from_memory_with_format(data, image_format)
            .map_err(|e| HandleError::decode_failed(format.extension(), e.to_string()))
    })
}

/// Detect input format using magic bytes. Returns None if unknown.
pub fn detect_format(bytes: &[u8]) -> Option<Format> {
    image::guess_format(bytes)
        .ok()
        .and_then(Format::from_image_format)
}

/// Unified decode entrypoint.
///
/// Magic bytes win over the hint: a PNG handed in as "jpg" decodes as PNG.
/// Without recognizable magic bytes the hint picks the codec.
pub fn decode(
    bytes: &[u8],
    hint: Option<Format>,
    limits: &Limits,
) -> EngineResult<(DynamicImage, Format)> {
    let format = match (detect_format(bytes), hint) {
        (Some(detected), _) => detected,
        (None, Some(hinted)) => hinted,
        (None, None) => return Err(HandleError::missing_delegate("unknown")),
    };
    if !format.has_delegate() {
        return Err(HandleError::missing_delegate(format.extension()));
    }
    if hint.is_some_and(|h| h != format) {
        debug!(detected = format.magick(), "content overrides format hint");
    }

    ensure_dimensions_safe(bytes, limits)?;
    let img = match format {
        Format::Jpeg => decode_jpeg_mozjpeg(bytes, limits)?,
        Format::Png => decode_png_zune(bytes, limits)?,
        Format::WebP => decode_webp_libwebp(bytes, limits)?,
        other => decode_with_image_crate(bytes, other)?,
    };
    // Defensive: ensure actual decoded size is also within limits
    check_dimensions(img.width(), img.height(), limits)?;
    Ok((img, format))
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32, limits: &Limits) -> EngineResult<()> {
    limits.check(width, height)
}

/// Inspect encoded bytes and ensure the image dimensions are safe before decoding.
pub fn ensure_dimensions_safe(bytes: &[u8], limits: &Limits) -> EngineResult<()> {
    let cursor = Cursor::new(bytes);
    if let Ok(reader) = ImageReader::new(cursor).with_guessed_format() {
        if let Ok((width, height)) = reader.into_dimensions() {
            return check_dimensions(width, height, limits);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat};

    fn encode_with(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 200])
        }))
    }

    #[test]
    fn test_decode_png_keeps_alpha() {
        let bytes = encode_with(&create_test_image(20, 10), ImageFormat::Png);
        let (img, format) = decode(&bytes, None, &Limits::default()).unwrap();
        assert_eq!(format, Format::Png);
        assert_eq!(img.dimensions(), (20, 10));
        assert!(img.color().has_alpha());
    }

    #[test]
    fn test_decode_jpeg_mozjpeg() {
        let rgb = DynamicImage::ImageRgb8(create_test_image(16, 8).to_rgb8());
        let bytes = encode_with(&rgb, ImageFormat::Jpeg);
        let (img, format) = decode(&bytes, Some(Format::Jpeg), &Limits::default()).unwrap();
        assert_eq!(format, Format::Jpeg);
        assert_eq!(img.dimensions(), (16, 8));
    }

    #[test]
    fn test_content_wins_over_hint() {
        let bytes = encode_with(&create_test_image(4, 4), ImageFormat::Png);
        let (_, format) = decode(&bytes, Some(Format::Jpeg), &Limits::default()).unwrap();
        assert_eq!(format, Format::Png);
    }

    #[test]
    fn test_decode_bmp_via_image_crate() {
        let bytes = encode_with(&create_test_image(5, 7), ImageFormat::Bmp);
        let (img, format) = decode(&bytes, None, &Limits::default()).unwrap();
        assert_eq!(format, Format::Bmp);
        assert_eq!(img.dimensions(), (5, 7));
    }

    #[test]
    fn test_garbage_with_hint_is_corrupt() {
        let err = decode(b"definitely not an image", Some(Format::Png), &Limits::default())
            .unwrap_err();
        assert_eq!(err.reason(), "CorruptImage");
    }

    #[test]
    fn test_missing_delegate() {
        let err = decode(b"%PDF-1.4 ...", Some(Format::Pdf), &Limits::default()).unwrap_err();
        assert_eq!(err.reason(), "MissingDelegate");
        let err = decode(b"????", None, &Limits::default()).unwrap_err();
        assert_eq!(err.reason(), "MissingDelegate");
    }

    #[test]
    fn test_limits_enforced() {
        let bytes = encode_with(&create_test_image(64, 64), ImageFormat::Png);
        let limits = Limits {
            max_dimension: 32,
            max_pixels: 1_000_000,
        };
        let err = decode(&bytes, None, &limits).unwrap_err();
        assert_eq!(err.reason(), "ResourceLimit");
    }

    #[test]
    fn test_truncated_jpeg() {
        let rgb = DynamicImage::ImageRgb8(create_test_image(16, 16).to_rgb8());
        let bytes = encode_with(&rgb, ImageFormat::Jpeg);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(decode(truncated, None, &Limits::default()).is_err());
    }
}
