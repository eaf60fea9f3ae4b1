// src/engine/encoder.rs
//
// Encoder operations: JPEG (mozjpeg), PNG (image + oxipng), WebP (libwebp),
// everything else through the image crate.

use crate::engine::common::run_with_panic_policy;
use crate::error::HandleError;
use crate::ops::{Format, Interlace};
use image::DynamicImage;
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::borrow::Cow;
use std::io::Cursor;
use tracing::debug;

use super::common::EngineResult;

/// Quality used when the handle never had one set.
pub const DEFAULT_QUALITY: u8 = 92;

/// Single source of truth for deriving per-format encoder settings from a
/// 0-100 quality value. WebP filter_strength keeps the 80/60 thresholds.
#[derive(Debug, Clone, Copy)]
pub struct QualitySettings {
    quality: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QualityBand {
    High,
    Balanced,
    Fast,
}

impl QualitySettings {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.min(100) as f32,
        }
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    fn band(&self) -> QualityBand {
        if self.quality >= 85.0 {
            QualityBand::High
        } else if self.quality >= 70.0 {
            QualityBand::Balanced
        } else {
            QualityBand::Fast
        }
    }

    pub fn jpeg_smoothing(&self) -> u8 {
        if self.quality >= 90.0 {
            0
        } else if self.quality >= 70.0 {
            5
        } else if self.quality >= 60.0 {
            10
        } else {
            18
        }
    }

    pub fn webp_sns_strength(&self) -> i32 {
        match self.band() {
            QualityBand::High => 50,
            QualityBand::Balanced => 70,
            QualityBand::Fast => 80,
        }
    }

    pub fn webp_filter_strength(&self) -> i32 {
        if self.quality >= 80.0 {
            20
        } else if self.quality >= 60.0 {
            30
        } else {
            40
        }
    }

    pub fn webp_filter_sharpness(&self) -> i32 {
        match self.band() {
            QualityBand::High => 2,
            QualityBand::Balanced | QualityBand::Fast => 0,
        }
    }

    /// oxipng preset. Lower qualities trade compression effort for speed.
    pub fn png_preset(&self) -> u8 {
        match self.band() {
            QualityBand::High => 4,
            QualityBand::Balanced => 3,
            QualityBand::Fast => 2,
        }
    }
}

/// JPEG chroma subsampling, from the `jpeg:sampling-factor` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaSampling {
    /// 4:4:4 (1x1)
    Full,
    /// 4:2:2 (2x1)
    Half,
    /// 4:2:0 (2x2)
    Quarter,
}

impl ChromaSampling {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "4:4:4" | "1x1" | "1x1,1x1,1x1" => Some(Self::Full),
            "4:2:2" | "2x1" | "2x1,1x1,1x1" => Some(Self::Half),
            "4:2:0" | "2x2" | "2x2,1x1,1x1" => Some(Self::Quarter),
            _ => None,
        }
    }

    fn pixel_sizes(&self) -> (u8, u8) {
        match self {
            Self::Full => (1, 1),
            Self::Half => (2, 1),
            Self::Quarter => (2, 2),
        }
    }
}

/// Everything an export needs besides the pixels.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub quality: u8,
    pub interlace: Interlace,
    pub sampling: ChromaSampling,
    pub webp_lossless: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            interlace: Interlace::None,
            sampling: ChromaSampling::Quarter,
            webp_lossless: false,
        }
    }
}

/// Encode into `format`.
pub fn encode(img: &DynamicImage, format: Format, options: &EncodeOptions) -> EngineResult<Vec<u8>> {
    debug!(
        format = format.magick(),
        width = img.width(),
        height = img.height(),
        quality = options.quality,
        "encode"
    );
    match format {
        Format::Jpeg => encode_jpeg(img, options),
        Format::Png => encode_png(img, options),
        Format::WebP => encode_webp(img, options),
        other => encode_with_image_crate(img, other),
    }
}

/// Encode to JPEG using mozjpeg.
///
/// Progressive scans only when the handle asked for plane interlace.
pub fn encode_jpeg(img: &DynamicImage, options: &EncodeOptions) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        // Zero-copy optimization: avoid conversion if already RGB8
        let rgb: Cow<'_, image::RgbImage> = match img {
            DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
            _ => Cow::Owned(img.to_rgb8()),
        };
        let (w, h) = rgb.dimensions();
        let pixels: &[u8] = rgb.as_raw();

        if w == 0 || h == 0 {
            return Err(HandleError::encode_failed(
                "jpeg",
                "invalid image dimensions: width or height is zero",
            ));
        }

        let settings = QualitySettings::new(options.quality);
        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        if options.interlace != Interlace::Plane {
            // mozjpeg defaults to progressive; libjpeg v6 defaults are baseline
            comp.set_fastest_defaults();
        }
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(settings.quality());

        let chroma = options.sampling.pixel_sizes();
        comp.set_chroma_sampling_pixel_sizes(chroma, chroma);
        if options.interlace == Interlace::Plane {
            comp.set_progressive_mode();
            comp.set_optimize_scans(true);
            comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);
        }
        comp.set_optimize_coding(true);
        comp.set_smoothing_factor(settings.jpeg_smoothing());

        let estimated_size = (w as usize * h as usize * 3 / 10).max(4096);
        let mut output = Vec::with_capacity(estimated_size);
        {
            let mut writer = comp.start_compress(&mut output).map_err(|e| {
                HandleError::encode_failed("jpeg", format!("mozjpeg: failed to start compress: {e:?}"))
            })?;

            let stride = w as usize * 3;
            for row in pixels.chunks(stride) {
                writer.write_scanlines(row).map_err(|e| {
                    HandleError::encode_failed(
                        "jpeg",
                        format!("mozjpeg: failed to write scanlines: {e:?}"),
                    )
                })?;
            }

            writer.finish().map_err(|e| {
                HandleError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
            })?;
        }
        Ok(output)
    })
}

/// Encode to PNG using image crate, then recompress losslessly with oxipng.
pub fn encode_png(img: &DynamicImage, options: &EncodeOptions) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:png", || {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|e| HandleError::encode_failed("png", format!("PNG encode failed: {e}")))?;

        let settings = QualitySettings::new(options.quality);
        let mut png_options = oxipng::Options::from_preset(settings.png_preset());
        // Metadata is re-embedded separately; never let oxipng drop chunks
        png_options.strip = oxipng::StripChunks::None;
        // Adam7 is dropped when it grows the file unless forced
        let adam7 = options.interlace == Interlace::Plane;
        png_options.interlace = Some(adam7);
        png_options.force = adam7;

        oxipng::optimize_from_memory(&buf, &png_options).map_err(|e| {
            HandleError::encode_failed("png", format!("oxipng optimization failed: {e}"))
        })
    })
}

/// Encode to WebP with libwebp. Lossless when `webp:lossless` is set.
pub fn encode_webp(img: &DynamicImage, options: &EncodeOptions) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:webp", || {
        let has_alpha = img.color().has_alpha();
        let rgba;
        let rgb;
        let (w, h) = (img.width(), img.height());
        // Avoid unnecessary alpha channel to reduce file size
        let encoder = if has_alpha {
            rgba = img.to_rgba8();
            webp::Encoder::from_rgba(rgba.as_raw(), w, h)
        } else {
            rgb = img.to_rgb8();
            webp::Encoder::from_rgb(rgb.as_raw(), w, h)
        };

        let mut config = webp::WebPConfig::new()
            .map_err(|_| HandleError::encode_failed("webp", "failed to create WebPConfig"))?;

        let settings = QualitySettings::new(options.quality);
        config.lossless = i32::from(options.webp_lossless);
        config.quality = settings.quality();
        config.method = 4;
        config.pass = 1;
        config.sns_strength = settings.webp_sns_strength();
        config.autofilter = 1;
        config.filter_strength = settings.webp_filter_strength();
        config.filter_sharpness = settings.webp_filter_sharpness();

        let mem = encoder.encode_advanced(&config).map_err(|e| {
            HandleError::encode_failed("webp", format!("WebP encode failed: {e:?}"))
        })?;
        Ok(mem.to_vec())
    })
}

/// Everything else: the image crate's encoder for that format.
pub fn encode_with_image_crate(img: &DynamicImage, format: Format) -> EngineResult<Vec<u8>> {
    let image_format = format
        .image_format()
        .ok_or_else(|| HandleError::missing_delegate(format.extension()))?;
    run_with_panic_policy("encode:image", || {
        // Encoders reject layouts they cannot store; fall back to RGB8/RGBA8
        let converted: Cow<'_, DynamicImage> = match (format, img) {
            (Format::Gif, DynamicImage::ImageRgba8(_)) => Cow::Borrowed(img),
            (Format::Gif, other) => Cow::Owned(DynamicImage::ImageRgba8(other.to_rgba8())),
            (Format::Pnm, DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_)) => {
                Cow::Borrowed(img)
            }
            (Format::Pnm, other) => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
            (_, DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_)) => Cow::Borrowed(img),
            (_, other) if other.color().has_alpha() => {
                Cow::Owned(DynamicImage::ImageRgba8(other.to_rgba8()))
            }
            (_, other) => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
        };
        let mut buf = Vec::new();
        converted
            .write_to(&mut Cursor::new(&mut buf), image_format)
            .map_err(|e| HandleError::encode_failed(format.extension(), e.to_string()))?;
        Ok(buf)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbImage, RgbaImage};

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    fn is_progressive_jpeg(data: &[u8]) -> bool {
        // SOF2 marker
        data.windows(2).any(|w| w == [0xFF, 0xC2])
    }

    #[test]
    fn test_quality_settings_clamped() {
        assert_eq!(QualitySettings::new(250).quality(), 100.0);
        assert_eq!(QualitySettings::new(50).jpeg_smoothing(), 18);
        assert_eq!(QualitySettings::new(95).png_preset(), 4);
    }

    #[test]
    fn test_sampling_parse() {
        assert_eq!(ChromaSampling::parse("4:4:4"), Some(ChromaSampling::Full));
        assert_eq!(ChromaSampling::parse("2x1"), Some(ChromaSampling::Half));
        assert_eq!(ChromaSampling::parse("2x2"), Some(ChromaSampling::Quarter));
        assert_eq!(ChromaSampling::parse("3:1:1"), None);
    }

    #[test]
    fn test_jpeg_baseline_vs_progressive() {
        let img = create_test_image(64, 64);
        let baseline = encode_jpeg(&img, &EncodeOptions::default()).unwrap();
        assert_eq!(&baseline[0..2], &[0xFF, 0xD8]);
        assert!(!is_progressive_jpeg(&baseline));

        let options = EncodeOptions {
            interlace: Interlace::Plane,
            ..EncodeOptions::default()
        };
        let progressive = encode_jpeg(&img, &options).unwrap();
        assert!(is_progressive_jpeg(&progressive));
    }

    #[test]
    fn test_png_round_trip_keeps_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, image::Rgba([1, 2, 3, 4])));
        let png = encode_png(&img, &EncodeOptions::default()).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.dimensions(), (10, 10));
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn test_png_adam7_survives_optimization() {
        let img = create_test_image(64, 64);
        let plain = encode_png(&img, &EncodeOptions::default()).unwrap();
        // IHDR interlace method
        assert_eq!(plain[28], 0);

        let options = EncodeOptions {
            interlace: Interlace::Plane,
            ..EncodeOptions::default()
        };
        let interlaced = encode_png(&img, &options).unwrap();
        assert_eq!(&interlaced[12..16], b"IHDR");
        assert_eq!(interlaced[28], 1);
        assert_eq!(image::load_from_memory(&interlaced).unwrap().dimensions(), (64, 64));
    }

    #[test]
    fn test_webp_signature() {
        let img = create_test_image(16, 16);
        let data = encode_webp(&img, &EncodeOptions::default()).unwrap();
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(&data[8..12], b"WEBP");
    }

    #[test]
    fn test_other_formats() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(8, 8));
        for format in [Format::Bmp, Format::Tiff, Format::Gif, Format::Tga, Format::Pnm] {
            let data = encode(&img, format, &EncodeOptions::default()).unwrap();
            assert!(!data.is_empty(), "{format:?}");
        }
    }

    #[test]
    fn test_no_delegate_for_pdf() {
        let err = encode(&create_test_image(2, 2), Format::Pdf, &EncodeOptions::default())
            .unwrap_err();
        assert_eq!(err.reason(), "MissingDelegate");
    }
}
