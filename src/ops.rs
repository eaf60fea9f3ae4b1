// src/ops.rs
//
// Plain value types shared by the handle and the engine.
// These are cheap to create and copy - the expensive work happens in the engine.

use image::ImageFormat;
use std::path::Path;

/// Codec registry entry.
///
/// Design principle: a format token is validated once, here, and the rest of
/// the crate only ever sees a `Format`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    WebP,
    Ico,
    Tga,
    Pnm,
    /// Recognized, no delegate
    Pdf,
    /// Recognized, no delegate
    Ps,
    /// Recognized, no delegate
    Svg,
}

impl Format {
    /// Look up a format token (`"png"`, `"JPG"`, `"tiff"`...).
    ///
    /// Tokens must be non-empty ASCII alphanumerics, so MIME strings such as
    /// `image/jpg` or a bare `:` are rejected.
    pub fn from_token(token: &str) -> Option<Self> {
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }
        match token.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            "webp" => Some(Self::WebP),
            "ico" => Some(Self::Ico),
            "tga" => Some(Self::Tga),
            "pnm" | "ppm" | "pgm" | "pbm" | "pam" => Some(Self::Pnm),
            "pdf" => Some(Self::Pdf),
            "ps" | "eps" => Some(Self::Ps),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }

    /// Format from a file path's extension, or a bare token.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        match path.extension() {
            Some(ext) => ext.to_str().and_then(Self::from_token),
            None => path.to_str().and_then(Self::from_token),
        }
    }

    /// Canonical (upper-case) format name reported by `type_name()`.
    pub fn magick(&self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Gif => "GIF",
            Self::Bmp => "BMP",
            Self::Tiff => "TIFF",
            Self::WebP => "WEBP",
            Self::Ico => "ICO",
            Self::Tga => "TGA",
            Self::Pnm => "PNM",
            Self::Pdf => "PDF",
            Self::Ps => "PS",
            Self::Svg => "SVG",
        }
    }

    /// Preferred file extension (temp-file spills, default output names).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::WebP => "webp",
            Self::Ico => "ico",
            Self::Tga => "tga",
            Self::Pnm => "pnm",
            Self::Pdf => "pdf",
            Self::Ps => "ps",
            Self::Svg => "svg",
        }
    }

    /// The `image` crate format backing this entry, if any.
    pub fn image_format(&self) -> Option<ImageFormat> {
        match self {
            Self::Png => Some(ImageFormat::Png),
            Self::Jpeg => Some(ImageFormat::Jpeg),
            Self::Gif => Some(ImageFormat::Gif),
            Self::Bmp => Some(ImageFormat::Bmp),
            Self::Tiff => Some(ImageFormat::Tiff),
            Self::WebP => Some(ImageFormat::WebP),
            Self::Ico => Some(ImageFormat::Ico),
            Self::Tga => Some(ImageFormat::Tga),
            Self::Pnm => Some(ImageFormat::Pnm),
            Self::Pdf | Self::Ps | Self::Svg => None,
        }
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::Bmp => Some(Self::Bmp),
            ImageFormat::Tiff => Some(Self::Tiff),
            ImageFormat::WebP => Some(Self::WebP),
            ImageFormat::Ico => Some(Self::Ico),
            ImageFormat::Tga => Some(Self::Tga),
            ImageFormat::Pnm => Some(Self::Pnm),
            _ => None,
        }
    }

    /// Whether a codec is compiled in for this format.
    pub fn has_delegate(&self) -> bool {
        self.image_format().is_some()
    }

    /// Every registry entry, in a stable order.
    pub fn all() -> &'static [Format] {
        &[
            Self::Png,
            Self::Jpeg,
            Self::Gif,
            Self::Bmp,
            Self::Tiff,
            Self::WebP,
            Self::Ico,
            Self::Tga,
            Self::Pnm,
            Self::Pdf,
            Self::Ps,
            Self::Svg,
        ]
    }
}

/// Interlace scheme requested for the next export.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interlace {
    #[default]
    None,
    /// Progressive JPEG scans, Adam7 PNG
    Plane,
}

/// EXIF orientation (tag 0x0112).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Undefined,
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
    LeftTop,
    RightTop,
    RightBottom,
    LeftBottom,
}

impl Orientation {
    pub fn from_exif(value: u32) -> Self {
        match value {
            1 => Self::TopLeft,
            2 => Self::TopRight,
            3 => Self::BottomRight,
            4 => Self::BottomLeft,
            5 => Self::LeftTop,
            6 => Self::RightTop,
            7 => Self::RightBottom,
            8 => Self::LeftBottom,
            _ => Self::Undefined,
        }
    }

    /// EXIF value, 0 for `Undefined`.
    pub fn to_exif(&self) -> u16 {
        match self {
            Self::Undefined => 0,
            Self::TopLeft => 1,
            Self::TopRight => 2,
            Self::BottomRight => 3,
            Self::BottomLeft => 4,
            Self::LeftTop => 5,
            Self::RightTop => 6,
            Self::RightBottom => 7,
            Self::LeftBottom => 8,
        }
    }

    /// Whether applying this orientation swaps width and height.
    pub fn swaps_dimensions(&self) -> bool {
        matches!(
            self,
            Self::LeftTop | Self::RightTop | Self::RightBottom | Self::LeftBottom
        )
    }
}

/// Resampling family chosen from the scale ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeFilter {
    /// High-quality Lanczos3 convolution
    Adaptive,
    /// Cheap box filter for large reductions
    Thumbnail,
}

impl ResizeFilter {
    /// Ratios above this use the adaptive filter.
    pub const ADAPTIVE_THRESHOLD: f64 = 0.4;

    pub fn for_ratio(ratio: f64) -> Self {
        if ratio > Self::ADAPTIVE_THRESHOLD {
            Self::Adaptive
        } else {
            Self::Thumbnail
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adaptive => "adaptive",
            Self::Thumbnail => "thumbnail",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_tokens() {
        assert_eq!(Format::from_token("png"), Some(Format::Png));
        assert_eq!(Format::from_token("JPG"), Some(Format::Jpeg));
        assert_eq!(Format::from_token("Tiff"), Some(Format::Tiff));
        assert_eq!(Format::from_token("pdf"), Some(Format::Pdf));
        for bad in ["", " ", ":", "image/jpg", "jp g", "xyz"] {
            assert_eq!(Format::from_token(bad), None, "{bad:?}");
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path("out/heart.png"), Some(Format::Png));
        assert_eq!(Format::from_path("photo.JPEG"), Some(Format::Jpeg));
        assert_eq!(Format::from_path("jpg"), Some(Format::Jpeg));
        assert_eq!(Format::from_path("noext"), None);
    }

    #[test]
    fn test_delegates() {
        for format in Format::all() {
            assert_eq!(format.has_delegate(), format.image_format().is_some());
        }
        assert!(!Format::Pdf.has_delegate());
        assert!(!Format::Svg.has_delegate());
        assert!(Format::WebP.has_delegate());
    }

    #[test]
    fn test_image_format_round_trip() {
        for format in Format::all() {
            if let Some(f) = format.image_format() {
                assert_eq!(Format::from_image_format(f), Some(*format));
            }
        }
    }

    #[test]
    fn test_orientation() {
        assert_eq!(Orientation::from_exif(6), Orientation::RightTop);
        assert_eq!(Orientation::from_exif(0), Orientation::Undefined);
        assert_eq!(Orientation::from_exif(9), Orientation::Undefined);
        assert!(Orientation::RightTop.swaps_dimensions());
        assert!(!Orientation::BottomRight.swaps_dimensions());
        assert_eq!(Orientation::LeftBottom.to_exif(), 8);
    }

    #[test]
    fn test_filter_threshold() {
        assert_eq!(ResizeFilter::for_ratio(0.41), ResizeFilter::Adaptive);
        assert_eq!(ResizeFilter::for_ratio(0.4), ResizeFilter::Thumbnail);
        assert_eq!(ResizeFilter::for_ratio(0.0), ResizeFilter::Thumbnail);
    }
}
