// lib.rs
//
// image-handle: explicitly owned image handles over the Rust codec stack
//
// Design goals:
// - One handle owns one decoded image, released by destroy() or Drop
// - Every failure is a typed (severity, reason, description) error
// - A failed operation never leaves a handle half-modified
// - Process-wide limits set once by genesis()

pub mod engine;
pub mod error;
pub mod ops;

use image::ImageReader;
use std::io::Cursor;

pub use engine::{genesis, terminus, ImageHandle, ImageInfo, Limits};
pub use error::{HandleError, Result, Severity};
pub use ops::{Format, Interlace, Orientation, ResizeFilter};

/// Header facts read without decoding pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Option<Format>,
}

/// Read dimensions and format from the header only.
/// This is cheap enough to run before deciding whether to load at all.
pub fn inspect_header(data: &[u8]) -> Result<InspectMetadata> {
    if data.is_empty() {
        return Err(HandleError::empty_buffer());
    }
    let format = engine::detect_format(data);
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| HandleError::decode_failed("header", format!("failed to read image header: {e}")))?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| HandleError::decode_failed("header", format!("failed to read dimensions: {e}")))?;
    Ok(InspectMetadata {
        width,
        height,
        format,
    })
}

/// Get library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Formats with a working decode/encode delegate, by canonical name.
pub fn supported_formats() -> Vec<&'static str> {
    Format::all()
        .iter()
        .filter(|f| f.has_delegate())
        .map(|f| f.magick())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};

    #[test]
    fn test_inspect_header() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(21, 13));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        let meta = inspect_header(&buf).unwrap();
        assert_eq!((meta.width, meta.height), (21, 13));
        assert_eq!(meta.format, Some(Format::Png));

        assert!(matches!(inspect_header(&[]), Err(HandleError::EmptyBuffer)));
        assert!(inspect_header(b"not an image").is_err());
    }

    #[test]
    fn test_supported_formats() {
        let formats = supported_formats();
        assert!(formats.contains(&"PNG"));
        assert!(formats.contains(&"JPEG"));
        assert!(!formats.contains(&"PDF"));
        assert!(!version().is_empty());
    }
}
