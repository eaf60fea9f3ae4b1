// src/engine/pipeline.rs
//
// Pixel operations: resize, crop, orientation and the virtual canvas (page)
// an image sits inside.

use crate::error::HandleError;
use crate::ops::{Orientation, ResizeFilter};
use fast_image_resize::{self as fir, MulDiv, PixelType, ResizeOptions};
use image::{
    imageops::{self, FilterType},
    DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage,
};
use tracing::{debug, warn};

use super::common::EngineResult;
use super::geometry::Geometry;

// Use DynamicImage::width()/height() (built-in methods) to avoid pulling in GenericImageView.

#[derive(Debug)]
pub struct ResizeError {
    pub source_dims: (u32, u32),
    pub target_dims: (u32, u32),
    pub reason: String,
}

impl ResizeError {
    pub fn new(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        reason: impl Into<String>,
    ) -> Self {
        Self {
            source_dims,
            target_dims,
            reason: reason.into(),
        }
    }

    pub fn into_handle_error(self) -> HandleError {
        HandleError::resize_failed(self.source_dims, self.target_dims, self.reason)
    }
}

/// Virtual canvas an image is positioned within.
///
/// A zero-sized page means "no canvas": the image stands alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub width: u32,
    pub height: u32,
    pub x: i64,
    pub y: i64,
}

impl Page {
    /// Page covering exactly an image of the given size.
    pub fn bounds(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            x: 0,
            y: 0,
        }
    }

    pub fn is_unset(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether exporting needs the image flattened onto this page first.
    pub fn differs_from(&self, width: u32, height: u32) -> bool {
        !self.is_unset() && *self != Self::bounds(width, height)
    }

    /// Scale the page along with a resize from `from` to `to`.
    pub fn scaled(&self, from: (u32, u32), to: (u32, u32)) -> Self {
        if self.is_unset() || from.0 == 0 || from.1 == 0 {
            return *self;
        }
        let sx = to.0 as f64 / from.0 as f64;
        let sy = to.1 as f64 / from.1 as f64;
        Self {
            width: ((self.width as f64 * sx) + 0.5).floor().max(1.0) as u32,
            height: ((self.height as f64 * sy) + 0.5).floor().max(1.0) as u32,
            x: (self.x as f64 * sx).round() as i64,
            y: (self.y as f64 * sy).round() as i64,
        }
    }
}

// =============================================================================
// RESIZE
// =============================================================================

fn resize_options(filter: ResizeFilter) -> ResizeOptions {
    let kernel = match filter {
        ResizeFilter::Adaptive => fir::FilterType::Lanczos3,
        ResizeFilter::Thumbnail => fir::FilterType::Box,
    };
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(kernel))
}

/// Decide whether alpha premultiplication is required for a given pixel layout.
#[inline]
fn requires_premultiply(pixel_type: PixelType) -> bool {
    matches!(pixel_type, PixelType::U8x2 | PixelType::U8x4)
}

/// Resize to exactly `dst_width` x `dst_height`.
///
/// 8-bit layouts keep their channel count; deeper images are reduced to
/// RGB8/RGBA8 first. Falls back to the image crate if fast_image_resize
/// rejects the buffer.
pub fn resize_image(
    img: &DynamicImage,
    dst_width: u32,
    dst_height: u32,
    filter: ResizeFilter,
) -> std::result::Result<DynamicImage, ResizeError> {
    let src_width = img.width();
    let src_height = img.height();
    let dims = ((src_width, src_height), (dst_width, dst_height));

    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return Err(ResizeError::new(dims.0, dims.1, "invalid dimensions for resize"));
    }

    // Select pixel layout without forcing RGBA when not needed
    let (pixel_type, src_pixels): (PixelType, Vec<u8>) = match img {
        DynamicImage::ImageLuma8(gray) => (PixelType::U8, gray.as_raw().clone()),
        DynamicImage::ImageLumaA8(gray) => (PixelType::U8x2, gray.as_raw().clone()),
        DynamicImage::ImageRgb8(rgb) => (PixelType::U8x3, rgb.as_raw().clone()),
        DynamicImage::ImageRgba8(rgba) => (PixelType::U8x4, rgba.as_raw().clone()),
        other if other.color().has_alpha() => (PixelType::U8x4, other.to_rgba8().into_raw()),
        other => (PixelType::U8x3, other.to_rgb8().into_raw()),
    };

    match resize_with_fir(
        src_width, src_height, src_pixels, pixel_type, dst_width, dst_height, filter,
    ) {
        Ok(resized) => Ok(resized),
        Err(err) => {
            warn!(error = %err, "fast_image_resize failed, using image crate fallback");
            resize_with_image_crate_fallback(img, dst_width, dst_height, filter)
                .map_err(|fallback| {
                    ResizeError::new(
                        dims.0,
                        dims.1,
                        format!("{err}; image crate fallback failed: {fallback}"),
                    )
                })
        }
    }
}

fn resize_with_fir(
    src_width: u32,
    src_height: u32,
    src_pixels: Vec<u8>,
    pixel_type: PixelType,
    dst_width: u32,
    dst_height: u32,
    filter: ResizeFilter,
) -> std::result::Result<DynamicImage, String> {
    let pixel_count = (src_width as usize)
        .checked_mul(src_height as usize)
        .ok_or_else(|| "image dimensions overflow during resize".to_string())?;
    let required_bytes = pixel_count
        .checked_mul(pixel_type.size())
        .ok_or_else(|| "image buffer size overflow during resize".to_string())?;
    if src_pixels.len() < required_bytes {
        return Err(format!(
            "fir source image invalid buffer size. expected {required_bytes} bytes, got {} bytes",
            src_pixels.len()
        ));
    }

    let mut src_image =
        fir::images::Image::from_vec_u8(src_width, src_height, src_pixels, pixel_type)
            .map_err(|e| format!("fir source image error: {e:?}"))?;
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, pixel_type);

    let needs_premultiply = requires_premultiply(pixel_type);
    let mul_div = MulDiv::default();
    if needs_premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
    }

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &resize_options(filter))
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    if needs_premultiply {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
    }

    let dst_pixels = dst_image.into_vec();
    let resized = match pixel_type {
        PixelType::U8 => GrayImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageLuma8),
        PixelType::U8x2 => GrayAlphaImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageLumaA8),
        PixelType::U8x3 => RgbImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageRgb8),
        PixelType::U8x4 => RgbaImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageRgba8),
        _ => None,
    };
    resized.ok_or_else(|| "failed to create image from resized data".to_string())
}

fn resize_with_image_crate_fallback(
    img: &DynamicImage,
    dst_width: u32,
    dst_height: u32,
    filter: ResizeFilter,
) -> std::result::Result<DynamicImage, String> {
    let filter = match filter {
        ResizeFilter::Adaptive => FilterType::Lanczos3,
        ResizeFilter::Thumbnail => FilterType::Triangle,
    };
    let resized = img.resize_exact(dst_width, dst_height, filter);
    if resized.width() != dst_width || resized.height() != dst_height {
        return Err(format!(
            "fallback produced {}x{}",
            resized.width(),
            resized.height()
        ));
    }
    Ok(resized)
}

// =============================================================================
// CROP
// =============================================================================

/// Extract `region` (clipped to the image) and return the new image plus the
/// page it now sits in. The page keeps the pre-crop canvas size and records
/// where the region came from.
pub fn crop_region(
    img: &DynamicImage,
    page: Page,
    region: Geometry,
    geometry: &str,
) -> EngineResult<(DynamicImage, Page)> {
    let iw = img.width() as i64;
    let ih = img.height() as i64;
    let x0 = region.x.max(0);
    let y0 = region.y.max(0);
    let x1 = region.x.saturating_add(region.width as i64).min(iw);
    let y1 = region.y.saturating_add(region.height as i64).min(ih);

    if region.width == 0 || region.height == 0 || x0 >= x1 || y0 >= y1 {
        return Err(HandleError::geometry_does_not_contain_image(
            geometry.to_string(),
        ));
    }

    let (cw, ch) = ((x1 - x0) as u32, (y1 - y0) as u32);
    debug!(x = x0, y = y0, width = cw, height = ch, "crop");
    let cropped = img.crop_imm(x0 as u32, y0 as u32, cw, ch);

    let canvas = if page.is_unset() {
        Page::bounds(img.width(), img.height())
    } else {
        page
    };
    let new_page = Page {
        width: canvas.width,
        height: canvas.height,
        x: page.x + x0,
        y: page.y + y0,
    };
    Ok((cropped, new_page))
}

// =============================================================================
// ORIENTATION & CANVAS
// =============================================================================

/// Apply an EXIF orientation so the result is upright.
pub fn orient(img: &DynamicImage, orientation: Orientation) -> Option<DynamicImage> {
    let oriented = match orientation {
        Orientation::Undefined | Orientation::TopLeft => return None,
        Orientation::TopRight => img.fliph(),
        Orientation::BottomRight => img.rotate180(),
        Orientation::BottomLeft => img.flipv(),
        Orientation::LeftTop => img.rotate90().fliph(), // transpose
        Orientation::RightTop => img.rotate90(),
        Orientation::RightBottom => img.rotate270().fliph(), // transverse
        Orientation::LeftBottom => img.rotate270(),
    };
    Some(oriented)
}

/// Place the image on a transparent page-sized canvas at the page offset.
/// Returns `None` when the page adds nothing.
pub fn flatten_onto_page(img: &DynamicImage, page: Page) -> Option<DynamicImage> {
    if !page.differs_from(img.width(), img.height()) {
        return None;
    }
    let mut canvas = RgbaImage::new(page.width, page.height);
    imageops::overlay(&mut canvas, &img.to_rgba8(), page.x, page.y);
    Some(DynamicImage::ImageRgba8(canvas))
}
