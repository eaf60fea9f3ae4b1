// src/engine/layers.rs
//
// Layer compositing: drop shadow, background fill, alpha separation and
// negate. Every function builds a new image and leaves the input alone.

use image::{imageops, DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use tracing::debug;

/// Output of [`shadow`]: the merged image and where its top-left corner
/// sits relative to the original image's top-left corner.
#[derive(Debug)]
pub struct ShadowLayer {
    pub image: DynamicImage,
    pub offset_x: i64,
    pub offset_y: i64,
}

/// Blur padding on each side of the shadow: `ceil(2 * sigma)`, saturating.
/// NaN and negative sigmas pad nothing; an infinite sigma saturates.
pub fn shadow_padding(sigma: f32) -> u32 {
    if sigma.is_nan() || sigma <= 0.0 {
        return 0;
    }
    (2.0 * sigma).ceil() as u32
}

/// Upper bound on the merged canvas size for [`shadow`], for limit checks
/// before any pixel is allocated.
pub fn shadow_extent(width: u32, height: u32, sigma: f32, x_offset: i64, y_offset: i64) -> (u64, u64) {
    let pad = u64::from(shadow_padding(sigma)).saturating_mul(2);
    let grow = |side: u32, offset: i64| {
        u64::from(side)
            .saturating_add(pad)
            .saturating_add(offset.unsigned_abs())
    };
    (grow(width, x_offset), grow(height, y_offset))
}

/// Drop shadow merged under the image.
///
/// The shadow is the image's alpha silhouette painted in `color`, scaled by
/// `opacity` (0-100), padded by `ceil(2 * sigma)` on each side, blurred and
/// shifted by `(x_offset - pad, y_offset - pad)`. Both layers are merged on a
/// transparent canvas spanning their union.
///
/// Callers check [`shadow_extent`] against their limits first.
pub fn shadow(
    img: &DynamicImage,
    color: Rgba<u8>,
    opacity: f32,
    sigma: f32,
    x_offset: i64,
    y_offset: i64,
) -> ShadowLayer {
    let sigma = if sigma.is_finite() { sigma.max(0.0) } else { 0.0 };
    let pad = shadow_padding(sigma);
    let opacity = if opacity.is_finite() {
        opacity.clamp(0.0, 100.0) / 100.0
    } else {
        0.0
    };
    let source = img.to_rgba8();
    let (w, h) = source.dimensions();

    // Transparent pixels still carry the shadow color so the blur does not
    // darken the edges
    let mut silhouette =
        RgbaImage::from_pixel(w + 2 * pad, h + 2 * pad, Rgba([color[0], color[1], color[2], 0]));
    let color_alpha = color[3] as f32 / 255.0;
    for (x, y, pixel) in source.enumerate_pixels() {
        let alpha = (pixel[3] as f32 * opacity * color_alpha).round() as u8;
        silhouette.put_pixel(x + pad, y + pad, Rgba([color[0], color[1], color[2], alpha]));
    }
    let blurred = if sigma > 0.0 {
        imageops::blur(&silhouette, sigma)
    } else {
        silhouette
    };

    let shadow_x = x_offset - pad as i64;
    let shadow_y = y_offset - pad as i64;
    let min_x = shadow_x.min(0);
    let min_y = shadow_y.min(0);
    let max_x = (shadow_x + blurred.width() as i64).max(w as i64);
    let max_y = (shadow_y + blurred.height() as i64).max(h as i64);

    let mut canvas = RgbaImage::new((max_x - min_x) as u32, (max_y - min_y) as u32);
    imageops::overlay(&mut canvas, &blurred, shadow_x - min_x, shadow_y - min_y);
    imageops::overlay(&mut canvas, &source, -min_x, -min_y);

    debug!(
        width = canvas.width(),
        height = canvas.height(),
        pad,
        "shadow merged"
    );
    ShadowLayer {
        image: DynamicImage::ImageRgba8(canvas),
        offset_x: min_x,
        offset_y: min_y,
    }
}

/// Composite the image over a same-sized canvas painted with `color`.
pub fn fill_background(img: &DynamicImage, color: Rgba<u8>) -> DynamicImage {
    let mut canvas = RgbaImage::from_pixel(img.width(), img.height(), color);
    imageops::overlay(&mut canvas, &img.to_rgba8(), 0, 0);
    if color[3] == 255 {
        // Fully opaque background leaves no alpha worth keeping
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
    } else {
        DynamicImage::ImageRgba8(canvas)
    }
}

/// 8-bit grayscale image of the alpha channel. Opaque images become white.
pub fn separate_alpha(img: &DynamicImage) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    if !img.color().has_alpha() {
        return DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([255])));
    }
    let rgba = img.to_rgba8();
    let alpha = GrayImage::from_fn(w, h, |x, y| Luma([rgba.get_pixel(x, y)[3]]));
    DynamicImage::ImageLuma8(alpha)
}

/// Invert color channels. Alpha is untouched.
pub fn negate(img: &DynamicImage) -> DynamicImage {
    let mut negated = img.clone();
    negated.invert();
    negated
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    fn assert_close(actual: Rgba<u8>, expected: Rgba<u8>) {
        for (a, e) in actual.0.iter().zip(expected.0.iter()) {
            assert!(a.abs_diff(*e) <= 1, "{actual:?} != {expected:?}");
        }
    }

    /// Opaque square in the middle of a transparent image
    fn create_sprite(size: u32, inset: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(size, size, |x, y| {
            let inside = x >= inset && y >= inset && x < size - inset && y < size - inset;
            if inside {
                Rgba([200, 10, 10, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        }))
    }

    #[test]
    fn test_shadow_grows_canvas() {
        let img = create_sprite(20, 5);
        let layer = shadow(&img, Rgba([0, 0, 0, 255]), 80.0, 3.0, 5, 5);
        // pad = 6; shadow spans [-1, 31) in both axes, image [0, 20)
        assert_eq!(layer.image.dimensions(), (32, 32));
        assert_eq!((layer.offset_x, layer.offset_y), (-1, -1));
    }

    #[test]
    fn test_shadow_keeps_original_on_top() {
        let img = create_sprite(20, 5);
        let layer = shadow(&img, Rgba([0, 0, 0, 255]), 100.0, 1.0, 4, 4);
        let dx = -layer.offset_x as u32;
        let dy = -layer.offset_y as u32;
        assert_close(layer.image.get_pixel(10 + dx, 10 + dy), Rgba([200, 10, 10, 255]));
        // Shadow visible past the sprite's bottom-right corner
        assert!(layer.image.get_pixel(17 + dx, 17 + dy)[3] > 0);
    }

    #[test]
    fn test_shadow_zero_sigma_no_pad() {
        let img = create_sprite(10, 2);
        let layer = shadow(&img, Rgba([0, 0, 0, 255]), 50.0, 0.0, 0, 0);
        assert_eq!(layer.image.dimensions(), (10, 10));
    }

    #[test]
    fn test_shadow_extent_saturates() {
        assert_eq!(shadow_padding(f32::NAN), 0);
        assert_eq!(shadow_padding(-3.0), 0);
        assert_eq!(shadow_padding(1.2), 3);
        assert_eq!(shadow_padding(f32::INFINITY), u32::MAX);
        assert_eq!(shadow_padding(1e19), u32::MAX);

        assert_eq!(shadow_extent(20, 20, 3.0, 5, -5), (37, 37));
        let (w, h) = shadow_extent(u32::MAX, 1, f32::INFINITY, i64::MIN, i64::MAX);
        assert!(w > u64::from(u32::MAX));
        assert!(h > u64::from(u32::MAX));
    }

    #[test]
    fn test_fill_background() {
        let img = create_sprite(10, 3);
        let filled = fill_background(&img, Rgba([0, 0, 255, 255]));
        assert!(!filled.color().has_alpha());
        assert_close(filled.get_pixel(0, 0), Rgba([0, 0, 255, 255]));
        assert_close(filled.get_pixel(5, 5), Rgba([200, 10, 10, 255]));
    }

    #[test]
    fn test_separate_alpha() {
        let img = create_sprite(10, 3);
        let alpha = separate_alpha(&img);
        assert!(matches!(alpha, DynamicImage::ImageLuma8(_)));
        assert_eq!(alpha.get_pixel(0, 0)[0], 0);
        assert_eq!(alpha.get_pixel(5, 5)[0], 255);

        let opaque = DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
        assert_eq!(separate_alpha(&opaque).get_pixel(1, 1)[0], 255);
    }

    #[test]
    fn test_negate_keeps_alpha() {
        let img = create_sprite(10, 3);
        let negated = negate(&img);
        assert_eq!(negated.get_pixel(5, 5), Rgba([55, 245, 245, 255]));
        assert_eq!(negated.get_pixel(0, 0)[3], 0);
    }
}
