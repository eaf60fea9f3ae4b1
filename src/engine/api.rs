// src/engine/api.rs
//
// ImageHandle: the explicitly owned, handle-based surface of the crate.
// Every mutation builds its replacement first and only swaps it in once it
// succeeded, so a failed call leaves the handle exactly as it was.

use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::engine::decoder;
use crate::engine::encoder::{self, ChromaSampling, EncodeOptions, DEFAULT_QUALITY};
use crate::engine::environment::{self, Limits};
use crate::engine::geometry::{self, Geometry};
use crate::engine::io;
use crate::engine::layers;
use crate::engine::metadata::{self, Metadata};
use crate::engine::pipeline::{self, Page, ResizeError};
use crate::engine::color::parse_color;
use crate::error::HandleError;
use crate::ops::{Format, Interlace, Orientation, ResizeFilter};
use image::DynamicImage;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub const SAMPLING_FACTOR_PROPERTY: &str = "jpeg:sampling-factor";
pub const WEBP_LOSSLESS_PROPERTY: &str = "webp:lossless";
pub const COMMENT_PROPERTY: &str = "comment";

/// The decoded image a handle owns.
#[derive(Debug)]
struct Image {
    pixels: DynamicImage,
    page: Page,
    format: Format,
    properties: BTreeMap<String, String>,
    metadata: Metadata,
    orientation: Orientation,
    quality: Option<u8>,
    limits: Limits,
}

/// Encoding hints and bookkeeping that travel with a handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    /// Last load source or export target
    pub filename: String,
    /// Format hint the handle was loaded with
    pub magick: String,
    pub interlace: Interlace,
}

/// One decoded image plus its encoding info.
///
/// A handle is either live or destroyed. Destroyed handles answer accessors
/// with zero/empty values and refuse every mutation with `HandleDestroyed`.
#[derive(Debug)]
pub struct ImageHandle {
    image: Option<Image>,
    info: Option<ImageInfo>,
}

impl ImageHandle {
    fn from_parts(image: Image, info: ImageInfo) -> EngineResult<Self> {
        environment::handle_acquired()?;
        Ok(Self {
            image: Some(image),
            info: Some(info),
        })
    }

    fn decode_into(
        bytes: &[u8],
        hint: Option<Format>,
        filename: String,
        limits: Limits,
    ) -> EngineResult<Self> {
        let (pixels, format) = decoder::decode(bytes, hint, &limits)?;
        let metadata = Metadata::extract(bytes, format);
        let orientation = metadata.orientation();
        debug!(
            format = format.magick(),
            width = pixels.width(),
            height = pixels.height(),
            ?orientation,
            "image loaded"
        );
        let image = Image {
            page: Page::bounds(pixels.width(), pixels.height()),
            pixels,
            format,
            properties: BTreeMap::new(),
            metadata,
            orientation,
            quality: None,
            limits,
        };
        let info = ImageInfo {
            filename,
            magick: hint.unwrap_or(format).magick().to_string(),
            interlace: Interlace::None,
        };
        Self::from_parts(image, info)
    }

    /// Load an image from a file. The format is sniffed from the content,
    /// then taken from the extension.
    pub fn load_from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let env = environment::current()?;
        let path = path.as_ref();
        let source = io::read_file(path)?;
        let hint = Format::from_path(path);
        if source.is_empty() {
            let ext = hint.map(|f| f.extension()).unwrap_or("unknown");
            return Err(HandleError::decode_failed(ext, "empty file"));
        }
        Self::decode_into(source.as_bytes(), hint, path.display().to_string(), env.limits())
    }

    /// Load an image from memory. `format` is a codec token such as `"png"`.
    ///
    /// Every compiled codec decodes from memory. Hints without a codec fail
    /// with `MissingDelegate` unless the bytes identify a supported format.
    pub fn load_from_buffer(bytes: &[u8], format: &str) -> EngineResult<Self> {
        let env = environment::current()?;
        let hint =
            Format::from_token(format).ok_or_else(|| HandleError::unsupported_format(format.to_string()))?;
        if bytes.is_empty() {
            return Err(HandleError::empty_buffer());
        }
        let filename = format!("image.{}", hint.extension());
        Self::decode_into(bytes, Some(hint), filename, env.limits())
    }

    fn live(&self) -> EngineResult<&Image> {
        self.image.as_ref().ok_or_else(HandleError::handle_destroyed)
    }

    fn live_mut(&mut self) -> EngineResult<&mut Image> {
        self.image.as_mut().ok_or_else(HandleError::handle_destroyed)
    }

    fn info_mut(&mut self) -> EngineResult<&mut ImageInfo> {
        self.info.as_mut().ok_or_else(HandleError::handle_destroyed)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn is_live(&self) -> bool {
        self.image.is_some()
    }

    pub fn width(&self) -> u32 {
        self.image.as_ref().map_or(0, |i| i.pixels.width())
    }

    pub fn height(&self) -> u32 {
        self.image.as_ref().map_or(0, |i| i.pixels.height())
    }

    /// Canonical format name (`"PNG"`, `"JPEG"`...), empty once destroyed.
    pub fn type_name(&self) -> &'static str {
        self.image.as_ref().map_or("", |i| i.format.magick())
    }

    pub fn info(&self) -> Option<&ImageInfo> {
        self.info.as_ref()
    }

    pub fn virtual_canvas_width(&self) -> u32 {
        self.image.as_ref().map_or(0, |i| i.page.width)
    }

    pub fn virtual_canvas_height(&self) -> u32 {
        self.image.as_ref().map_or(0, |i| i.page.height)
    }

    pub fn orientation(&self) -> Orientation {
        self.image
            .as_ref()
            .map_or(Orientation::Undefined, |i| i.orientation)
    }

    /// Output quality set with [`set_quality`](Self::set_quality), if any.
    pub fn quality(&self) -> Option<u8> {
        self.image.as_ref().and_then(|i| i.quality)
    }

    // =========================================================================
    // PROPERTIES
    // =========================================================================

    /// Named property. `width`, `height`, `magick` and `exif:<Tag>` are
    /// derived from the image; everything else is whatever was set.
    pub fn get_property(&self, name: &str) -> Option<String> {
        let image = self.image.as_ref()?;
        match name.to_ascii_lowercase().as_str() {
            "width" => return Some(image.pixels.width().to_string()),
            "height" => return Some(image.pixels.height().to_string()),
            "magick" => return Some(image.format.magick().to_string()),
            _ => {}
        }
        if let Some(tag) = exif_tag(name) {
            return image.metadata.exif_property(tag);
        }
        image.properties.get(name).cloned()
    }

    pub fn set_property(&mut self, name: &str, value: &str) -> EngineResult<()> {
        let image = self.live_mut()?;
        if name.trim().is_empty() {
            return Err(HandleError::invalid_property(
                name.to_string(),
                "property name is empty",
            ));
        }
        if is_read_only(name) {
            return Err(HandleError::read_only_property(name.to_string()));
        }
        match name {
            SAMPLING_FACTOR_PROPERTY if ChromaSampling::parse(value).is_none() => {
                return Err(HandleError::invalid_property(
                    name.to_string(),
                    format!("unsupported sampling factor '{value}'"),
                ));
            }
            WEBP_LOSSLESS_PROPERTY if parse_bool(value).is_none() => {
                return Err(HandleError::invalid_property(
                    name.to_string(),
                    format!("expected true or false, got '{value}'"),
                ));
            }
            _ => {}
        }
        image.properties.insert(name.to_string(), value.to_string());
        Ok(())
    }

    // =========================================================================
    // GEOMETRY
    // =========================================================================

    /// Parse a geometry string against the current dimensions.
    pub fn parse_geometry(&self, geometry: &str) -> EngineResult<Geometry> {
        let image = self.live()?;
        geometry::parse_region(geometry, image.pixels.width(), image.pixels.height())
    }

    /// `|(width * height) / (current width * current height)|`, 0 when the
    /// handle holds no pixels.
    pub fn resize_ratio(&self, width: u32, height: u32) -> f64 {
        let current = self.width() as f64 * self.height() as f64;
        if current == 0.0 {
            return 0.0;
        }
        ((width as f64 * height as f64) / current).abs()
    }

    // =========================================================================
    // TRANSFORMATIONS
    // =========================================================================

    /// Resize to `geometry`. Ratios above 0.4 use the adaptive (Lanczos3)
    /// filter, smaller ones the thumbnail (box) filter.
    pub fn resize(&mut self, geometry: &str) -> EngineResult<()> {
        let target = self.parse_geometry(geometry)?;
        let ratio = self.resize_ratio(target.width, target.height);
        let filter = ResizeFilter::for_ratio(ratio);

        let (pixels, page) = {
            let image = self.live()?;
            let (w, h) = (image.pixels.width(), image.pixels.height());
            image.limits.check(target.width, target.height)?;
            debug!(
                from_width = w,
                from_height = h,
                to_width = target.width,
                to_height = target.height,
                ratio,
                filter = filter.as_str(),
                "resize"
            );
            let pixels = run_with_panic_policy("resize", || {
                pipeline::resize_image(&image.pixels, target.width, target.height, filter)
                    .map_err(ResizeError::into_handle_error)
            })?;
            let page = image.page.scaled((w, h), (target.width, target.height));
            (pixels, page)
        };

        let image = self.live_mut()?;
        image.pixels = pixels;
        image.page = page;
        Ok(())
    }

    /// Crop to `geometry`. The virtual canvas keeps its size and records
    /// the crop offset until [`plus_repage`](Self::plus_repage).
    pub fn crop(&mut self, geometry: &str) -> EngineResult<()> {
        let region = self.parse_geometry(geometry)?;
        let (pixels, page) = {
            let image = self.live()?;
            pipeline::crop_region(&image.pixels, image.page, region, geometry)?
        };
        let image = self.live_mut()?;
        image.pixels = pixels;
        image.page = page;
        Ok(())
    }

    /// Reset the virtual canvas.
    pub fn plus_repage(&mut self) -> EngineResult<()> {
        self.live_mut()?.page = Page::default();
        Ok(())
    }

    /// Merge a blurred drop shadow under the image.
    pub fn shadow(
        &mut self,
        color: &str,
        opacity: f32,
        sigma: f32,
        x_offset: i64,
        y_offset: i64,
    ) -> EngineResult<()> {
        let color = parse_color(color)?;
        let layer = {
            let image = self.live()?;
            let (w, h) = layers::shadow_extent(
                image.pixels.width(),
                image.pixels.height(),
                sigma,
                x_offset,
                y_offset,
            );
            let clamp = |side: u64| u32::try_from(side).unwrap_or(u32::MAX);
            image.limits.check(clamp(w), clamp(h))?;
            run_with_panic_policy("shadow", || {
                Ok(layers::shadow(&image.pixels, color, opacity, sigma, x_offset, y_offset))
            })?
        };
        let image = self.live_mut()?;
        image.page = Page::bounds(layer.image.width(), layer.image.height());
        image.pixels = layer.image;
        Ok(())
    }

    /// Composite the image over a canvas painted with `color`.
    pub fn fill_background_color(&mut self, color: &str) -> EngineResult<()> {
        let color = parse_color(color)?;
        let pixels = layers::fill_background(&self.live()?.pixels, color);
        self.live_mut()?.pixels = pixels;
        Ok(())
    }

    /// Replace the image with a grayscale rendering of its alpha channel.
    pub fn separate_alpha_channel(&mut self) -> EngineResult<()> {
        let pixels = layers::separate_alpha(&self.live()?.pixels);
        self.live_mut()?.pixels = pixels;
        Ok(())
    }

    /// Invert the color channels.
    pub fn negate(&mut self) -> EngineResult<()> {
        let pixels = layers::negate(&self.live()?.pixels);
        self.live_mut()?.pixels = pixels;
        Ok(())
    }

    /// Drop EXIF, ICC and comments. Pixels are untouched.
    pub fn strip(&mut self) -> EngineResult<()> {
        let image = self.live_mut()?;
        image.metadata.clear();
        image.properties.remove(COMMENT_PROPERTY);
        Ok(())
    }

    /// Rotate/flip according to the EXIF orientation and mark the image
    /// upright. A no-op for TopLeft and Undefined.
    pub fn auto_orient(&mut self) -> EngineResult<()> {
        let oriented = {
            let image = self.live()?;
            pipeline::orient(&image.pixels, image.orientation)
        };
        let Some(pixels) = oriented else {
            return Ok(());
        };
        let image = self.live_mut()?;
        debug!(orientation = ?image.orientation, "auto-orient");
        image.page = Page::bounds(pixels.width(), pixels.height());
        image.pixels = pixels;
        image.orientation = Orientation::TopLeft;
        image.metadata.reset_orientation();
        Ok(())
    }

    /// Output quality for the next export, clamped to 0-100.
    pub fn set_quality(&mut self, quality: i32) -> EngineResult<()> {
        self.live_mut()?.quality = Some(quality.clamp(0, 100) as u8);
        Ok(())
    }

    /// Plane interlace for the next export: progressive JPEG, Adam7 PNG.
    pub fn progressive(&mut self) -> EngineResult<()> {
        self.live()?;
        self.info_mut()?.interlace = Interlace::Plane;
        Ok(())
    }

    // =========================================================================
    // EXPORT
    // =========================================================================

    fn encode_as(&self, format: Format) -> EngineResult<Vec<u8>> {
        let image = self.live()?;
        if !format.has_delegate() {
            return Err(HandleError::missing_delegate(format.extension()));
        }
        let interlace = self.info.as_ref().map_or(Interlace::None, |i| i.interlace);
        let options = EncodeOptions {
            quality: image.quality.unwrap_or(DEFAULT_QUALITY),
            interlace,
            sampling: image
                .properties
                .get(SAMPLING_FACTOR_PROPERTY)
                .and_then(|v| ChromaSampling::parse(v))
                .unwrap_or(EncodeOptions::default().sampling),
            webp_lossless: image
                .properties
                .get(WEBP_LOSSLESS_PROPERTY)
                .and_then(|v| parse_bool(v))
                .unwrap_or(false),
        };

        // A page that differs from the image bounds is part of the output
        let pixels: Cow<'_, DynamicImage> = match pipeline::flatten_onto_page(&image.pixels, image.page) {
            Some(flat) => Cow::Owned(flat),
            None => Cow::Borrowed(&image.pixels),
        };
        let encoded = encoder::encode(&pixels, format, &options)?;
        metadata::embed(encoded, format, &image.metadata)
    }

    /// Encode into the codec named by `ext` (`"png"`, `"jpg"`, `"out.webp"`...).
    pub fn to_blob(&mut self, ext: &str) -> EngineResult<Vec<u8>> {
        let format = Format::from_token(ext)
            .or_else(|| Format::from_path(ext))
            .ok_or_else(|| HandleError::unsupported_format(ext.to_string()))?;
        let blob = self.encode_as(format)?;
        self.info_mut()?.filename = format!("image.{}", format.extension());
        Ok(blob)
    }

    /// Encode by the path's extension and write atomically.
    pub fn to_file(&mut self, path: impl AsRef<Path>) -> EngineResult<()> {
        let path = path.as_ref();
        let format = Format::from_path(path)
            .filter(|_| path.extension().is_some())
            .ok_or_else(|| HandleError::unsupported_format(path.display().to_string()))?;
        let blob = self.encode_as(format)?;
        io::write_atomic(path, &blob)?;
        debug!(path = %path.display(), bytes = blob.len(), "image written");
        self.info_mut()?.filename = path.display().to_string();
        Ok(())
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Release the image and its info. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.image.take().is_some() {
            environment::handle_released();
        }
        self.info = None;
    }
}

impl Drop for ImageHandle {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn exif_tag(name: &str) -> Option<&str> {
    let prefix = name.get(..5)?;
    prefix.eq_ignore_ascii_case("exif:").then(|| &name[5..])
}

fn is_read_only(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "width" | "height" | "magick"
    ) || exif_tag(name).is_some()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;
    use image::{GenericImageView, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 90, if x < width / 2 { 255 } else { 0 }])
        }));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn load(width: u32, height: u32) -> ImageHandle {
        environment::genesis();
        ImageHandle::load_from_buffer(&png_bytes(width, height), "png").unwrap()
    }

    #[test]
    fn test_load_and_accessors() {
        let handle = load(60, 40);
        assert!(handle.is_live());
        assert_eq!((handle.width(), handle.height()), (60, 40));
        assert_eq!(handle.type_name(), "PNG");
        assert_eq!(handle.virtual_canvas_width(), 60);
        assert_eq!(handle.info().unwrap().filename, "image.png");
    }

    #[test]
    fn test_bad_hints() {
        environment::genesis();
        let bytes = png_bytes(4, 4);
        for hint in ["", " ", ":", "image/jpg"] {
            let err = ImageHandle::load_from_buffer(&bytes, hint).unwrap_err();
            assert!(matches!(err, HandleError::UnsupportedFormat { .. }), "{hint:?}");
            assert_eq!(err.severity(), Severity::Fatal);
            assert_eq!(err.reason(), "");
        }
        let err = ImageHandle::load_from_buffer(&[], "png").unwrap_err();
        assert!(matches!(err, HandleError::EmptyBuffer));
    }

    #[test]
    fn test_failed_mutation_leaves_handle_unchanged() {
        let mut handle = load(50, 30);
        handle.crop("10x10+5+5").unwrap();
        let before = (
            handle.width(),
            handle.height(),
            handle.virtual_canvas_width(),
            handle.virtual_canvas_height(),
            handle.type_name(),
        );
        assert!(handle.resize("blurgh").is_err());
        assert!(handle.crop("5x5+400+400").is_err());
        assert!(handle.shadow("notacolor", 50.0, 2.0, 1, 1).is_err());
        assert!(handle.fill_background_color("#zz").is_err());
        let after = (
            handle.width(),
            handle.height(),
            handle.virtual_canvas_width(),
            handle.virtual_canvas_height(),
            handle.type_name(),
        );
        assert_eq!(before, after);
    }

    #[test]
    fn test_resize_scales_page() {
        let mut handle = load(100, 50);
        handle.resize("50x25!").unwrap();
        assert_eq!((handle.width(), handle.height()), (50, 25));
        assert_eq!(handle.virtual_canvas_width(), 50);
        assert_eq!(handle.virtual_canvas_height(), 25);
    }

    #[test]
    fn test_properties() {
        let mut handle = load(8, 8);
        handle.set_property("comment", "hello").unwrap();
        assert_eq!(handle.get_property("comment").as_deref(), Some("hello"));
        assert_eq!(handle.get_property("width").as_deref(), Some("8"));
        assert_eq!(handle.get_property("magick").as_deref(), Some("PNG"));
        assert_eq!(handle.get_property("missing"), None);

        let err = handle.set_property("width", "10").unwrap_err();
        assert_eq!(err.reason(), "SetReadOnlyProperty");
        assert_eq!(err.severity(), Severity::Error);
        assert!(handle.set_property("exif:Make", "x").is_err());
        assert!(handle.set_property("", "x").is_err());
        assert!(handle.set_property(SAMPLING_FACTOR_PROPERTY, "9:9:9").is_err());
        handle.set_property(SAMPLING_FACTOR_PROPERTY, "4:4:4").unwrap();

        handle.strip().unwrap();
        assert_eq!(handle.get_property("comment"), None);
    }

    #[test]
    fn test_quality_clamped() {
        let mut handle = load(4, 4);
        assert_eq!(handle.quality(), None);
        handle.set_quality(250).unwrap();
        assert_eq!(handle.quality(), Some(100));
        handle.set_quality(-3).unwrap();
        assert_eq!(handle.quality(), Some(0));
    }

    #[test]
    fn test_destroyed_handle() {
        let mut handle = load(4, 4);
        let live = environment::live_handles();
        assert!(live >= 1);
        handle.destroy();
        handle.destroy();
        assert!(!handle.is_live());
        assert_eq!((handle.width(), handle.height()), (0, 0));
        assert_eq!(handle.type_name(), "");
        assert_eq!(handle.get_property("width"), None);
        assert_eq!(handle.resize_ratio(10, 10), 0.0);
        assert!(matches!(handle.resize("2x2"), Err(HandleError::HandleDestroyed)));
        assert!(matches!(handle.to_blob("png"), Err(HandleError::HandleDestroyed)));
        assert!(matches!(handle.progressive(), Err(HandleError::HandleDestroyed)));
    }

    #[test]
    fn test_blob_flattens_page() {
        let mut handle = load(40, 30);
        handle.crop("10x10+5+5").unwrap();
        let blob = handle.to_blob("png").unwrap();
        let decoded = image::load_from_memory(&blob).unwrap();
        assert_eq!(decoded.dimensions(), (40, 30));

        handle.plus_repage().unwrap();
        let blob = handle.to_blob("png").unwrap();
        let decoded = image::load_from_memory(&blob).unwrap();
        assert_eq!(decoded.dimensions(), (10, 10));
    }

    #[test]
    fn test_blob_unknown_ext() {
        let mut handle = load(4, 4);
        assert!(matches!(
            handle.to_blob("nope"),
            Err(HandleError::UnsupportedFormat { .. })
        ));
        assert_eq!(handle.to_blob("pdf").unwrap_err().reason(), "MissingDelegate");
        assert!(handle.to_blob("out.jpg").is_ok());
    }

    #[test]
    fn test_exif_tag_prefix() {
        assert_eq!(exif_tag("exif:Make"), Some("Make"));
        assert_eq!(exif_tag("EXIF:Orientation"), Some("Orientation"));
        assert_eq!(exif_tag("exi"), None);
        assert!(is_read_only("Width"));
        assert!(!is_read_only("comment"));
    }
}
