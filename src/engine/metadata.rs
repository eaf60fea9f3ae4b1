// src/engine/metadata.rs
//
// EXIF and ICC metadata carried alongside the pixels.
// Extracted at load, exposed as exif:* properties, rewritten by auto-orient,
// and re-embedded on export unless stripped.

use crate::error::HandleError;
use crate::ops::{Format, Orientation};
use exif::{Field, In, Tag, Value};
use img_parts::{jpeg::Jpeg, png::Png, webp::WebP, Bytes, ImageEXIF, ImageICC};
use std::io::Cursor;
use tracing::warn;

use super::common::{run_with_panic_policy, EngineResult};

/// Raw metadata blocks. `exif` holds a bare TIFF structure (no `Exif\0\0`
/// prefix).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    pub exif: Option<Vec<u8>>,
    pub icc: Option<Vec<u8>>,
}

impl Metadata {
    /// Pull EXIF and ICC out of a JPEG, PNG or WebP container. Other
    /// formats carry no metadata.
    pub fn extract(bytes: &[u8], format: Format) -> Self {
        let data = Bytes::copy_from_slice(bytes);
        let (exif, icc) = match format {
            Format::Jpeg => match Jpeg::from_bytes(data) {
                Ok(jpeg) => (jpeg.exif(), jpeg.icc_profile()),
                Err(_) => (None, None),
            },
            Format::Png => match Png::from_bytes(data) {
                Ok(png) => (png.exif(), png.icc_profile()),
                Err(_) => (None, None),
            },
            Format::WebP => match WebP::from_bytes(data) {
                Ok(webp) => (webp.exif(), webp.icc_profile()),
                Err(_) => (None, None),
            },
            _ => (None, None),
        };
        Self {
            exif: exif.map(|b| b.to_vec()).filter(|b| !b.is_empty()),
            icc: icc.map(|b| b.to_vec()).filter(|b| validate_icc_profile(b)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exif.is_none() && self.icc.is_none()
    }

    pub fn clear(&mut self) {
        self.exif = None;
        self.icc = None;
    }

    fn parsed_exif(&self) -> Option<exif::Exif> {
        let raw = self.exif.as_ref()?;
        exif::Reader::new().read_raw(raw.clone()).ok()
    }

    /// EXIF Orientation, `Undefined` when absent or out of range.
    pub fn orientation(&self) -> Orientation {
        self.parsed_exif()
            .and_then(|exif| {
                exif.get_field(Tag::Orientation, In::PRIMARY)
                    .and_then(|field| field.value.get_uint(0))
            })
            .map(Orientation::from_exif)
            .unwrap_or_default()
    }

    /// Value of a primary-IFD EXIF tag looked up by name (`"Make"`,
    /// `"Orientation"`...).
    pub fn exif_property(&self, tag_name: &str) -> Option<String> {
        let exif = self.parsed_exif()?;
        let field = exif
            .fields()
            .find(|f| f.ifd_num == In::PRIMARY && f.tag.to_string() == tag_name)?;
        Some(render_value(field))
    }

    /// Rewrite the EXIF block with Orientation = 1 (TopLeft).
    ///
    /// If the block cannot be rebuilt it is dropped: a stale orientation
    /// would make viewers rotate the already-rotated pixels again.
    pub fn reset_orientation(&mut self) {
        let Some(exif) = self.parsed_exif() else {
            return;
        };
        match rewrite_orientation(&exif) {
            Ok(raw) => self.exif = Some(raw),
            Err(err) => {
                warn!(error = %err, "failed to rewrite EXIF orientation, dropping EXIF");
                self.exif = None;
            }
        }
    }
}

fn render_value(field: &Field) -> String {
    match &field.value {
        Value::Ascii(strings) => strings
            .iter()
            .map(|s| String::from_utf8_lossy(s).trim_end_matches('\0').to_string())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Byte(v) if v.len() == 1 => v[0].to_string(),
        Value::Short(v) if v.len() == 1 => v[0].to_string(),
        Value::Long(v) if v.len() == 1 => v[0].to_string(),
        _ => field.display_value().to_string(),
    }
}

fn rewrite_orientation(exif: &exif::Exif) -> EngineResult<Vec<u8>> {
    let upright = Field {
        tag: Tag::Orientation,
        ifd_num: In::PRIMARY,
        value: Value::Short(vec![1]),
    };
    let mut writer = exif::experimental::Writer::new();
    writer.push_field(&upright);
    for field in exif.fields() {
        if field.ifd_num == In::PRIMARY && field.tag != Tag::Orientation {
            writer.push_field(field);
        }
    }
    let mut out = Cursor::new(Vec::new());
    writer
        .write(&mut out, exif.little_endian())
        .map_err(|e| HandleError::encode_failed("exif", e.to_string()))?;
    Ok(out.into_inner())
}

/// Validate ICC profile header
/// ICC profiles must start with a 128-byte header with the `acsp` signature
pub(crate) fn validate_icc_profile(icc_data: &[u8]) -> bool {
    if icc_data.len() < 128 {
        return false;
    }
    let declared = u32::from_be_bytes([icc_data[0], icc_data[1], icc_data[2], icc_data[3]]);
    declared as usize <= icc_data.len() && &icc_data[36..40] == b"acsp"
}

/// Re-insert EXIF/ICC into an encoded JPEG, PNG or WebP. Other formats are
/// returned untouched.
pub fn embed(encoded: Vec<u8>, format: Format, metadata: &Metadata) -> EngineResult<Vec<u8>> {
    if metadata.is_empty() || !matches!(format, Format::Jpeg | Format::Png | Format::WebP) {
        return Ok(encoded);
    }
    run_with_panic_policy("encode:embed_metadata", || {
        let codec = format.extension();
        let data = Bytes::from(encoded);
        let exif = metadata.exif.clone().map(Bytes::from);
        let icc = metadata.icc.clone().map(Bytes::from);
        let parse_err = |e: img_parts::Error| {
            HandleError::encode_failed(codec, format!("failed to parse {codec} for metadata: {e}"))
        };

        let mut output = Vec::new();
        let written = match format {
            Format::Jpeg => {
                let mut jpeg = Jpeg::from_bytes(data).map_err(parse_err)?;
                jpeg.set_exif(exif);
                jpeg.set_icc_profile(icc);
                jpeg.encoder().write_to(&mut output)
            }
            Format::Png => {
                let mut png = Png::from_bytes(data).map_err(parse_err)?;
                png.set_exif(exif);
                png.set_icc_profile(icc);
                png.encoder().write_to(&mut output)
            }
            _ => {
                let mut webp = WebP::from_bytes(data).map_err(parse_err)?;
                webp.set_exif(exif);
                webp.set_icc_profile(icc);
                webp.encoder().write_to(&mut output)
            }
        };
        written.map_err(|e| {
            HandleError::encode_failed(codec, format!("failed to write {codec} with metadata: {e}"))
        })?;
        Ok(output)
    })
}
