// tests/common/mod.rs
//
// Fixtures shared by the integration suites. Everything is generated in
// memory so no binary assets live in the repository.

#![allow(dead_code)]

use exif::{Field, In, Tag, Value};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use img_parts::{jpeg::Jpeg, Bytes, ImageEXIF};
use std::io::Cursor;

pub const HEART_WIDTH: u32 = 600;
pub const HEART_HEIGHT: u32 = 546;

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

/// Red heart on a transparent 600x546 canvas.
pub fn heart_image() -> DynamicImage {
    let (w, h) = (HEART_WIDTH as f64, HEART_HEIGHT as f64);
    DynamicImage::ImageRgba8(RgbaImage::from_fn(HEART_WIDTH, HEART_HEIGHT, |x, y| {
        // (x^2 + y^2 - 1)^3 - x^2 y^3 <= 0, mapped onto the canvas
        let px = (x as f64 / w - 0.5) * 3.0;
        let py = (0.45 - y as f64 / h) * 3.0;
        let a = px * px + py * py - 1.0;
        if a * a * a - px * px * py * py * py <= 0.0 {
            Rgba([220, 20, 60, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    }))
}

pub fn heart_png() -> Vec<u8> {
    encode(&heart_image(), ImageFormat::Png)
}

pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Png)
}

pub fn gradient_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Jpeg)
}

/// Bare TIFF-structured EXIF block carrying an orientation and a camera make.
pub fn exif_block(orientation: u16) -> Vec<u8> {
    let orientation = Field {
        tag: Tag::Orientation,
        ifd_num: In::PRIMARY,
        value: Value::Short(vec![orientation]),
    };
    let make = Field {
        tag: Tag::Make,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![b"Acme".to_vec()]),
    };
    let mut writer = exif::experimental::Writer::new();
    writer.push_field(&orientation);
    writer.push_field(&make);
    let mut out = Cursor::new(Vec::new());
    writer.write(&mut out, false).unwrap();
    out.into_inner()
}

/// JPEG whose EXIF says it must be rotated `orientation` before display.
pub fn oriented_jpeg(width: u32, height: u32, orientation: u16) -> Vec<u8> {
    let mut jpeg = Jpeg::from_bytes(Bytes::from(gradient_jpeg(width, height))).unwrap();
    jpeg.set_exif(Some(Bytes::from(exif_block(orientation))));
    let mut out = Vec::new();
    jpeg.encoder().write_to(&mut out).unwrap();
    out
}

/// True when a JPEG stream contains a progressive (SOF2) frame header.
pub fn is_progressive_jpeg(data: &[u8]) -> bool {
    data.windows(2).any(|pair| pair == [0xFF, 0xC2])
}

/// Adam7 flag in the IHDR chunk, which always directly follows the signature.
pub fn is_interlaced_png(data: &[u8]) -> bool {
    data.len() > 28 && &data[12..16] == b"IHDR" && data[28] == 1
}
