// src/engine/geometry.rs
//
// Geometry strings: "<w>x<h>+<x>+<y>" plus the modifier characters
// % ! < > ^ @. Parsing is split from resolution so the same parsed string
// can be applied to any image size.

use crate::error::HandleError;
use bitflags::bitflags;

use super::common::EngineResult;

bitflags! {
    /// Which parts of a geometry string were present.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct GeometryFlags: u32 {
        const WIDTH      = 1 << 0;
        const HEIGHT     = 1 << 1;
        const X          = 1 << 2;
        const Y          = 1 << 3;
        const X_NEGATIVE = 1 << 4;
        const Y_NEGATIVE = 1 << 5;
        /// `%`: sizes are percentages of the image
        const PERCENT    = 1 << 6;
        /// `!`: exact size, ignore aspect ratio
        const ASPECT     = 1 << 7;
        /// `>`: only shrink
        const GREATER    = 1 << 8;
        /// `<`: only enlarge
        const LESS       = 1 << 9;
        /// `^`: cover instead of fit
        const MINIMUM    = 1 << 10;
        /// `@`: size is a pixel area
        const AREA       = 1 << 11;
    }
}

/// A resolved rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub x: i64,
    pub y: i64,
}

/// Geometry string after tokenizing, before it is applied to an image.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GeometrySpec {
    pub width: f64,
    pub height: f64,
    pub x: i64,
    pub y: i64,
    pub flags: GeometryFlags,
}

/// Tokenize a geometry string. Fails on stray characters or when neither a
/// size nor an offset is present.
pub fn parse(input: &str) -> EngineResult<GeometrySpec> {
    let invalid = || HandleError::invalid_geometry(input.to_string());

    let mut flags = GeometryFlags::empty();
    let mut body = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '%' => flags |= GeometryFlags::PERCENT,
            '!' => flags |= GeometryFlags::ASPECT,
            '>' => flags |= GeometryFlags::GREATER,
            '<' => flags |= GeometryFlags::LESS,
            '^' => flags |= GeometryFlags::MINIMUM,
            '@' => flags |= GeometryFlags::AREA,
            c if c.is_whitespace() => {}
            c => body.push(c),
        }
    }

    let mut spec = GeometrySpec::default();
    let mut rest = body.as_str();

    if let Some((value, tail)) = take_number(rest) {
        spec.width = value;
        flags |= GeometryFlags::WIDTH;
        rest = tail;
    }
    if let Some(tail) = rest.strip_prefix(|c: char| c == 'x' || c == 'X') {
        rest = tail;
        if let Some((value, tail)) = take_number(rest) {
            spec.height = value;
            flags |= GeometryFlags::HEIGHT;
            rest = tail;
        }
    }
    if let Some((value, negative, tail)) = take_offset(rest) {
        spec.x = value;
        flags |= GeometryFlags::X;
        if negative {
            flags |= GeometryFlags::X_NEGATIVE;
        }
        rest = tail;
        if let Some((value, negative, tail)) = take_offset(rest) {
            spec.y = value;
            flags |= GeometryFlags::Y;
            if negative {
                flags |= GeometryFlags::Y_NEGATIVE;
            }
            rest = tail;
        }
    }

    if !rest.is_empty() {
        return Err(invalid());
    }
    if !flags.intersects(
        GeometryFlags::WIDTH | GeometryFlags::HEIGHT | GeometryFlags::X | GeometryFlags::Y,
    ) {
        return Err(invalid());
    }

    spec.flags = flags;
    Ok(spec)
}

fn take_number(s: &str) -> Option<(f64, &str)> {
    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let value = s[..end].parse::<f64>().ok()?;
    Some((value, &s[end..]))
}

fn take_offset(s: &str) -> Option<(i64, bool, &str)> {
    let negative = match s.chars().next()? {
        '+' => false,
        '-' => true,
        _ => return None,
    };
    let digits = &s[1..];
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude = digits[..end].parse::<i64>().ok()?;
    let value = if negative { -magnitude } else { magnitude };
    Some((value, negative, &digits[end..]))
}

fn round_dim(v: f64) -> u32 {
    let r = (v + 0.5).floor();
    if r <= 0.0 {
        0
    } else if r >= u32::MAX as f64 {
        u32::MAX
    } else {
        r as u32
    }
}

impl GeometrySpec {
    /// Apply the region rules against an image of `image_width` x
    /// `image_height`.
    pub fn resolve(&self, image_width: u32, image_height: u32) -> Geometry {
        let flags = self.flags;
        let iw = image_width as f64;
        let ih = image_height as f64;
        let has_w = flags.contains(GeometryFlags::WIDTH);
        let has_h = flags.contains(GeometryFlags::HEIGHT);

        let mut geometry = Geometry {
            width: image_width,
            height: image_height,
            x: self.x,
            y: self.y,
        };
        if !has_w && !has_h {
            return geometry;
        }

        let (width, height) = if flags.contains(GeometryFlags::PERCENT) {
            let sx = if has_w { self.width } else { self.height };
            let sy = if has_h { self.height } else { sx };
            (round_dim(iw * sx / 100.0), round_dim(ih * sy / 100.0))
        } else if flags.contains(GeometryFlags::AREA) {
            let area = if has_w && has_h {
                self.width * self.height
            } else if has_w {
                self.width
            } else {
                self.height
            };
            let pixels = iw * ih;
            if pixels <= 0.0 {
                (0, 0)
            } else {
                let scale = (area / pixels).sqrt();
                (
                    round_dim(iw * scale).max(1),
                    round_dim(ih * scale).max(1),
                )
            }
        } else if flags.contains(GeometryFlags::ASPECT) {
            let w = if has_w { self.width } else { iw };
            let h = if has_h { self.height } else { ih };
            (round_dim(w), round_dim(h))
        } else {
            self.fit(iw, ih, has_w && self.width > 0.0, has_h && self.height > 0.0)
        };
        geometry.width = width;
        geometry.height = height;

        if flags.contains(GeometryFlags::GREATER) {
            geometry.width = geometry.width.min(image_width);
            geometry.height = geometry.height.min(image_height);
        }
        if flags.contains(GeometryFlags::LESS) {
            geometry.width = geometry.width.max(image_width);
            geometry.height = geometry.height.max(image_height);
        }
        geometry
    }

    /// Fit (or with `^`, cover) the requested box keeping the aspect ratio.
    fn fit(&self, iw: f64, ih: f64, has_w: bool, has_h: bool) -> (u32, u32) {
        if iw <= 0.0 || ih <= 0.0 {
            return (round_dim(self.width), round_dim(self.height));
        }
        let sx = self.width / iw;
        let sy = self.height / ih;
        let scale = match (has_w, has_h) {
            (true, true) if self.flags.contains(GeometryFlags::MINIMUM) => sx.max(sy),
            (true, true) => sx.min(sy),
            (true, false) => sx,
            (false, true) => sy,
            (false, false) => return (0, 0),
        };
        let width = if has_w && (scale == sx) {
            round_dim(self.width)
        } else {
            round_dim(iw * scale)
        };
        let height = if has_h && (scale == sy) {
            round_dim(self.height)
        } else {
            round_dim(ih * scale)
        };
        (width.max(1), height.max(1))
    }
}

/// Parse and resolve in one step.
pub fn parse_region(input: &str, image_width: u32, image_height: u32) -> EngineResult<Geometry> {
    Ok(parse(input)?.resolve(image_width, image_height))
}
