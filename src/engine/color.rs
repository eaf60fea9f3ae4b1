// src/engine/color.rs
//
// Color strings for shadow and background fill.
// Named colors, hex forms, rgb()/rgba() and gray().

use crate::error::HandleError;
use image::Rgba;

use super::common::EngineResult;

// (name, r, g, b, a)
const NAMED_COLORS: &[(&str, u8, u8, u8, u8)] = &[
    ("none", 0, 0, 0, 0),
    ("transparent", 0, 0, 0, 0),
    ("black", 0, 0, 0, 255),
    ("white", 255, 255, 255, 255),
    ("red", 255, 0, 0, 255),
    ("green", 0, 128, 0, 255),
    ("lime", 0, 255, 0, 255),
    ("blue", 0, 0, 255, 255),
    ("yellow", 255, 255, 0, 255),
    ("cyan", 0, 255, 255, 255),
    ("aqua", 0, 255, 255, 255),
    ("magenta", 255, 0, 255, 255),
    ("fuchsia", 255, 0, 255, 255),
    ("gray", 128, 128, 128, 255),
    ("grey", 128, 128, 128, 255),
    ("silver", 192, 192, 192, 255),
    ("maroon", 128, 0, 0, 255),
    ("olive", 128, 128, 0, 255),
    ("purple", 128, 0, 128, 255),
    ("teal", 0, 128, 128, 255),
    ("navy", 0, 0, 128, 255),
    ("orange", 255, 165, 0, 255),
    ("pink", 255, 192, 203, 255),
    ("brown", 165, 42, 42, 255),
    ("gold", 255, 215, 0, 255),
    ("indigo", 75, 0, 130, 255),
    ("violet", 238, 130, 238, 255),
    ("beige", 245, 245, 220, 255),
    ("ivory", 255, 255, 240, 255),
    ("khaki", 240, 230, 140, 255),
    ("coral", 255, 127, 80, 255),
    ("salmon", 250, 128, 114, 255),
    ("tomato", 255, 99, 71, 255),
    ("crimson", 220, 20, 60, 255),
    ("chocolate", 210, 105, 30, 255),
    ("tan", 210, 180, 140, 255),
    ("lightgray", 211, 211, 211, 255),
    ("lightgrey", 211, 211, 211, 255),
    ("darkgray", 169, 169, 169, 255),
    ("darkgrey", 169, 169, 169, 255),
    ("dimgray", 105, 105, 105, 255),
    ("whitesmoke", 245, 245, 245, 255),
    ("skyblue", 135, 206, 235, 255),
    ("steelblue", 70, 130, 180, 255),
    ("royalblue", 65, 105, 225, 255),
    ("darkblue", 0, 0, 139, 255),
    ("darkgreen", 0, 100, 0, 255),
    ("darkred", 139, 0, 0, 255),
    ("turquoise", 64, 224, 208, 255),
];

/// Parse a color string into RGBA8.
pub fn parse_color(input: &str) -> EngineResult<Rgba<u8>> {
    let unrecognized = || HandleError::unrecognized_color(input.to_string());
    let s = input.trim().to_ascii_lowercase();
    if s.is_empty() {
        return Err(unrecognized());
    }

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(unrecognized);
    }
    if let Some(args) = function_args(&s, "rgba") {
        return parse_rgb(&args, true).ok_or_else(unrecognized);
    }
    if let Some(args) = function_args(&s, "rgb") {
        return parse_rgb(&args, false).ok_or_else(unrecognized);
    }
    if let Some(args) = function_args(&s, "gray").or_else(|| function_args(&s, "grey")) {
        if args.len() != 1 {
            return Err(unrecognized());
        }
        let v = channel(args[0]).ok_or_else(unrecognized)?;
        return Ok(Rgba([v, v, v, 255]));
    }

    NAMED_COLORS
        .iter()
        .find(|(name, ..)| *name == s)
        .map(|&(_, r, g, b, a)| Rgba([r, g, b, a]))
        .ok_or_else(unrecognized)
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, 255])),
        4 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?])),
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

fn function_args<'a>(s: &'a str, name: &str) -> Option<Vec<&'a str>> {
    let inner = s.strip_prefix(name)?.trim_start().strip_prefix('(')?.strip_suffix(')')?;
    Some(inner.split(',').map(str::trim).collect())
}

/// A 0-255 channel, or a percentage.
fn channel(s: &str) -> Option<u8> {
    if let Some(pct) = s.strip_suffix('%') {
        let v: f64 = pct.trim().parse().ok()?;
        if !(0.0..=100.0).contains(&v) {
            return None;
        }
        return Some((v * 255.0 / 100.0).round() as u8);
    }
    let v: f64 = s.parse().ok()?;
    if !(0.0..=255.0).contains(&v) {
        return None;
    }
    Some(v.round() as u8)
}

fn parse_rgb(args: &[&str], with_alpha: bool) -> Option<Rgba<u8>> {
    let expected = if with_alpha { 4 } else { 3 };
    if args.len() != expected {
        return None;
    }
    let alpha = if with_alpha {
        let a: f64 = args[3].parse().ok()?;
        if !(0.0..=1.0).contains(&a) {
            return None;
        }
        (a * 255.0).round() as u8
    } else {
        255
    };
    Some(Rgba([channel(args[0])?, channel(args[1])?, channel(args[2])?, alpha]))
}
