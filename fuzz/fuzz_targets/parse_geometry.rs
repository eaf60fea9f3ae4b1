#![no_main]

use image_handle::engine::{color, geometry};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(spec) = geometry::parse(s) {
        let _ = spec.resolve(640, 480);
        let _ = spec.resolve(1, 1);
    }
    let _ = color::parse_color(s);
});
