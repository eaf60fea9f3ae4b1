#![no_main]

use image_handle::engine::{self, Limits};
use image_handle::ImageHandle;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    engine::genesis_with(Limits {
        max_dimension: 4096,
        max_pixels: 4096 * 4096,
    });
    for hint in ["png", "jpg", "webp", "gif"] {
        let _ = ImageHandle::load_from_buffer(data, hint);
    }
});
