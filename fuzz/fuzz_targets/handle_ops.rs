#![no_main]

use arbitrary::Arbitrary;
use image_handle::engine::{self, Limits};
use image_handle::ImageHandle;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Op {
    Resize { w: u16, h: u16, exact: bool },
    Crop { w: u16, h: u16, x: i16, y: i16 },
    Repage,
    Shadow { opacity: u8, sigma: u8, x: i8, y: i8 },
    Fill { r: u8, g: u8, b: u8, a: u8 },
    SeparateAlpha,
    Negate,
    Strip,
    AutoOrient,
    Quality(i32),
    Progressive,
}

#[derive(Arbitrary, Debug)]
struct Input {
    width: u8,
    height: u8,
    ops: Vec<Op>,
    ext: u8,
}

fn seed_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([x as u8, y as u8, (x ^ y) as u8, if (x + y) % 3 == 0 { 0 } else { 255 }])
    }));
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fuzz_target!(|input: Input| {
    engine::genesis_with(Limits {
        max_dimension: 2048,
        max_pixels: 1 << 20,
    });
    let width = u32::from(input.width % 64) + 1;
    let height = u32::from(input.height % 64) + 1;
    let Ok(mut handle) = ImageHandle::load_from_buffer(&seed_png(width, height), "png") else {
        return;
    };

    for op in input.ops.into_iter().take(12) {
        let before = (handle.width(), handle.height());
        let result = match op {
            Op::Resize { w, h, exact } => {
                let bang = if exact { "!" } else { "" };
                handle.resize(&format!("{}x{}{bang}", w % 512, h % 512))
            }
            Op::Crop { w, h, x, y } => handle.crop(&format!("{w}x{h}{x:+}{y:+}")),
            Op::Repage => handle.plus_repage(),
            Op::Shadow { opacity, sigma, x, y } => handle.shadow(
                "black",
                f32::from(opacity % 101),
                f32::from(sigma % 8),
                i64::from(x),
                i64::from(y),
            ),
            Op::Fill { r, g, b, a } => {
                handle.fill_background_color(&format!("#{r:02x}{g:02x}{b:02x}{a:02x}"))
            }
            Op::SeparateAlpha => handle.separate_alpha_channel(),
            Op::Negate => handle.negate(),
            Op::Strip => handle.strip(),
            Op::AutoOrient => handle.auto_orient(),
            Op::Quality(q) => handle.set_quality(q),
            Op::Progressive => handle.progressive(),
        };
        if result.is_err() {
            assert_eq!(before, (handle.width(), handle.height()));
        }
    }

    let ext = ["png", "jpg", "webp", "bmp", "gif"][usize::from(input.ext) % 5];
    let _ = handle.to_blob(ext);
    handle.destroy();
});
