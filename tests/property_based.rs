// tests/property_based.rs
//
// Property tests over geometry, color parsing and the handle contract.

mod common;

use common::gradient_png;
use image_handle::engine::{self, color, geometry, Limits};
use image_handle::ImageHandle;
use proptest::prelude::*;

fn load(width: u32, height: u32) -> ImageHandle {
    engine::genesis_with(Limits::default());
    ImageHandle::load_from_buffer(&gradient_png(width, height), "png").unwrap()
}

fn valid_crop_strategy() -> impl Strategy<Value = (u32, u32, u32, u32, u32, u32)> {
    (1u32..=48, 1u32..=48)
        .prop_flat_map(|(img_w, img_h)| {
            let crop_w = 1u32..=img_w;
            let crop_h = 1u32..=img_h;
            (Just(img_w), Just(img_h), crop_w, crop_h)
        })
        .prop_flat_map(|(img_w, img_h, crop_w, crop_h)| {
            let max_x = img_w - crop_w;
            let max_y = img_h - crop_h;
            (
                Just(img_w),
                Just(img_h),
                Just(crop_w),
                Just(crop_h),
                0u32..=max_x,
                0u32..=max_y,
            )
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_resize_ratio_scales_quadratically(
        img_w in 1u32..=64,
        img_h in 1u32..=64,
        w in 1u32..=2048,
        h in 1u32..=2048,
    ) {
        let handle = load(img_w, img_h);
        let single = handle.resize_ratio(w, h);
        let double = handle.resize_ratio(2 * w, 2 * h);
        prop_assert!((double - 4.0 * single).abs() <= 1e-9 * double.max(1.0));
    }

    #[test]
    fn prop_exact_resize_dimensions(
        img_w in 1u32..=48,
        img_h in 1u32..=48,
        w in 1u32..=96,
        h in 1u32..=96,
    ) {
        let mut handle = load(img_w, img_h);
        handle.resize(&format!("{w}x{h}!")).unwrap();
        prop_assert_eq!((handle.width(), handle.height()), (w, h));
        prop_assert_eq!(handle.virtual_canvas_width(), w);
    }

    #[test]
    fn prop_exact_crop_dimensions((img_w, img_h, crop_w, crop_h, x, y) in valid_crop_strategy()) {
        let mut handle = load(img_w, img_h);
        handle.crop(&format!("{crop_w}x{crop_h}!+{x}+{y}")).unwrap();
        prop_assert_eq!((handle.width(), handle.height()), (crop_w, crop_h));
        prop_assert_eq!(handle.virtual_canvas_width(), img_w);
        prop_assert_eq!(handle.virtual_canvas_height(), img_h);
        handle.plus_repage().unwrap();
        prop_assert_eq!(handle.virtual_canvas_width(), 0);
    }

    #[test]
    fn prop_property_set_then_get(name in "[a-z]{1,8}:[a-z]{1,8}", value in ".{0,32}") {
        prop_assume!(!name.starts_with("exif:") && name != "webp:lossless");
        let mut handle = load(2, 2);
        handle.set_property(&name, &value).unwrap();
        prop_assert_eq!(handle.get_property(&name), Some(value));
    }

    #[test]
    fn prop_fit_stays_inside_box(
        img_w in 1u32..=4096,
        img_h in 1u32..=4096,
        w in 1u32..=4096,
        h in 1u32..=4096,
    ) {
        let g = geometry::parse_region(&format!("{w}x{h}"), img_w, img_h).unwrap();
        prop_assert!(g.width >= 1 && g.height >= 1);
        prop_assert!(g.width <= w && g.height <= h);
        prop_assert!(g.width == w || g.height == h);
    }

    #[test]
    fn prop_geometry_parse_never_panics(s in "\\PC{0,24}") {
        let _ = geometry::parse(&s);
    }

    #[test]
    fn prop_color_parse_never_panics(s in "\\PC{0,24}") {
        let _ = color::parse_color(&s);
    }

    #[test]
    fn prop_hex_colors_round_trip(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
        let parsed = color::parse_color(&format!("#{r:02x}{g:02x}{b:02x}")).unwrap();
        prop_assert_eq!(parsed.0, [r, g, b, 255]);
    }
}
