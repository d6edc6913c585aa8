use image::{Rgba, RgbaImage};
use imagoid::{
    parse_position, parse_size, AlphaOperator, AlphaStrategy, AlphaTransformation, ImageResource,
    ImagoidError, Raster, ResizeMode, ResizeTransformation, Transformation,
};
use proptest::prelude::*;

fn create_test_image(width: u32, height: u32) -> ImageResource {
    ImageResource::from_raster(Raster::from_rgba(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, ((x * 7 + y * 13) % 256) as u8])
    })))
}

fn resize_mode_strategy() -> impl Strategy<Value = ResizeMode> {
    prop_oneof![
        Just(ResizeMode::Fit),
        Just(ResizeMode::Fill),
        Just(ResizeMode::Crop),
        Just(ResizeMode::Stretch),
        Just(ResizeMode::Exact),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_percentage_round_trips_through_size_and_position(
        reference in 1i64..=4000,
        value in 0i64..=4000,
    ) {
        let value = value.min(reference);
        let percent = format!("{}%", value as f64 * 100.0 / reference as f64);
        prop_assert_eq!(parse_size(&percent, reference).unwrap(), value);
        prop_assert_eq!(parse_position(&percent, reference).unwrap(), value);
    }

    #[test]
    fn prop_to_truecolor_is_idempotent(
        width in 1u32..=32,
        height in 1u32..=32,
    ) {
        let mut image = create_test_image(width, height);
        let before = image.raster().unwrap().clone();
        image.to_truecolor().unwrap();
        prop_assert_eq!(image.raster().unwrap(), &before);
    }

    #[test]
    fn prop_fast_and_pixelwise_subtract_agree(
        width in 1u32..=48,
        height in 1u32..=48,
        amount in 0.0f64..=1.0,
    ) {
        let base = create_test_image(width, height);
        let mut fast = AlphaTransformation::from_parts(AlphaOperator::Subtract, amount, AlphaStrategy::Fast);
        let mut slow = fast.clone().with_strategy(AlphaStrategy::Pixelwise);
        let mut a = fast.apply_copy(&base).unwrap();
        let mut b = slow.apply_copy(&base).unwrap();

        for y in 0..height {
            for x in 0..width {
                let oa = a.pixel_at(x, y).unwrap().a();
                let ob = b.pixel_at(x, y).unwrap().a();
                prop_assert!((oa - ob).abs() <= 1.0 / 127.0);
            }
        }
    }

    #[test]
    fn prop_shrink_only_never_enlarges(
        orig_w in 1u32..=64,
        orig_h in 1u32..=64,
        target_w in 1u32..=128,
        target_h in 1u32..=128,
        mode in resize_mode_strategy(),
    ) {
        // Extreme aspect ratios may scale one side to zero pixels
        let plan = match ResizeTransformation::new(target_w, target_h, mode).plan(orig_w, orig_h) {
            Ok(plan) => plan,
            Err(err) => {
                let is_invalid_geometry = matches!(err, ImagoidError::InvalidGeometry { .. });
                prop_assert!(is_invalid_geometry);
                return Ok(());
            }
        };
        if mode == ResizeMode::Stretch {
            prop_assert_eq!(plan.canvas, (target_w, target_h));
        } else {
            prop_assert!(plan.scaled.0 <= orig_w);
            prop_assert!(plan.scaled.1 <= orig_h);
        }
        if matches!(plan.mode, ResizeMode::Crop | ResizeMode::Exact) {
            prop_assert_eq!(plan.canvas, (target_w, target_h));
        }
    }

    #[test]
    fn prop_resize_output_matches_plan(
        orig_w in 1u32..=48,
        orig_h in 1u32..=48,
        target_w in 1u32..=48,
        target_h in 1u32..=48,
        mode in resize_mode_strategy(),
    ) {
        let mut resize = ResizeTransformation::new(target_w, target_h, mode);
        let mut image = create_test_image(orig_w, orig_h);
        match resize.plan(orig_w, orig_h) {
            Ok(plan) => {
                resize.apply(&mut image).unwrap();
                prop_assert_eq!(image.dimensions().unwrap(), plan.canvas);
            }
            Err(_) => prop_assert!(resize.apply(&mut image).is_err()),
        }
    }

    #[test]
    fn prop_resize_signature_is_deterministic(
        width in 1u32..=2000,
        height in 1u32..=2000,
        mode in resize_mode_strategy(),
    ) {
        let a = ResizeTransformation::new(width, height, mode);
        let b = ResizeTransformation::new(width, height, mode);
        prop_assert_eq!(a.signature(), b.signature());
        let c = ResizeTransformation::new(width + 1, height, mode);
        prop_assert_ne!(a.signature(), c.signature());
    }
}
