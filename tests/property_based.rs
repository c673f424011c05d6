use image::{DynamicImage, RgbImage, RgbaImage};
use proptest::prelude::*;
use shrink_to_size::engine::{
    backoff_factor, encode, normalize_for_format, scaled_dimensions, search_quality,
    shrink_to_budget, width_capped_dimensions, QualitySearch,
};
use shrink_to_size::{EncodeParams, OutputFormat, SearchBounds};

fn create_test_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

fn create_noise_image(width: u32, height: u32, seed: u32) -> DynamicImage {
    let mut state = seed | 1;
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state & 0xFF) as u8
        };
        image::Rgb([next(), next(), next()])
    }))
}

fn valid_bounds_strategy() -> impl Strategy<Value = (u8, u8)> {
    (1u8..=100).prop_flat_map(|min| (Just(min), min..=100u8))
}

fn output_format_strategy() -> impl Strategy<Value = OutputFormat> {
    prop_oneof![
        Just(OutputFormat::Jpeg),
        Just(OutputFormat::WebP),
        Just(OutputFormat::Passthrough(image::ImageFormat::Png)),
        Just(OutputFormat::Passthrough(image::ImageFormat::Bmp)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn search_quality_stays_within_bounds(
        (quality_min, quality_max) in valid_bounds_strategy(),
        budget in 200usize..20_000,
        w in 8u32..64,
        h in 8u32..64,
    ) {
        let img = create_test_image(w, h);
        let bounds = SearchBounds::new(quality_min, quality_max);
        let result = search_quality(&img, OutputFormat::Jpeg, budget, &bounds, &EncodeParams::default());
        match result {
            Ok(QualitySearch::Fits { data, quality }) => {
                prop_assert!(quality >= quality_min && quality <= quality_max);
                prop_assert!(data.len() <= budget);
            }
            Ok(QualitySearch::OverBudget { floor }) => {
                prop_assert!(floor.len() > budget);
            }
            Err(e) => prop_assert!(false, "search failed: {e}"),
        }
    }

    #[test]
    fn scaled_dimensions_never_zero_never_grow(
        w in 1u32..10_000,
        h in 1u32..10_000,
        factor in 0.0f64..=1.5,
    ) {
        let (new_w, new_h) = scaled_dimensions(w, h, factor);
        prop_assert!(new_w >= 1 && new_h >= 1);
        prop_assert!(new_w <= w && new_h <= h);
        if (w, h) != (1, 1) {
            prop_assert!((new_w, new_h) != (w, h));
        }
    }

    #[test]
    fn width_cap_respected(
        w in 1u32..10_000,
        h in 1u32..10_000,
        max_width in 1u32..5_000,
    ) {
        match width_capped_dimensions(w, h, max_width) {
            Some((new_w, new_h)) => {
                prop_assert_eq!(new_w, max_width);
                prop_assert!(new_h >= 1 && new_h <= h);
                prop_assert_eq!(new_h as u64, (h as u64 * max_width as u64 / w as u64).max(1));
            }
            None => prop_assert!(w <= max_width),
        }
    }

    #[test]
    fn backoff_factor_is_clamped(budget in 0usize..10_000_000, current in 1usize..10_000_000) {
        let f = backoff_factor(budget, current);
        prop_assert!((0.5..=0.95).contains(&f));
    }

    #[test]
    fn normalize_is_idempotent(
        w in 1u32..16,
        h in 1u32..16,
        alpha in any::<u8>(),
        format in output_format_strategy(),
    ) {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(w, h, |x, y| {
            image::Rgba([(x * 16) as u8, (y * 16) as u8, 77, alpha])
        }));
        let once = normalize_for_format(img, format);
        let twice = normalize_for_format(once.clone(), format);
        prop_assert_eq!(once.color(), twice.color());
        prop_assert_eq!(once.as_bytes(), twice.as_bytes());
    }

    #[test]
    fn backoff_terminates_with_consistent_sizes(
        w in 2u32..96,
        h in 2u32..96,
        budget in 0usize..4_000,
        max_passes in 0u32..8,
    ) {
        let img = create_noise_image(w, h, w * 31 + h);
        let bounds = SearchBounds { max_passes, ..SearchBounds::default() };
        let outcome = shrink_to_budget(img, OutputFormat::Jpeg, budget, &bounds, &EncodeParams::default())
            .expect("backoff never fails on valid input");
        prop_assert!(!outcome.data.is_empty());
        prop_assert_eq!(outcome.size_bytes, outcome.data.len());
        prop_assert_eq!(outcome.size_kb(), (outcome.size_bytes / 1024) as u64);
        prop_assert!(outcome.width >= 1 && outcome.width <= w);
        prop_assert!(outcome.height >= 1 && outcome.height <= h);
    }
}

fn lossy_format_strategy() -> impl Strategy<Value = OutputFormat> {
    prop_oneof![Just(OutputFormat::Jpeg), Just(OutputFormat::WebP)]
}

// Encoded size grows with quality for both lossy encoders. Qualities are kept
// well apart: adjacent steps can tie or dip on small inputs.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn encoded_size_grows_with_quality(
        format in lossy_format_strategy(),
        seed in any::<u32>(),
        w in 48u32..128,
        h in 48u32..128,
        q1 in 5u8..=45,
        gap in 30u8..=50,
    ) {
        let q2 = q1 + gap;
        let img = create_noise_image(w, h, seed);
        let params = EncodeParams::default();
        let low = encode(&img, format, q1, &params).unwrap();
        let high = encode(&img, format, q2, &params).unwrap();
        prop_assert!(
            low.len() < high.len(),
            "{} encoder not monotone on {}x{} noise (seed {}): q{} -> {} bytes, q{} -> {} bytes",
            format.name(), w, h, seed, q1, low.len(), q2, high.len()
        );
    }
}
