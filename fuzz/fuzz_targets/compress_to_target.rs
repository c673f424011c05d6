#![no_main]

//! Fuzz target for the whole decode -> search -> backoff procedure.
//! The first byte picks the output format, the second the kilobyte target.

use libfuzzer_sys::fuzz_target;
use shrink_to_size::engine::DecodeLimits;
use shrink_to_size::{compress_to_target, CompressOptions, OutputFormat};

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    let format = match data[0] % 3 {
        0 => OutputFormat::Jpeg,
        1 => OutputFormat::WebP,
        _ => OutputFormat::Passthrough(image::ImageFormat::Png),
    };
    let options = CompressOptions::new(format, u64::from(data[1]))
        .with_limits(DecodeLimits::custom(Some(2048), Some(4_000_000)));

    if let Ok(outcome) = compress_to_target(&data[2..], &options) {
        assert_eq!(outcome.size_bytes, outcome.data.len());
        assert!(outcome.width >= 1 && outcome.height >= 1);
    }
});
