#![no_main]

use libfuzzer_sys::fuzz_target;
use shrink_to_size::engine::{load_image, DecodeLimits};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Strict limits keep a forged header from allocating gigabytes
    let _ = load_image(data, &DecodeLimits::strict());
});
