// src/engine.rs
//
// The size-constrained re-encoding engine:
// 1. Decode (with explicit limits) and normalize the pixel format once
// 2. Binary-search encoder quality against the byte budget
// 3. If nothing fits, shrink the resolution and search again
//
// This file is a facade over the modules in engine/

mod api;
mod backoff;
mod common;
mod decoder;
mod encoder;
mod io;
mod limits;
mod normalize;
mod resize;
mod search;

pub use api::{compress_file, compress_image, compress_to_target, CompressReport};
pub use backoff::{
    backoff_factor, shrink_to_budget, CompressOutcome, MAX_BACKOFF_FACTOR, MIN_BACKOFF_FACTOR,
};
pub use common::{run_with_panic_policy, EngineResult};
pub use decoder::{decode_image, detect_format, is_indexed_png, load_image};
pub use encoder::{
    encode, encode_jpeg, encode_png, encode_webp, encode_with_settings, FormatSettings,
    JpegSettings, PngSettings, WebpSettings,
};
pub use io::{default_output_path, read_input, write_output};
pub use limits::{DecodeLimits, LimitPolicy, STRICT_MAX_DIMENSION, STRICT_MAX_PIXELS};
pub use normalize::normalize_for_format;
pub use resize::{
    fast_resize_owned, fit_to_width, scale_by_factor, scaled_dimensions,
    width_capped_dimensions, ResizeError,
};
pub use search::{search_quality, QualitySearch};
