// src/engine/api.rs
//
// Public entry points: in-memory pixels, encoded bytes, and files.
// Each call is independent; all state lives on the stack of the call.

use crate::engine::backoff::{shrink_from_floor, CompressOutcome};
use crate::engine::common::EngineResult;
use crate::engine::decoder::load_image;
use crate::engine::io::{default_output_path, read_input, write_output};
use crate::engine::normalize::normalize_for_format;
use crate::engine::resize::fit_to_width;
use crate::engine::search::{search_quality, QualitySearch};
use crate::ops::{budget_bytes, CompressOptions, OutputFormat};
use image::DynamicImage;
use std::path::{Path, PathBuf};

/// What `compress_file` wrote and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressReport {
    pub output_path: PathBuf,
    pub size_bytes: usize,
    /// Truncated whole kilobytes
    pub size_kb: u64,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub target_kb: u64,
    pub format: OutputFormat,
}

impl CompressReport {
    /// Whether the written file is within `target_kb * 1024` bytes.
    pub fn fits_target(&self) -> bool {
        self.size_bytes <= budget_bytes(self.target_kb)
    }
}

/// Re-encode decoded pixels to fit the budget in `options`.
///
/// Normalize for the output format, optionally cap the width, search
/// quality, then fall back to resolution backoff. Never fails because the
/// budget is unattainable; check [`CompressOutcome::fits`] for that.
pub fn compress_image(img: DynamicImage, options: &CompressOptions) -> EngineResult<CompressOutcome> {
    options.validate()?;
    let budget = options.budget_bytes();
    let format = options.format.canonical();
    let bounds = &options.bounds;
    let params = &options.params;

    let (src_w, src_h) = (img.width(), img.height());
    let mut img = normalize_for_format(img, format);

    if let Some(max_width) = options.max_width {
        img = fit_to_width(img, max_width)?;
        if img.width() != src_w {
            tracing::debug!(
                max_width,
                width = img.width(),
                height = img.height(),
                "pre-downscaled to max width"
            );
        }
    }

    let outcome = match search_quality(&img, format, budget, bounds, params)? {
        QualitySearch::Fits { data, quality } => CompressOutcome::new(data, &img, quality),
        QualitySearch::OverBudget { floor } => {
            tracing::debug!(
                size = floor.len(),
                budget,
                "no quality fits at source resolution, backing off"
            );
            shrink_from_floor(img, format, budget, bounds, params, floor)?
        }
    };

    tracing::info!(
        format = format.name(),
        source_width = src_w,
        source_height = src_h,
        width = outcome.width,
        height = outcome.height,
        quality = outcome.quality,
        size = outcome.size_bytes,
        budget,
        "compressed"
    );
    if !outcome.fits(budget) {
        tracing::warn!(
            size = outcome.size_bytes,
            budget,
            "budget not met; returning smallest encoding found"
        );
    }

    Ok(outcome)
}

/// Decode `bytes` (JPEG, PNG, WebP, BMP, TIFF, ...) and compress the result.
pub fn compress_to_target(bytes: &[u8], options: &CompressOptions) -> EngineResult<CompressOutcome> {
    options.validate()?;
    let img = load_image(bytes, &options.limits)?;
    compress_image(img, options)
}

/// Read `input`, compress it, and write the result.
///
/// With no `output`, writes next to the input as `<stem>_compressed.<ext>`.
/// Parent directories of the output are created as needed.
pub fn compress_file(
    input: &Path,
    output: Option<&Path>,
    options: &CompressOptions,
) -> EngineResult<CompressReport> {
    options.validate()?;
    let bytes = read_input(input)?;
    let outcome = compress_to_target(&bytes, options)?;

    let output_path = match output {
        Some(path) => path.to_path_buf(),
        None => default_output_path(input, options.format),
    };
    write_output(&output_path, &outcome.data)?;

    Ok(CompressReport {
        size_kb: outcome.size_kb(),
        size_bytes: outcome.size_bytes,
        width: outcome.width,
        height: outcome.height,
        quality: outcome.quality,
        target_kb: options.target_kb,
        format: options.format,
        output_path,
    })
}
