// src/engine/backoff.rs
//
// Resolution backoff: when no quality fits at the current size, shrink the
// image and search again. Always produces a result.

use crate::engine::common::EngineResult;
use crate::engine::encoder::encode;
use crate::engine::resize::scale_by_factor;
use crate::engine::search::{search_quality, QualitySearch};
use crate::ops::{EncodeParams, OutputFormat, SearchBounds};
use image::DynamicImage;

/// Each pass shrinks by at least 5%...
pub const MAX_BACKOFF_FACTOR: f64 = 0.95;
/// ...and by at most half.
pub const MIN_BACKOFF_FACTOR: f64 = 0.5;
/// Aim slightly under the budget so the next pass is more likely to land.
const BACKOFF_SAFETY: f64 = 0.98;

/// Final result of a compression run: bytes plus what produced them.
///
/// Returned even when the budget was not met.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressOutcome {
    pub data: Vec<u8>,
    pub size_bytes: usize,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

impl CompressOutcome {
    pub(crate) fn new(data: Vec<u8>, img: &DynamicImage, quality: u8) -> Self {
        Self {
            size_bytes: data.len(),
            data,
            width: img.width(),
            height: img.height(),
            quality,
        }
    }

    /// Size in whole kilobytes (truncating).
    pub fn size_kb(&self) -> u64 {
        (self.size_bytes / 1024) as u64
    }

    pub fn fits(&self, budget: usize) -> bool {
        self.size_bytes <= budget
    }
}

/// `sqrt(budget / current) * 0.98`, clamped to `[0.5, 0.95]`.
pub fn backoff_factor(budget: usize, current: usize) -> f64 {
    if current == 0 {
        return MAX_BACKOFF_FACTOR;
    }
    let ratio = budget as f64 / current as f64;
    (ratio.sqrt() * BACKOFF_SAFETY).clamp(MIN_BACKOFF_FACTOR, MAX_BACKOFF_FACTOR)
}

/// Downscale `img` until an encoding fits `budget`, or `max_passes` runs out.
///
/// Measures the `quality_min` encoding at the current size first. On
/// exhaustion the last `quality_min` encoding is returned as-is, over budget
/// or not.
pub fn shrink_to_budget(
    img: DynamicImage,
    format: OutputFormat,
    budget: usize,
    bounds: &SearchBounds,
    params: &EncodeParams,
) -> EngineResult<CompressOutcome> {
    bounds.validate()?;
    let floor = encode(&img, format, bounds.quality_min, params)?;
    shrink_from_floor(img, format, budget, bounds, params, floor)
}

/// Backoff loop starting from an already-measured `quality_min` encoding.
pub(crate) fn shrink_from_floor(
    mut img: DynamicImage,
    format: OutputFormat,
    budget: usize,
    bounds: &SearchBounds,
    params: &EncodeParams,
    mut current: Vec<u8>,
) -> EngineResult<CompressOutcome> {
    let mut passes = 0u32;

    while current.len() > budget && passes < bounds.max_passes {
        if img.width() == 1 && img.height() == 1 {
            tracing::debug!(pass = passes, "image is 1x1, cannot shrink further");
            break;
        }
        let factor = backoff_factor(budget, current.len());
        img = scale_by_factor(img, factor)?;
        passes += 1;
        tracing::debug!(
            pass = passes,
            factor,
            width = img.width(),
            height = img.height(),
            previous_size = current.len(),
            budget,
            "resolution backoff"
        );

        match search_quality(&img, format, budget, bounds, params)? {
            QualitySearch::Fits { data, quality } => {
                return Ok(CompressOutcome::new(data, &img, quality));
            }
            QualitySearch::OverBudget { floor } => current = floor,
        }
    }

    Ok(CompressOutcome::new(current, &img, bounds.quality_min))
}
