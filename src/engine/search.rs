// src/engine/search.rs
//
// Binary search over encoder quality for the highest setting whose
// encoded size still fits the byte budget.

use crate::engine::common::EngineResult;
use crate::engine::encoder::encode;
use crate::ops::{EncodeParams, OutputFormat, SearchBounds};
use image::DynamicImage;

/// Outcome of one quality search at a fixed resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualitySearch {
    /// Highest quality seen that fits, with its encoding.
    Fits { data: Vec<u8>, quality: u8 },
    /// Even `quality_min` is over budget. `floor` is that encoding.
    OverBudget { floor: Vec<u8> },
}

impl QualitySearch {
    pub fn is_fit(&self) -> bool {
        matches!(self, QualitySearch::Fits { .. })
    }
}

/// Search `[quality_min, quality_max]` for the highest quality whose
/// encoding is at most `budget` bytes.
///
/// At most `max_iters` midpoint probes are made, stopping early once the
/// bounds cross. If none fit, `quality_min` is probed (or reused, when the
/// search already probed it) and reported as `OverBudget` if it too is over.
pub fn search_quality(
    img: &DynamicImage,
    format: OutputFormat,
    budget: usize,
    bounds: &SearchBounds,
    params: &EncodeParams,
) -> EngineResult<QualitySearch> {
    bounds.validate()?;
    let (quality_min, quality_max) = (bounds.quality_min, bounds.quality_max);

    if !format.accepts_quality() {
        let data = encode(img, format, quality_max, params)?;
        tracing::debug!(
            format = format.name(),
            size = data.len(),
            budget,
            "format ignores quality, single probe"
        );
        return Ok(if data.len() <= budget {
            QualitySearch::Fits {
                data,
                quality: quality_max,
            }
        } else {
            QualitySearch::OverBudget { floor: data }
        });
    }

    let mut lo = quality_min as i32;
    let mut hi = quality_max as i32;
    let mut best: Option<(Vec<u8>, u8)> = None;
    let mut floor_probe: Option<Vec<u8>> = None;

    for iteration in 0..bounds.max_iters {
        if lo > hi {
            break;
        }
        let mid = (lo + hi) / 2;
        let quality = mid as u8;
        let data = encode(img, format, quality, params)?;
        let size = data.len();
        let fits = size <= budget;
        tracing::debug!(
            iteration,
            quality,
            size,
            budget,
            fits,
            "quality probe"
        );

        if fits {
            best = Some((data, quality));
            lo = mid + 1;
        } else {
            if quality == quality_min {
                floor_probe = Some(data);
            }
            hi = mid - 1;
        }
    }

    if let Some((data, quality)) = best {
        return Ok(QualitySearch::Fits { data, quality });
    }

    let floor = match floor_probe {
        Some(data) => data,
        None => encode(img, format, quality_min, params)?,
    };
    if floor.len() <= budget {
        tracing::debug!(quality = quality_min, size = floor.len(), budget, "floor probe fits");
        Ok(QualitySearch::Fits {
            data: floor,
            quality: quality_min,
        })
    } else {
        tracing::debug!(quality = quality_min, size = floor.len(), budget, "floor probe over budget");
        Ok(QualitySearch::OverBudget { floor })
    }
}
