// src/engine/limits.rs
//
// Decode limits passed explicitly into the decode step.
// There is no process-wide pixel limit; each call carries its own.

use crate::error::ShrinkError;

/// Maximum allowed image dimension (width or height) under the strict preset.
/// This is the same limit used by libvips/sharp.
pub const STRICT_MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels under the strict preset.
/// 100 megapixels = 400MB uncompressed RGBA.
pub const STRICT_MAX_PIXELS: u64 = 100_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitPolicy {
    /// No dimension or pixel-count checks (decompression-bomb guard disabled)
    Unlimited,
    Strict,
    Custom,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeLimits {
    pub policy: LimitPolicy,
    pub max_dimension: Option<u32>,
    pub max_pixels: Option<u64>,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl DecodeLimits {
    pub fn unlimited() -> Self {
        Self {
            policy: LimitPolicy::Unlimited,
            max_dimension: None,
            max_pixels: None,
        }
    }

    pub fn strict() -> Self {
        Self {
            policy: LimitPolicy::Strict,
            max_dimension: Some(STRICT_MAX_DIMENSION),
            max_pixels: Some(STRICT_MAX_PIXELS),
        }
    }

    pub fn custom(max_dimension: Option<u32>, max_pixels: Option<u64>) -> Self {
        Self {
            policy: LimitPolicy::Custom,
            max_dimension,
            max_pixels,
        }
    }

    /// Reject images whose header dimensions exceed the configured limits.
    pub fn check_dimensions(&self, width: u32, height: u32) -> Result<(), ShrinkError> {
        let verdict = self.verdict(width, height);
        if let Err(err) = &verdict {
            tracing::warn!(policy = ?self.policy, width, height, %err, "input rejected by decode limits");
        }
        verdict
    }

    fn verdict(&self, width: u32, height: u32) -> Result<(), ShrinkError> {
        if let Some(max) = self.max_dimension {
            if width > max || height > max {
                return Err(ShrinkError::dimension_exceeds_limit(width.max(height), max));
            }
        }
        if let Some(max) = self.max_pixels {
            let pixels = width as u64 * height as u64;
            if pixels > max {
                return Err(ShrinkError::pixel_count_exceeds_limit(pixels, max));
            }
        }
        Ok(())
    }

    /// The same limits expressed for the image crate's reader.
    ///
    /// Only the per-side cap carries over; the image crate's default
    /// allocation cap is dropped so `unlimited()` means unlimited.
    pub fn to_image_limits(&self) -> image::Limits {
        let mut limits = image::Limits::no_limits();
        limits.max_image_width = self.max_dimension;
        limits.max_image_height = self.max_dimension;
        limits
    }
}
