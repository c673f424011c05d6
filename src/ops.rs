// src/ops.rs
//
// Plain-data configuration for a compression run.
// These are cheap to create, clone and share across threads - the expensive work
// happens in engine::compress_image().

use crate::engine::DecodeLimits;
use crate::error::{Result, ShrinkError};
use image::ImageFormat;
use std::str::FromStr;

/// Default target size in kilobytes.
pub const DEFAULT_TARGET_KB: u64 = 70;
/// Default lower quality bound.
pub const DEFAULT_QUALITY_MIN: u8 = 5;
/// Default upper quality bound.
pub const DEFAULT_QUALITY_MAX: u8 = 95;
/// Default cap on binary-search probes per resolution.
pub const DEFAULT_MAX_ITERS: u32 = 8;
/// Default cap on resolution backoff passes.
pub const DEFAULT_MAX_PASSES: u32 = 6;

/// Output encoding target.
///
/// The set is closed: JPEG and WebP get tuned encoders, everything else is
/// written by the image crate as-is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Jpeg,
    WebP,
    /// Any other format the image crate can write (PNG is additionally run through oxipng)
    Passthrough(ImageFormat),
}

impl OutputFormat {
    /// Map an image crate format onto the closed output set.
    pub fn from_image_format(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => Self::Jpeg,
            ImageFormat::WebP => Self::WebP,
            other => Self::Passthrough(other),
        }
    }

    /// `Passthrough(Jpeg)` and `Passthrough(WebP)` resolve to the tuned variants.
    pub fn canonical(self) -> Self {
        match self {
            Self::Passthrough(format) => Self::from_image_format(format),
            other => other,
        }
    }

    /// Short lowercase name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self.canonical() {
            Self::Jpeg => "jpeg",
            Self::WebP => "webp",
            Self::Passthrough(_) => self.extension(),
        }
    }

    /// Canonical file extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self.canonical() {
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
            Self::Passthrough(format) => format.extensions_str().first().copied().unwrap_or("bin"),
        }
    }

    /// Whether the encoder behind this format takes a quality value at all.
    /// When it does not, the quality search has nothing to search.
    pub fn accepts_quality(&self) -> bool {
        matches!(self.canonical(), Self::Jpeg | Self::WebP)
    }
}

impl FromStr for OutputFormat {
    type Err = ShrinkError;

    fn from_str(name: &str) -> Result<Self> {
        let lowered = name.trim().trim_start_matches('.').to_lowercase();
        match lowered.as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::WebP),
            other => ImageFormat::from_extension(other)
                .map(Self::from_image_format)
                .ok_or_else(|| ShrinkError::unsupported_format(other.to_string())),
        }
    }
}

/// Caller overrides for the per-format encoder defaults.
///
/// `None` means "use the default from the format table". The quality value
/// itself is never overridable here: it is what the search varies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodeParams {
    /// JPEG: optimized Huffman tables (default on)
    pub optimize_coding: Option<bool>,
    /// JPEG: progressive scan ordering (default on)
    pub progressive: Option<bool>,
    /// WebP: compression method 0 (fast) ..= 6 (slowest/best, default)
    pub webp_method: Option<u8>,
    /// WebP: lossless mode (default off)
    pub lossless: Option<bool>,
    /// PNG: oxipng preset 0 ..= 6 (default 2)
    pub png_level: Option<u8>,
}

impl EncodeParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_optimize_coding(mut self, enabled: bool) -> Self {
        self.optimize_coding = Some(enabled);
        self
    }

    pub fn with_progressive(mut self, enabled: bool) -> Self {
        self.progressive = Some(enabled);
        self
    }

    pub fn with_webp_method(mut self, method: u8) -> Self {
        self.webp_method = Some(method);
        self
    }

    pub fn with_lossless(mut self, enabled: bool) -> Self {
        self.lossless = Some(enabled);
        self
    }

    pub fn with_png_level(mut self, level: u8) -> Self {
        self.png_level = Some(level);
        self
    }
}

/// Quality bounds and iteration caps for the search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchBounds {
    pub quality_min: u8,
    pub quality_max: u8,
    /// Binary-search probes per resolution
    pub max_iters: u32,
    /// Resolution backoff passes after the first search fails
    pub max_passes: u32,
}

impl Default for SearchBounds {
    fn default() -> Self {
        Self {
            quality_min: DEFAULT_QUALITY_MIN,
            quality_max: DEFAULT_QUALITY_MAX,
            max_iters: DEFAULT_MAX_ITERS,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl SearchBounds {
    pub fn new(quality_min: u8, quality_max: u8) -> Self {
        Self {
            quality_min,
            quality_max,
            ..Self::default()
        }
    }

    /// Enforce `1 <= quality_min <= quality_max <= 100`.
    pub fn validate(&self) -> Result<()> {
        if self.quality_min == 0 {
            return Err(ShrinkError::invalid_argument(
                "quality_min",
                self.quality_min.to_string(),
                "must be at least 1",
            ));
        }
        if self.quality_max > 100 {
            return Err(ShrinkError::invalid_argument(
                "quality_max",
                self.quality_max.to_string(),
                "must be at most 100",
            ));
        }
        if self.quality_min > self.quality_max {
            return Err(ShrinkError::invalid_argument(
                "quality_min",
                self.quality_min.to_string(),
                format!("must not exceed quality_max ({})", self.quality_max),
            ));
        }
        Ok(())
    }
}

/// Everything a compression run needs, with the documented defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressOptions {
    pub format: OutputFormat,
    pub target_kb: u64,
    /// Pre-downscale so the width does not exceed this before searching
    pub max_width: Option<u32>,
    pub bounds: SearchBounds,
    pub params: EncodeParams,
    pub limits: DecodeLimits,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            target_kb: DEFAULT_TARGET_KB,
            max_width: None,
            bounds: SearchBounds::default(),
            params: EncodeParams::default(),
            limits: DecodeLimits::unlimited(),
        }
    }
}

impl CompressOptions {
    pub fn new(format: OutputFormat, target_kb: u64) -> Self {
        Self {
            format,
            target_kb,
            ..Self::default()
        }
    }

    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = Some(max_width);
        self
    }

    pub fn with_quality_range(mut self, quality_min: u8, quality_max: u8) -> Self {
        self.bounds.quality_min = quality_min;
        self.bounds.quality_max = quality_max;
        self
    }

    pub fn with_bounds(mut self, bounds: SearchBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_params(mut self, params: EncodeParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Byte budget derived from the kilobyte target (`target_kb * 1024`).
    pub fn budget_bytes(&self) -> usize {
        budget_bytes(self.target_kb)
    }

    pub fn validate(&self) -> Result<()> {
        self.bounds.validate()?;
        if self.max_width == Some(0) {
            return Err(ShrinkError::invalid_argument(
                "max_width",
                "0",
                "must be a positive pixel count",
            ));
        }
        Ok(())
    }
}

/// Convert a kilobyte target into a byte budget, saturating on overflow.
pub fn budget_bytes(target_kb: u64) -> usize {
    usize::try_from(target_kb.saturating_mul(1024)).unwrap_or(usize::MAX)
}
