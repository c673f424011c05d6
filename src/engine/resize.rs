// src/engine/resize.rs
//
// Downscaling primitives shared by the max-width pre-pass and the
// resolution backoff loop. The pixel layout of the input is preserved.

use crate::engine::common::EngineResult;
use crate::error::ShrinkError;
use fast_image_resize::{self as fir, PixelType, ResizeOptions};
use image::imageops::FilterType;
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};

#[derive(Debug)]
pub struct ResizeError {
    pub source_dims: (u32, u32),
    pub target_dims: (u32, u32),
    pub reason: String,
}

impl ResizeError {
    pub fn new(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        reason: impl Into<String>,
    ) -> Self {
        Self {
            source_dims,
            target_dims,
            reason: reason.into(),
        }
    }
}

impl From<ResizeError> for ShrinkError {
    fn from(err: ResizeError) -> Self {
        ShrinkError::resize_failed(err.source_dims, err.target_dims, err.reason)
    }
}

fn default_resize_options() -> ResizeOptions {
    // fir premultiplies alpha internally for U8x2/U8x4
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3))
}

/// Dimensions after scaling by `factor`, floored, never below 1×1.
///
/// When flooring leaves the size unchanged, each side shrinks by exactly
/// one pixel instead (still floored at 1). A 1×1 input stays 1×1.
pub fn scaled_dimensions(width: u32, height: u32, factor: f64) -> (u32, u32) {
    let scale = |dim: u32| -> u32 {
        let scaled = (dim as f64 * factor).floor();
        if scaled.is_finite() && scaled >= 1.0 {
            (scaled as u32).min(dim)
        } else {
            1
        }
    };
    let (new_w, new_h) = (scale(width), scale(height));
    if (new_w, new_h) == (width, height) {
        (width.saturating_sub(1).max(1), height.saturating_sub(1).max(1))
    } else {
        (new_w, new_h)
    }
}

/// Target size for a width cap, or `None` when the image already fits.
///
/// Width becomes exactly `max_width`; height is `floor(h * max_width / w)`,
/// at least 1.
pub fn width_capped_dimensions(width: u32, height: u32, max_width: u32) -> Option<(u32, u32)> {
    if max_width == 0 || width <= max_width {
        return None;
    }
    let new_h = (height as u64 * max_width as u64 / width as u64).max(1);
    Some((max_width, new_h as u32))
}

/// Downscale by `factor` (see [`scaled_dimensions`]). Returns the input
/// unchanged when it is already 1×1.
pub fn scale_by_factor(img: DynamicImage, factor: f64) -> EngineResult<DynamicImage> {
    let (w, h) = (img.width(), img.height());
    let (new_w, new_h) = scaled_dimensions(w, h, factor);
    if (new_w, new_h) == (w, h) {
        return Ok(img);
    }
    Ok(fast_resize_owned(img, new_w, new_h)?)
}

/// Downscale so the width does not exceed `max_width`, keeping the aspect ratio.
pub fn fit_to_width(img: DynamicImage, max_width: u32) -> EngineResult<DynamicImage> {
    match width_capped_dimensions(img.width(), img.height(), max_width) {
        Some((new_w, new_h)) => Ok(fast_resize_owned(img, new_w, new_h)?),
        None => Ok(img),
    }
}

/// Lanczos3 resize with fast_image_resize, taking ownership of the pixel buffer.
///
/// 8-bit Luma/LumaA/RGB/RGBA are resized in place of their own layout.
/// Other layouts (16-bit, float) go through the image crate.
pub fn fast_resize_owned(
    img: DynamicImage,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<DynamicImage, ResizeError> {
    let src_width = img.width();
    let src_height = img.height();
    let dims_err = |reason: String| {
        ResizeError::new((src_width, src_height), (dst_width, dst_height), reason)
    };

    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return Err(dims_err("invalid dimensions for resize".to_string()));
    }

    // into_raw(): ownership transfer, no copy
    let (pixel_type, mut src_pixels): (PixelType, Vec<u8>) = match img {
        DynamicImage::ImageLuma8(gray) => (PixelType::U8, gray.into_raw()),
        DynamicImage::ImageLumaA8(gray_alpha) => (PixelType::U8x2, gray_alpha.into_raw()),
        DynamicImage::ImageRgb8(rgb) => (PixelType::U8x3, rgb.into_raw()),
        DynamicImage::ImageRgba8(rgba) => (PixelType::U8x4, rgba.into_raw()),
        other => {
            return Ok(other.resize_exact(dst_width, dst_height, FilterType::Lanczos3));
        }
    };

    let primary = resize_with_fir(
        src_width,
        src_height,
        &mut src_pixels,
        pixel_type,
        dst_width,
        dst_height,
    );

    match primary {
        Ok(resized) => Ok(resized),
        Err(err) => {
            tracing::debug!(%err, "fir resize failed, falling back to image crate");
            resize_with_image_crate_fallback(
                src_pixels,
                src_width,
                src_height,
                pixel_type,
                dst_width,
                dst_height,
            )
            .map_err(|fallback_err| {
                dims_err(format!("{err}; image crate fallback failed: {fallback_err}"))
            })
        }
    }
}

fn resize_with_fir(
    src_width: u32,
    src_height: u32,
    src_pixels: &mut [u8],
    pixel_type: PixelType,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<DynamicImage, String> {
    let src_image = fir::images::Image::from_slice_u8(src_width, src_height, src_pixels, pixel_type)
        .map_err(|e| format!("fir source image error: {e:?}"))?;
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, pixel_type);

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &default_resize_options())
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    wrap_pixels(dst_image.into_vec(), pixel_type, dst_width, dst_height)
}

fn resize_with_image_crate_fallback(
    src_pixels: Vec<u8>,
    src_width: u32,
    src_height: u32,
    pixel_type: PixelType,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<DynamicImage, String> {
    let src = wrap_pixels(src_pixels, pixel_type, src_width, src_height)?;
    Ok(src.resize_exact(dst_width, dst_height, FilterType::Lanczos3))
}

fn wrap_pixels(
    pixels: Vec<u8>,
    pixel_type: PixelType,
    width: u32,
    height: u32,
) -> std::result::Result<DynamicImage, String> {
    let wrapped = match pixel_type {
        PixelType::U8 => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        PixelType::U8x2 => {
            GrayAlphaImage::from_raw(width, height, pixels).map(DynamicImage::ImageLumaA8)
        }
        PixelType::U8x3 => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        PixelType::U8x4 => {
            RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8)
        }
        other => return Err(format!("unsupported pixel type {other:?}")),
    };
    wrapped.ok_or_else(|| format!("pixel buffer does not match {width}x{height} {pixel_type:?}"))
}
