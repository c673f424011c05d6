// src/engine/decoder.rs
//
// Decoder operations: JPEG (mozjpeg), PNG (zune-png), WebP (libwebp), everything else via the image crate.

use crate::engine::common::run_with_panic_policy;
use crate::engine::limits::DecodeLimits;
use crate::error::ShrinkError;
use image::{
    DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, ImageReader, RgbImage, RgbaImage,
};
use mozjpeg::Decompress;
use std::io::Cursor;
use webp::{BitstreamFeatures, Decoder as WebPDecoder};
use zune_core::bytestream::ZCursor;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_png::PngDecoder;

type DecoderResult<T> = std::result::Result<T, ShrinkError>;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const PNG_COLOR_TYPE_INDEXED: u8 = 3;

/// Decode JPEG using mozjpeg (backed by libjpeg-turbo)
pub fn decode_jpeg_mozjpeg(data: &[u8], limits: &DecodeLimits) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:mozjpeg", || {
        if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
            tracing::debug!("jpeg input has no EOI marker");
            return Err(ShrinkError::corrupted_image());
        }

        let decompress = Decompress::new_mem(data).map_err(|e| {
            ShrinkError::decode_failed(format!("mozjpeg decompress init failed: {e:?}"))
        })?;

        // Grayscale and CMYK sources are converted to RGB by libjpeg
        let mut decompress = decompress.rgb().map_err(|e| {
            ShrinkError::decode_failed(format!("mozjpeg rgb conversion failed: {e:?}"))
        })?;

        let width = u32::try_from(decompress.width())
            .map_err(|_| ShrinkError::decode_failed("mozjpeg: width out of range"))?;
        let height = u32::try_from(decompress.height())
            .map_err(|_| ShrinkError::decode_failed("mozjpeg: height out of range"))?;
        limits.check_dimensions(width, height)?;

        let pixels: Vec<[u8; 3]> = decompress.read_scanlines().map_err(|e| {
            ShrinkError::decode_failed(format!("mozjpeg: failed to read scanlines: {e:?}"))
        })?;
        let flat_pixels: Vec<u8> = pixels.into_iter().flatten().collect();

        let rgb_image = RgbImage::from_raw(width, height, flat_pixels).ok_or_else(|| {
            ShrinkError::decode_failed("mozjpeg: failed to create image from raw data")
        })?;

        Ok(DynamicImage::ImageRgb8(rgb_image))
    })
}

/// Decode formats without a dedicated fast path using the image crate.
///
/// The reader runs under `limits` only, never the image crate's own default
/// allocation cap.
pub fn decode_with_image_crate(data: &[u8], limits: &DecodeLimits) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:image", || {
        let mut reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| ShrinkError::decode_failed(format!("format detection failed: {e}")))?;
        reader.limits(limits.to_image_limits());
        reader
            .decode()
            .map_err(|e| ShrinkError::decode_failed(format!("decode failed: {e}")))
    })
}

/// Decode PNG using zune-png. 16bit input is stripped to 8bit.
pub fn decode_png_zune(data: &[u8], limits: &DecodeLimits) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:png", || {
        // IHDR is checked before the decoder exists, so no pixel buffer is allocated for a rejected header
        if let Some((width, height)) = png_header_dimensions(data) {
            limits.check_dimensions(width, height)?;
        }

        // zune's own 16384 cap is lifted; `limits` is the only size policy
        let options = DecoderOptions::default()
            .png_set_strip_to_8bit(true)
            .set_max_width(usize::MAX)
            .set_max_height(usize::MAX);
        let mut decoder = PngDecoder::new_with_options(ZCursor::new(data), options);
        decoder
            .decode_headers()
            .map_err(|e| ShrinkError::decode_failed(format!("png: header decode failed: {e}")))?;

        let info = decoder
            .info()
            .ok_or_else(|| ShrinkError::decode_failed("png: missing header info"))?;
        let width = u32::try_from(info.width)
            .map_err(|_| ShrinkError::decode_failed("png: width out of range"))?;
        let height = u32::try_from(info.height)
            .map_err(|_| ShrinkError::decode_failed("png: height out of range"))?;
        limits.check_dimensions(width, height)?;

        let pixels = decoder
            .decode()
            .map_err(|e| ShrinkError::decode_failed(format!("png: decode failed: {e}")))?;

        let buf = match pixels {
            zune_core::result::DecodingResult::U8(v) => v,
            _ => {
                return Err(ShrinkError::decode_failed(
                    "png: unexpected non-U8 pixel buffer",
                ))
            }
        };

        let colorspace = decoder
            .colorspace()
            .ok_or_else(|| ShrinkError::decode_failed("png: missing colorspace"))?;

        let img = match colorspace {
            ColorSpace::RGB => RgbImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| ShrinkError::decode_failed("png: failed to build RGB image"))?,
            ColorSpace::RGBA => RgbaImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageRgba8)
                .ok_or_else(|| ShrinkError::decode_failed("png: failed to build RGBA image"))?,
            ColorSpace::Luma => GrayImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| ShrinkError::decode_failed("png: failed to build Luma image"))?,
            ColorSpace::LumaA => GrayAlphaImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageLumaA8)
                .ok_or_else(|| ShrinkError::decode_failed("png: failed to build LumaA image"))?,
            other => {
                return Err(ShrinkError::decode_failed(format!(
                    "png: unsupported colorspace {other:?}"
                )))
            }
        };

        Ok(img)
    })
}

/// Decode WebP using libwebp. Animated files fall back to the image crate (first frame only).
pub fn decode_webp_libwebp(data: &[u8], limits: &DecodeLimits) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:webp", || {
        // Parse header first to avoid allocating huge buffers on malformed files
        let features = BitstreamFeatures::new(data).ok_or_else(|| {
            ShrinkError::decode_failed("webp: failed to read bitstream features")
        })?;

        limits.check_dimensions(features.width(), features.height())?;

        if features.has_animation() {
            return decode_with_image_crate(data, limits);
        }

        let decoded = WebPDecoder::new(data)
            .decode()
            .ok_or_else(|| ShrinkError::decode_failed("webp: decode failed"))?;

        Ok(decoded.to_image())
    })
}

/// Detect input format using magic bytes. Returns None if unknown.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Width and height declared by a PNG's IHDR chunk, read without decoding.
pub fn png_header_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.len() < 24 || bytes[..8] != PNG_SIGNATURE || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    Some((width, height))
}

/// True when the bytes are a PNG whose IHDR declares an indexed (palette) color type.
pub fn is_indexed_png(bytes: &[u8]) -> bool {
    // signature(8) + chunk length(4) + "IHDR"(4) + width(4) + height(4) + depth(1) + color type(1)
    bytes.len() > 25
        && bytes[..8] == PNG_SIGNATURE
        && &bytes[12..16] == b"IHDR"
        && bytes[25] == PNG_COLOR_TYPE_INDEXED
}

/// Inspect encoded bytes and ensure the image dimensions are within limits before decoding.
pub fn ensure_dimensions_safe(bytes: &[u8], limits: &DecodeLimits) -> DecoderResult<()> {
    if limits.max_dimension.is_none() && limits.max_pixels.is_none() {
        return Ok(());
    }
    let cursor = Cursor::new(bytes);
    if let Ok(reader) = ImageReader::new(cursor).with_guessed_format() {
        if let Ok((width, height)) = reader.into_dimensions() {
            return limits.check_dimensions(width, height);
        }
    }
    Ok(())
}

/// Unified decode entrypoint:
/// - Detect format once (magic bytes)
/// - Route JPEG to mozjpeg, PNG to zune-png, WebP to libwebp, others to the image crate
/// - Return decoded image and detected format
pub fn decode_image(
    bytes: &[u8],
    limits: &DecodeLimits,
) -> DecoderResult<(DynamicImage, Option<ImageFormat>)> {
    if bytes.is_empty() {
        return Err(ShrinkError::decode_failed("empty input"));
    }
    let detected = detect_format(bytes);
    let img = match detected {
        Some(ImageFormat::Jpeg) => decode_jpeg_mozjpeg(bytes, limits)?,
        Some(ImageFormat::Png) => decode_png_zune(bytes, limits)?,
        Some(ImageFormat::WebP) => decode_webp_libwebp(bytes, limits)?,
        Some(_) => {
            ensure_dimensions_safe(bytes, limits)?;
            decode_with_image_crate(bytes, limits)?
        }
        None => return Err(ShrinkError::unsupported_format("unrecognized image data")),
    };
    Ok((img, detected))
}

/// Decode and apply load-time conversions.
///
/// Palette-indexed sources become RGBA8 here, before any other stage sees
/// them, whatever the output format will be.
pub fn load_image(bytes: &[u8], limits: &DecodeLimits) -> DecoderResult<DynamicImage> {
    let (img, detected) = decode_image(bytes, limits)?;
    if detected == Some(ImageFormat::Png) && is_indexed_png(bytes) {
        return Ok(DynamicImage::ImageRgba8(img.to_rgba8()));
    }
    Ok(img)
}
