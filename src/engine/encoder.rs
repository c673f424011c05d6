// src/engine/encoder.rs
//
// Encode-and-measure: JPEG (mozjpeg), WebP (libwebp), PNG (image + oxipng),
// and any other format the image crate can write.

use crate::engine::common::run_with_panic_policy;
use crate::error::ShrinkError;
use crate::ops::{EncodeParams, OutputFormat};
use image::{DynamicImage, GenericImageView, ImageFormat};
use mozjpeg::{ColorSpace, Compress};
use std::borrow::Cow;
use std::io::Cursor;

type EncoderResult<T> = std::result::Result<T, ShrinkError>;

/// Largest width/height a baseline or progressive JPEG can declare.
const JPEG_MAX_DIMENSION: u32 = 65_535;

/// Per-format encoder settings with their defaults.
///
/// This is the single table the encoder reads from: defaults live here,
/// caller overrides are merged in `FormatSettings::resolve`, and nothing else
/// branches on format-specific knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegSettings {
    pub quality: u8,
    pub optimize_coding: bool,
    pub progressive: bool,
}

impl JpegSettings {
    pub const DEFAULT: Self = Self {
        quality: 85,
        optimize_coding: true,
        progressive: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebpSettings {
    pub quality: u8,
    /// 0 (fast) ..= 6 (slowest, smallest)
    pub method: u8,
    pub lossless: bool,
}

impl WebpSettings {
    pub const DEFAULT: Self = Self {
        quality: 85,
        method: 6,
        lossless: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngSettings {
    /// oxipng preset 0 ..= 6
    pub level: u8,
}

impl PngSettings {
    pub const DEFAULT: Self = Self { level: 2 };
    pub const MAX_LEVEL: u8 = 6;
}

/// Fully resolved encoder configuration for one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSettings {
    Jpeg(JpegSettings),
    WebP(WebpSettings),
    Png(PngSettings),
    /// Written by the image crate; quality is not applicable
    Other(ImageFormat),
}

impl FormatSettings {
    /// Look up the defaults for `format`, apply `quality`, then apply caller overrides.
    pub fn resolve(format: OutputFormat, quality: u8, params: &EncodeParams) -> Self {
        let quality = quality.min(100);
        match format.canonical() {
            OutputFormat::Jpeg => {
                let defaults = JpegSettings::DEFAULT;
                Self::Jpeg(JpegSettings {
                    quality,
                    optimize_coding: params.optimize_coding.unwrap_or(defaults.optimize_coding),
                    progressive: params.progressive.unwrap_or(defaults.progressive),
                })
            }
            OutputFormat::WebP => {
                let defaults = WebpSettings::DEFAULT;
                Self::WebP(WebpSettings {
                    quality,
                    method: params.webp_method.unwrap_or(defaults.method),
                    lossless: params.lossless.unwrap_or(defaults.lossless),
                })
            }
            OutputFormat::Passthrough(ImageFormat::Png) => Self::Png(PngSettings {
                level: params.png_level.unwrap_or(PngSettings::DEFAULT.level),
            }),
            OutputFormat::Passthrough(other) => Self::Other(other),
        }
    }
}

/// Encode `img` as `format` at `quality` and return the encoded bytes.
///
/// The length of the returned buffer is the measurement the search uses.
/// Quality is ignored by formats whose encoder has no quality parameter.
pub fn encode(
    img: &DynamicImage,
    format: OutputFormat,
    quality: u8,
    params: &EncodeParams,
) -> EncoderResult<Vec<u8>> {
    encode_with_settings(img, FormatSettings::resolve(format, quality, params))
}

pub fn encode_with_settings(img: &DynamicImage, settings: FormatSettings) -> EncoderResult<Vec<u8>> {
    match settings {
        FormatSettings::Jpeg(jpeg) => encode_jpeg(img, &jpeg),
        FormatSettings::WebP(webp) => encode_webp(img, &webp),
        FormatSettings::Png(png) => encode_png(img, &png),
        FormatSettings::Other(format) => encode_with_image_crate(img, format),
    }
}

/// Encode to JPEG using mozjpeg.
///
/// Progressive mode is mozjpeg's own default; turning it off switches to the
/// libjpeg-turbo compatible profile, which writes baseline scans.
pub fn encode_jpeg(img: &DynamicImage, settings: &JpegSettings) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        // Zero-copy when the normalizer already produced RGB8
        let rgb: Cow<'_, image::RgbImage> = match img {
            DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
            _ => Cow::Owned(img.to_rgb8()),
        };
        let (w, h) = rgb.dimensions();
        let pixels: &[u8] = rgb.as_raw();

        if w == 0 || h == 0 {
            return Err(ShrinkError::encode_failed(
                "jpeg",
                "width or height is zero",
            ));
        }
        if w > JPEG_MAX_DIMENSION || h > JPEG_MAX_DIMENSION {
            return Err(ShrinkError::encode_failed(
                "jpeg",
                format!("{w}x{h} exceeds the JPEG limit of {JPEG_MAX_DIMENSION} pixels per side"),
            ));
        }

        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        if !settings.progressive {
            comp.set_fastest_defaults();
        }
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(settings.quality as f32);
        comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
        if settings.progressive {
            comp.set_progressive_mode();
        }
        comp.set_optimize_coding(settings.optimize_coding);

        let estimated_size = (w as usize * h as usize / 10).max(4096);
        let mut output = Vec::with_capacity(estimated_size);

        {
            let mut writer = comp.start_compress(&mut output).map_err(|e| {
                ShrinkError::encode_failed("jpeg", format!("mozjpeg: failed to start compress: {e:?}"))
            })?;

            let stride = w as usize * 3;
            for row in pixels.chunks(stride) {
                writer.write_scanlines(row).map_err(|e| {
                    ShrinkError::encode_failed(
                        "jpeg",
                        format!("mozjpeg: failed to write scanlines: {e:?}"),
                    )
                })?;
            }

            writer.finish().map_err(|e| {
                ShrinkError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
            })?;
        }

        Ok(output)
    })
}

/// Encode to WebP with libwebp. Alpha is kept when the image carries it.
pub fn encode_webp(img: &DynamicImage, settings: &WebpSettings) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:webp", || {
        let (w, h) = img.dimensions();

        let mut config = webp::WebPConfig::new()
            .map_err(|_| ShrinkError::encode_failed("webp", "failed to create WebPConfig"))?;
        config.quality = settings.quality as f32;
        config.method = settings.method as i32;
        config.lossless = i32::from(settings.lossless);

        let encoded = if img.color().has_alpha() {
            let rgba: Cow<'_, image::RgbaImage> = match img {
                DynamicImage::ImageRgba8(rgba_img) => Cow::Borrowed(rgba_img),
                _ => Cow::Owned(img.to_rgba8()),
            };
            webp::Encoder::from_rgba(&rgba, w, h).encode_advanced(&config)
        } else {
            let rgb: Cow<'_, image::RgbImage> = match img {
                DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
                _ => Cow::Owned(img.to_rgb8()),
            };
            webp::Encoder::from_rgb(&rgb, w, h).encode_advanced(&config)
        };

        let mem = encoded.map_err(|e| {
            ShrinkError::encode_failed("webp", format!("WebP encode failed: {e:?}"))
        })?;
        Ok(mem.to_vec())
    })
}

/// Encode to PNG with the image crate, then recompress losslessly with oxipng.
pub fn encode_png(img: &DynamicImage, settings: &PngSettings) -> EncoderResult<Vec<u8>> {
    if settings.level > PngSettings::MAX_LEVEL {
        return Err(ShrinkError::encode_failed(
            "png",
            format!(
                "oxipng level {} is out of range 0..={}",
                settings.level,
                PngSettings::MAX_LEVEL
            ),
        ));
    }
    run_with_panic_policy("encode:png", || {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| ShrinkError::encode_failed("png", format!("PNG encode failed: {e}")))?;

        let mut options = oxipng::Options::from_preset(settings.level);
        options.strip = oxipng::StripChunks::Safe;

        oxipng::optimize_from_memory(&buf, &options).map_err(|e| {
            ShrinkError::encode_failed("png", format!("oxipng optimization failed: {e}"))
        })
    })
}

/// Encode with whatever writer the image crate has for `format`.
pub fn encode_with_image_crate(img: &DynamicImage, format: ImageFormat) -> EncoderResult<Vec<u8>> {
    let name = OutputFormat::Passthrough(format).name();
    run_with_panic_policy("encode:image", || {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format)
            .map_err(|e| ShrinkError::encode_failed(name, e.to_string()))?;
        Ok(buf)
    })
}
