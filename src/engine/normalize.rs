// src/engine/normalize.rs
//
// Pixel-format normalization for the output encoding.
// Runs once, before any measurement; no later stage changes the pixel format.

use crate::ops::OutputFormat;
use image::{DynamicImage, Rgb, RgbImage, RgbaImage};

/// Background used when flattening transparency for formats without alpha.
const FLATTEN_BACKGROUND: [u8; 3] = [255, 255, 255];

/// Produce an image whose pixel layout the target encoder can take as-is.
///
/// - JPEG: anything with alpha is composited onto white; any other layout
///   becomes RGB8.
/// - WebP: unchanged.
/// - Passthrough: layouts other than RGB8/RGBA8 become RGBA8 when they carry
///   alpha and RGB8 otherwise.
///
/// The input is returned untouched (same buffer) when no conversion applies.
pub fn normalize_for_format(img: DynamicImage, format: OutputFormat) -> DynamicImage {
    match format.canonical() {
        OutputFormat::Jpeg => {
            if img.color().has_alpha() {
                DynamicImage::ImageRgb8(flatten_onto_white(img))
            } else if matches!(img, DynamicImage::ImageRgb8(_)) {
                img
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            }
        }
        OutputFormat::WebP => img,
        OutputFormat::Passthrough(_) => match img {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
            other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        },
    }
}

/// Alpha-weighted composite onto an opaque white canvas of the same size.
fn flatten_onto_white(img: DynamicImage) -> RgbImage {
    let rgba: RgbaImage = match img {
        DynamicImage::ImageRgba8(rgba) => rgba,
        other => other.to_rgba8(),
    };
    let [bg_r, bg_g, bg_b] = FLATTEN_BACKGROUND;
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        Rgb([blend(r, bg_r, a), blend(g, bg_g, a), blend(b, bg_b, a)])
    })
}

#[inline]
fn blend(foreground: u8, background: u8, alpha: u8) -> u8 {
    let (fg, bg, a) = (foreground as u32, background as u32, alpha as u32);
    ((fg * a + bg * (255 - a) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayAlphaImage, GrayImage, ImageBuffer, ImageFormat, LumaA, Rgba};

    fn checker_rgba(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            let alpha = if (x + y) % 2 == 0 { 0 } else { 255 };
            Rgba([10, 100, 200, alpha])
        }))
    }

    #[test]
    fn test_jpeg_transparent_pixels_become_white() {
        let out = normalize_for_format(checker_rgba(4, 4), OutputFormat::Jpeg);
        let rgb = match out {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => panic!("expected RGB8, got {:?}", other.color()),
        };
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(1, 0).0, [10, 100, 200]);
    }

    #[test]
    fn test_jpeg_partial_alpha_blends() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 128])));
        let out = normalize_for_format(img, OutputFormat::Jpeg).to_rgb8();
        // 255 * 127 / 255 = 127
        assert_eq!(out.get_pixel(0, 0).0, [127, 127, 127]);
    }

    #[test]
    fn test_jpeg_luma_alpha_is_flattened() {
        let img = DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(2, 1, LumaA([40, 0])));
        let out = normalize_for_format(img, OutputFormat::Jpeg);
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));
        assert_eq!(out.to_rgb8().get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_jpeg_luma_converted_losslessly() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, image::Luma([77])));
        let out = normalize_for_format(img, OutputFormat::Jpeg);
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));
        assert_eq!(out.to_rgb8().get_pixel(1, 1).0, [77, 77, 77]);
    }

    #[test]
    fn test_jpeg_rgb_passes_through() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 3, Rgb([1, 2, 3])));
        let out = normalize_for_format(img.clone(), OutputFormat::Jpeg);
        assert_eq!(out, img);
    }

    #[test]
    fn test_webp_keeps_alpha() {
        let img = checker_rgba(4, 4);
        let out = normalize_for_format(img.clone(), OutputFormat::WebP);
        assert_eq!(out, img);

        let luma_alpha = DynamicImage::ImageLumaA8(GrayAlphaImage::new(2, 2));
        let out = normalize_for_format(luma_alpha, OutputFormat::WebP);
        assert!(matches!(out, DynamicImage::ImageLumaA8(_)));
    }

    #[test]
    fn test_passthrough_conversions() {
        let png = OutputFormat::Passthrough(ImageFormat::Png);

        let luma_alpha = DynamicImage::ImageLumaA8(GrayAlphaImage::new(2, 2));
        assert!(matches!(
            normalize_for_format(luma_alpha, png),
            DynamicImage::ImageRgba8(_)
        ));

        let luma = DynamicImage::ImageLuma8(GrayImage::new(2, 2));
        assert!(matches!(
            normalize_for_format(luma, png),
            DynamicImage::ImageRgb8(_)
        ));

        let rgb16 = DynamicImage::ImageRgb16(ImageBuffer::<Rgb<u16>, Vec<u16>>::new(2, 2));
        assert!(matches!(
            normalize_for_format(rgb16, png),
            DynamicImage::ImageRgb8(_)
        ));

        let rgba = checker_rgba(2, 2);
        assert_eq!(normalize_for_format(rgba.clone(), png), rgba);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for format in [
            OutputFormat::Jpeg,
            OutputFormat::WebP,
            OutputFormat::Passthrough(ImageFormat::Png),
        ] {
            let once = normalize_for_format(checker_rgba(5, 3), format);
            let twice = normalize_for_format(once.clone(), format);
            assert_eq!(once.as_bytes(), twice.as_bytes());
            assert_eq!(once.color(), twice.color());
        }
    }
}
