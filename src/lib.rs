// lib.rs
//
// shrink-to-size: re-encode an image so it fits a byte budget
//
// Design goals:
// - Highest quality that fits, found by binary search
// - Resolution backoff when no quality fits
// - Always return a best-effort result
// - No global state; every call is independent

pub mod engine;
pub mod error;
pub mod ops;

use error::ShrinkError;
use image::ImageReader;
use std::io::{BufRead, BufReader, Cursor, Seek};
use std::path::Path;

pub use engine::{
    compress_file, compress_image, compress_to_target, default_output_path, CompressOutcome,
    CompressReport, DecodeLimits,
};
pub use error::{ErrorCategory, Result};
pub use ops::{CompressOptions, EncodeParams, OutputFormat, SearchBounds};

/// Dimensions and format read from the header only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
}

fn read_inspect_metadata<R: BufRead + Seek>(reader: R) -> Result<InspectMetadata> {
    let reader = ImageReader::new(reader)
        .with_guessed_format()
        .map_err(|e| ShrinkError::decode_failed(format!("failed to read image header: {e}")))?;

    let format = reader.format().map(|f| format!("{:?}", f).to_lowercase());
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ShrinkError::decode_failed(format!("failed to read dimensions: {e}")))?;

    Ok(InspectMetadata {
        width,
        height,
        format,
    })
}

/// Inspect dimensions WITHOUT decoding pixels.
///
/// Useful for deciding on `max_width` or rejecting oversized inputs
/// before paying for a decode.
pub fn inspect_header_from_bytes(data: &[u8]) -> Result<InspectMetadata> {
    read_inspect_metadata(Cursor::new(data))
}

pub fn inspect_header_from_path(path: &Path) -> Result<InspectMetadata> {
    use std::fs::File;

    let file = File::open(path)
        .map_err(|e| ShrinkError::file_read_failed(path.display().to_string(), e))?;
    read_inspect_metadata(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn inspect_reads_header() {
        let meta = inspect_header_from_bytes(&png_bytes(33, 17)).unwrap();
        assert_eq!(meta.width, 33);
        assert_eq!(meta.height, 17);
        assert_eq!(meta.format.as_deref(), Some("png"));
    }

    #[test]
    fn inspect_rejects_garbage() {
        let err = inspect_header_from_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ShrinkError::DecodeFailed { .. }));
    }

    #[test]
    fn inspect_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.png");
        std::fs::write(&path, png_bytes(5, 6)).unwrap();
        let meta = inspect_header_from_path(&path).unwrap();
        assert_eq!((meta.width, meta.height), (5, 6));

        let err = inspect_header_from_path(&dir.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, ShrinkError::FileReadFailed { .. }));
    }
}
