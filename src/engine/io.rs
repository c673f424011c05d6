// src/engine/io.rs
//
// Filesystem edges: reading the source file, writing the chosen bytes,
// and deriving the default output path.

use crate::engine::common::EngineResult;
use crate::error::ShrinkError;
use crate::ops::OutputFormat;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const OUTPUT_SUFFIX: &str = "_compressed";

/// Read the whole input file.
pub fn read_input(path: &Path) -> EngineResult<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| ShrinkError::file_read_failed(path.display().to_string(), e))
}

/// `<dir>/<stem>_compressed.<ext>` next to the input.
pub fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let file_name = format!("{stem}{OUTPUT_SUFFIX}.{}", format.extension());
    match input.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Write `data` to `path`, creating parent directories first.
///
/// Atomic: bytes go to a temp file in the target directory, which is then
/// renamed over `path`. A failed write leaves no partial output behind.
pub fn write_output(path: &Path, data: &[u8]) -> EngineResult<()> {
    let output_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    std::fs::create_dir_all(&output_dir).map_err(|e| {
        ShrinkError::create_dir_failed(output_dir.display().to_string(), e)
    })?;

    // Same directory as the target so rename() never crosses filesystems
    let mut temp_file = NamedTempFile::new_in(&output_dir).map_err(|e| {
        ShrinkError::file_write_failed(output_dir.display().to_string(), e)
    })?;

    let temp_path = temp_file.path().to_path_buf();
    temp_file
        .write_all(data)
        .map_err(|e| ShrinkError::file_write_failed(temp_path.display().to_string(), e))?;
    temp_file
        .as_file_mut()
        .sync_all()
        .map_err(|e| ShrinkError::file_write_failed(temp_path.display().to_string(), e))?;

    temp_file
        .persist(path)
        .map_err(|e| ShrinkError::file_write_failed(path.display().to_string(), e.error))?;

    tracing::info!(path = %path.display(), bytes = data.len(), "wrote output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    #[test]
    fn test_default_output_path_jpeg() {
        let out = default_output_path(Path::new("/photos/cat.png"), OutputFormat::Jpeg);
        assert_eq!(out, PathBuf::from("/photos/cat_compressed.jpg"));
    }

    #[test]
    fn test_default_output_path_webp_and_passthrough() {
        assert_eq!(
            default_output_path(Path::new("a/b/dog.jpeg"), OutputFormat::WebP),
            PathBuf::from("a/b/dog_compressed.webp")
        );
        assert_eq!(
            default_output_path(
                Path::new("shot.jpg"),
                OutputFormat::Passthrough(ImageFormat::Png)
            ),
            PathBuf::from("shot_compressed.png")
        );
    }

    #[test]
    fn test_default_output_path_keeps_inner_dots() {
        let out = default_output_path(Path::new("my.holiday.photo.jpg"), OutputFormat::Jpeg);
        assert_eq!(out, PathBuf::from("my.holiday.photo_compressed.jpg"));
    }

    #[test]
    fn test_write_output_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("deeper").join("out.jpg");
        write_output(&target, b"hello").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"hello");
    }

    #[test]
    fn test_write_output_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.bin");
        write_output(&target, b"first").unwrap();
        write_output(&target, b"second").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"second");
        // no stray temp files left next to the output
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_read_input_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_input(&dir.path().join("missing.jpg")).unwrap_err();
        assert!(matches!(err, ShrinkError::FileReadFailed { .. }));
    }

    #[test]
    fn test_write_output_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let err = write_output(&blocker.join("out.jpg"), b"data").unwrap_err();
        assert!(matches!(err, ShrinkError::CreateDirFailed { .. }));
    }
}
