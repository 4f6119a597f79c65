//! Image file allocation.
//!
//! The backing file is the product of the pipeline, so unlike scratch disks
//! it is never removed when the handle goes away.

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use diskforge_shared::constants::image::FILE_MODE;
use diskforge_shared::{ImageError, ImageResult};

use crate::size::format_human_size;

/// An allocated image file of a known size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    path: PathBuf,
    size: u64,
}

impl ImageFile {
    /// Get the image path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the allocated size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Create (or reuse) the file at `path` and set its length to exactly `size`.
///
/// Existing content beyond `size` is discarded; growth is sparse. Calling
/// this twice with the same arguments yields the same file.
pub fn allocate(path: &Path, size: u64) -> ImageResult<ImageFile> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .mode(FILE_MODE)
        .open(path)
        .map_err(|source| ImageError::FileCreate {
            path: path.to_path_buf(),
            source,
        })?;

    file.set_len(size).map_err(|source| ImageError::FileResize {
        path: path.to_path_buf(),
        size,
        source,
    })?;

    tracing::debug!(
        path = %path.display(),
        size = %format_human_size(size),
        "Allocated image file"
    );

    Ok(ImageFile {
        path: path.to_path_buf(),
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_allocate_creates_sized_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("debian.img");

        let image = allocate(&path, 1_000_000).unwrap();

        assert_eq!(image.path(), path);
        assert_eq!(image.size(), 1_000_000);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1_000_000);
    }

    #[test]
    fn test_allocate_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("twice.img");

        allocate(&path, 4096).unwrap();
        allocate(&path, 4096).unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
    }

    #[test]
    fn test_allocate_truncates_larger_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("shrink.img");
        std::fs::write(&path, vec![0xAAu8; 8192]).unwrap();

        allocate(&path, 1024).unwrap();

        let content = std::fs::read(&path).unwrap();
        assert_eq!(content.len(), 1024);
        assert!(content.iter().all(|b| *b == 0xAA));
    }

    #[test]
    fn test_allocate_extends_with_zeros() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("grow.img");
        std::fs::write(&path, b"head").unwrap();

        allocate(&path, 16).unwrap();

        let content = std::fs::read(&path).unwrap();
        assert_eq!(&content[..4], b"head");
        assert!(content[4..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_allocate_missing_parent_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("no/such/dir/image.img");

        let err = allocate(&path, 1024).unwrap_err();
        assert!(matches!(err, ImageError::FileCreate { .. }));
    }
}
