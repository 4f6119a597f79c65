//! Virtio block device delegate.

use std::path::{Path, PathBuf};

use diskforge_shared::constants::virtio::{DEVICE_PREFIX, MAX_DEVICES};
use diskforge_shared::{ImageError, ImageResult};

use super::ImageDelegate;
use crate::disk;

/// Virtio block device identifier.
///
/// Generates Linux virtio block device names (vda, vdb, ..., vdz).
#[derive(Debug, Clone, PartialEq, Eq)]
struct BlockDeviceId(String);

impl BlockDeviceId {
    /// Create a new block device ID from an index (0 = vda, 1 = vdb, etc.).
    fn from_index(index: u8) -> Option<Self> {
        (index < MAX_DEVICES).then(|| Self(format!("vd{}", (b'a' + index) as char)))
    }

    /// Get the device path in the machine (e.g., "/dev/vda").
    fn device_path(&self) -> PathBuf {
        PathBuf::from(format!("{}{}", DEVICE_PREFIX, &self.0[2..]))
    }
}

/// A host image file exposed to the machine as a virtio disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtioDisk {
    pub block_id: String,
    pub disk_path: PathBuf,
    pub size: u64,
    pub read_only: bool,
}

/// Allocates host image files and assigns them virtio slots.
///
/// The collected disks are handed to the machine configuration; the machine
/// owns them for its lifetime.
#[derive(Debug, Default)]
pub struct VirtioDiskDelegate {
    disks: Vec<VirtioDisk>,
    next_index: u8,
}

impl VirtioDiskDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disks created so far, in slot order.
    pub fn disks(&self) -> &[VirtioDisk] {
        &self.disks
    }

    pub fn into_disks(self) -> Vec<VirtioDisk> {
        self.disks
    }
}

impl ImageDelegate for VirtioDiskDelegate {
    fn create_image(&mut self, name: &Path, size: u64) -> ImageResult<PathBuf> {
        let block_id = BlockDeviceId::from_index(self.next_index).ok_or_else(|| {
            ImageError::DelegateCreate(format!(
                "no free virtio slot for {} ({} disks attached)",
                name.display(),
                self.disks.len()
            ))
        })?;

        let image = disk::allocate(name, size)
            .map_err(|e| ImageError::DelegateCreate(e.to_string()))?;
        self.next_index += 1;

        let device_path = block_id.device_path();
        tracing::debug!(
            "Added disk as {}: {}",
            device_path.display(),
            image.path().display()
        );

        self.disks.push(VirtioDisk {
            block_id: block_id.0,
            disk_path: image.path().to_path_buf(),
            size: image.size(),
            read_only: false,
        });

        Ok(device_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_slots_assigned_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut delegate = VirtioDiskDelegate::new();

        let first = delegate
            .create_image(&temp_dir.path().join("a.img"), 4096)
            .unwrap();
        let second = delegate
            .create_image(&temp_dir.path().join("b.img"), 8192)
            .unwrap();

        assert_eq!(first, Path::new("/dev/vda"));
        assert_eq!(second, Path::new("/dev/vdb"));
        assert_eq!(delegate.disks()[1].block_id, "vdb");
        assert_eq!(delegate.disks()[1].size, 8192);
        assert_eq!(
            std::fs::metadata(temp_dir.path().join("b.img")).unwrap().len(),
            8192
        );
    }

    #[test]
    fn test_slots_exhausted() {
        let temp_dir = TempDir::new().unwrap();
        let mut delegate = VirtioDiskDelegate::new();
        for i in 0..MAX_DEVICES {
            delegate
                .create_image(&temp_dir.path().join(format!("{i}.img")), 512)
                .unwrap();
        }

        let err = delegate
            .create_image(&temp_dir.path().join("extra.img"), 512)
            .unwrap_err();
        assert!(matches!(err, ImageError::DelegateCreate(_)));
        assert_eq!(delegate.into_disks().last().unwrap().block_id, "vdz");
    }

    #[test]
    fn test_allocation_failure_keeps_slot_free() {
        let temp_dir = TempDir::new().unwrap();
        let mut delegate = VirtioDiskDelegate::new();

        assert!(
            delegate
                .create_image(&temp_dir.path().join("missing/a.img"), 512)
                .is_err()
        );
        let device = delegate
            .create_image(&temp_dir.path().join("a.img"), 512)
            .unwrap();
        assert_eq!(device, Path::new("/dev/vda"));
    }
}
