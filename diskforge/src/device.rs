//! Block device handle shared by both preparation paths.

use std::path::{Path, PathBuf};

use crate::loopdev::LoopDevice;

/// A block device backing the image.
///
/// A handle either owns a loop device created by this process (and must be
/// released during cleanup) or refers to a device supplied from outside,
/// e.g. by the virtualization delegate, which is never released here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDeviceHandle {
    device_path: PathBuf,
    backing_file: Option<PathBuf>,
    loop_device: Option<LoopDevice>,
}

impl BlockDeviceHandle {
    /// Handle for a loop device this process attached.
    pub fn owned(loop_device: LoopDevice, backing_file: PathBuf) -> Self {
        Self {
            device_path: loop_device.path().to_path_buf(),
            backing_file: Some(backing_file),
            loop_device: Some(loop_device),
        }
    }

    /// Handle for a device created and released by someone else.
    pub fn external(device_path: PathBuf, backing_file: Option<PathBuf>) -> Self {
        Self {
            device_path,
            backing_file,
            loop_device: None,
        }
    }

    pub fn device_path(&self) -> &Path {
        &self.device_path
    }

    pub fn backing_file(&self) -> Option<&Path> {
        self.backing_file.as_deref()
    }

    /// Whether cleanup has to detach and remove the loop device.
    pub fn owns_loop_device(&self) -> bool {
        self.loop_device.is_some()
    }

    pub fn loop_device(&self) -> Option<&LoopDevice> {
        self.loop_device.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_handle_uses_loop_path() {
        let handle =
            BlockDeviceHandle::owned(LoopDevice::new(7), PathBuf::from("/tmp/debian.img"));
        assert!(handle.owns_loop_device());
        assert_eq!(handle.device_path(), Path::new("/dev/loop7"));
        assert_eq!(handle.backing_file(), Some(Path::new("/tmp/debian.img")));
    }

    #[test]
    fn test_external_handle_is_not_owned() {
        let handle = BlockDeviceHandle::external(PathBuf::from("/dev/vda"), None);
        assert!(!handle.owns_loop_device());
        assert!(handle.loop_device().is_none());
    }
}
