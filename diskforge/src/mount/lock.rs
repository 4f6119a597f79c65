//! Exclusive advisory lock on an image device.
//!
//! udev reacts to loop attach/format events by re-reading the partition
//! table, which can make the device briefly disappear underneath a mount.
//! udev skips devices that hold a BSD `flock`, so the device is locked from
//! before formatting until the mount call has returned.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use diskforge_shared::{ImageError, ImageResult};

/// A guard that holds an exclusive lock on a block device (or image file).
///
/// The lock is released when this guard is dropped, or when the process
/// exits/crashes.
#[derive(Debug)]
pub struct DeviceLock {
    file: File,
    path: PathBuf,
}

impl DeviceLock {
    /// Open `device` and block until an exclusive lock is held.
    pub fn acquire(device: &Path) -> ImageResult<Self> {
        let lock_err = |source: std::io::Error| ImageError::Lock {
            device: device.to_path_buf(),
            source,
        };

        // Read-only is enough for flock and does not itself trigger a
        // change event on close.
        let file = File::open(device).map_err(lock_err)?;

        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if result != 0 {
            return Err(lock_err(std::io::Error::last_os_error()));
        }

        tracing::debug!(device = %device.display(), "Acquired device lock");

        Ok(DeviceLock {
            file,
            path: device.to_path_buf(),
        })
    }

    /// Path of the locked device.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DeviceLock {
    fn drop(&mut self) {
        // Closing the fd releases the lock as well; unlock explicitly so the
        // release is not tied to other dups of the descriptor.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }

        tracing::debug!(device = %self.path.display(), "Released device lock");
    }
}

/// Whether another open file description currently holds a lock on `path`.
///
/// Probes with a non-blocking shared lock on a fresh descriptor.
pub fn is_locked(path: &Path) -> ImageResult<bool> {
    let file = File::open(path).map_err(|source| ImageError::Lock {
        device: path.to_path_buf(),
        source,
    })?;

    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_SH | libc::LOCK_NB) };
    if result == 0 {
        unsafe {
            libc::flock(file.as_raw_fd(), libc::LOCK_UN);
        }
        return Ok(false);
    }

    let err = std::io::Error::last_os_error();
    if err.kind() == std::io::ErrorKind::WouldBlock {
        Ok(true)
    } else {
        Err(ImageError::Lock {
            device: path.to_path_buf(),
            source: err,
        })
    }
}
