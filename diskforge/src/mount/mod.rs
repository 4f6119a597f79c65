//! Lock-protected mounting of the image device.
//!
//! Provides:
//! - `DeviceLock` - RAII exclusive flock on the device
//! - `Mounter` - mount(2)/umount(2) seam, `SysMounter` for the real thing
//! - `MountGuard` - resolve → lock → mkdir → mount, and unmount

mod lock;

use std::fs::DirBuilder;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use diskforge_shared::constants::image::MOUNT_DIR_MODE;
use diskforge_shared::{ImageError, ImageResult};
use nix::mount::{MsFlags, mount, umount};

use crate::format::Filesystem;

pub use lock::{DeviceLock, is_locked};

/// Mount primitives at the OS boundary.
pub trait Mounter {
    /// Mount `device` on `target` as `fstype`, no flags, no data.
    fn mount(&self, device: &Path, target: &Path, fstype: &str) -> io::Result<()>;

    /// Unmount `target` without forcing.
    fn unmount(&self, target: &Path) -> io::Result<()>;
}

/// Mounts through the kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysMounter;

impl Mounter for SysMounter {
    fn mount(&self, device: &Path, target: &Path, fstype: &str) -> io::Result<()> {
        mount(
            Some(device),
            target,
            Some(fstype),
            MsFlags::empty(),
            None::<&str>,
        )?;
        Ok(())
    }

    fn unmount(&self, target: &Path) -> io::Result<()> {
        umount(target)?;
        Ok(())
    }
}

/// Resolve symlinks such as `/dev/disk/by-id/...` to the real device node.
pub fn resolve_device(device: &Path) -> ImageResult<PathBuf> {
    device.canonicalize().map_err(|source| ImageError::Lock {
        device: device.to_path_buf(),
        source,
    })
}

/// Mounts the image device while holding its lock.
#[derive(Clone)]
pub struct MountGuard {
    mounter: Arc<dyn Mounter>,
}

impl MountGuard {
    pub fn new(mounter: Arc<dyn Mounter>) -> Self {
        Self { mounter }
    }

    /// Resolve `device` and take the exclusive lock on the real node.
    pub fn lock(&self, device: &Path) -> ImageResult<DeviceLock> {
        let resolved = resolve_device(device)?;
        if resolved != device {
            tracing::debug!(
                device = %device.display(),
                resolved = %resolved.display(),
                "Resolved image device"
            );
        }
        DeviceLock::acquire(&resolved)
    }

    /// Mount the locked device on `mount_dir`, creating the directory.
    ///
    /// The caller keeps `lock` alive until this returns.
    pub fn mount_locked(
        &self,
        lock: &DeviceLock,
        fs: &Filesystem,
        mount_dir: &Path,
    ) -> ImageResult<()> {
        let mount_err = |source: io::Error| ImageError::Mount {
            mount_dir: mount_dir.to_path_buf(),
            source,
        };

        DirBuilder::new()
            .recursive(true)
            .mode(MOUNT_DIR_MODE)
            .create(mount_dir)
            .map_err(mount_err)?;

        let fstype = fs.mount_type();
        tracing::info!(
            device = %lock.path().display(),
            mount_dir = %mount_dir.display(),
            fstype,
            "Mounting image"
        );

        self.mounter
            .mount(lock.path(), mount_dir, fstype)
            .map_err(mount_err)?;

        tracing::info!(mount_dir = %mount_dir.display(), "Mounted image");
        Ok(())
    }

    /// Lock, mount, and release the lock once the mount call has returned.
    pub fn lock_and_mount(
        &self,
        device: &Path,
        fs: &Filesystem,
        mount_dir: &Path,
    ) -> ImageResult<()> {
        let lock = self.lock(device)?;
        self.mount_locked(&lock, fs, mount_dir)
    }

    /// Unmount `mount_dir`. A failure means the image may be incomplete.
    pub fn unmount(&self, mount_dir: &Path) -> ImageResult<()> {
        self.mounter
            .unmount(mount_dir)
            .map_err(|source| ImageError::Unmount {
                mount_dir: mount_dir.to_path_buf(),
                source,
            })?;

        tracing::info!(mount_dir = %mount_dir.display(), "Unmounted image");
        Ok(())
    }
}
