//! Loop device management.
//!
//! Binds an image file to a `/dev/loopN` block device and tears the binding
//! down again. The kernel keeps a detached device busy for a moment (udev
//! rescans triggered by the detach), so node removal is retried under a
//! [`RetryPolicy`] while detaching is attempted only once.

mod kernel;
mod retry;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use diskforge_shared::constants::loopdev::DEVICE_PREFIX;
use diskforge_shared::{ImageError, ImageResult};

use crate::device::BlockDeviceHandle;

pub use kernel::KernelLoopBackend;
pub use retry::{Exhausted, RetryPolicy};

/// A loop device node, identified by its kernel index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopDevice {
    index: u32,
    path: PathBuf,
}

impl LoopDevice {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            path: PathBuf::from(format!("{}{}", DEVICE_PREFIX, index)),
        }
    }

    /// Loop device whose node lives somewhere other than `/dev`.
    pub fn at(index: u32, path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            path: path.into(),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Device node path (e.g. `/dev/loop0`).
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Loop device facility at the OS boundary.
pub trait LoopBackend {
    /// Bind `backing` to the lowest free loop device.
    fn attach(&self, backing: &Path, offset: u64, read_only: bool) -> ImageResult<LoopDevice>;

    /// Clear the file binding of `device`.
    fn detach(&self, device: &LoopDevice) -> std::io::Result<()>;

    /// Remove the (detached) device node.
    fn remove(&self, device: &LoopDevice) -> std::io::Result<()>;
}

/// Attaches image files and releases the devices it attached.
#[derive(Clone)]
pub struct LoopDeviceManager {
    backend: Arc<dyn LoopBackend>,
    retry: RetryPolicy,
}

impl LoopDeviceManager {
    pub fn new(backend: Arc<dyn LoopBackend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    /// Attach `path` read-write at offset 0.
    pub fn attach(&self, path: &Path) -> ImageResult<BlockDeviceHandle> {
        let device = self.backend.attach(path, 0, false)?;

        tracing::info!(
            image = %path.display(),
            device = %device.path().display(),
            "Attached image to loop device"
        );

        Ok(BlockDeviceHandle::owned(device, path.to_path_buf()))
    }

    /// Detach and remove the loop device behind `handle`.
    ///
    /// Handles that do not own a loop device are left alone.
    pub fn release(&self, handle: BlockDeviceHandle) -> ImageResult<()> {
        let Some(device) = handle.loop_device() else {
            tracing::debug!(
                device = %handle.device_path().display(),
                "Device not owned, skipping release"
            );
            return Ok(());
        };

        if let Err(source) = self.backend.detach(device) {
            tracing::warn!("Failed to detach loop device {}: {}", device.path().display(), source);
            return Err(ImageError::LoopDetach {
                device: device.path().to_path_buf(),
                source,
            });
        }

        self.retry
            .run(|attempt| {
                self.backend.remove(device).inspect_err(|e| {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts(),
                        "Loop device {} couldn't be removed ({}), waiting",
                        device.path().display(),
                        e
                    );
                })
            })
            .map_err(|exhausted| {
                tracing::warn!(
                    "Failed to remove loop device {}: {}",
                    device.path().display(),
                    exhausted.last
                );
                ImageError::LoopRemove {
                    device: device.path().to_path_buf(),
                    attempts: exhausted.attempts,
                    source: exhausted.last,
                }
            })?;

        tracing::info!(device = %device.path().display(), "Released loop device");
        Ok(())
    }
}
