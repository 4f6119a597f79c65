//! Delegated image creation.
//!
//! When the pipeline runs inside a virtual machine, the image file lives on
//! the host and shows up in the machine as a virtio block device. The
//! delegate creates it and reports the device path as the machine sees it.

mod virtio;

use std::path::{Path, PathBuf};

use diskforge_shared::ImageResult;

pub use virtio::{VirtioDisk, VirtioDiskDelegate};

/// Creates block devices on behalf of the lifecycle.
///
/// Devices created this way are owned (and released) by the delegate.
pub trait ImageDelegate {
    /// Create an image called `name` of `size` bytes and return the device
    /// path under which the sandboxed run will see it.
    fn create_image(&mut self, name: &Path, size: u64) -> ImageResult<PathBuf>;
}
