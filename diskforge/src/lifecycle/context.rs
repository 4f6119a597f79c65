//! Context shared between the phases of a pipeline.

use std::path::{Path, PathBuf};

use diskforge_shared::constants::action::MOUNT_SUBDIR;

/// State handed from phase to phase and on to later pipeline stages.
///
/// Field ownership:
/// - `image`: written by preparation (or when adopting a device), cleared
///   after release
/// - `image_mnt_dir`: written by the run phase, cleared after unmount
/// - `scratch_dir`: fixed at construction
///
/// Only one image/mount pair is tracked at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageContext {
    scratch_dir: PathBuf,
    pub(crate) image: Option<PathBuf>,
    pub(crate) image_mnt_dir: Option<PathBuf>,
}

impl ImageContext {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            image: None,
            image_mnt_dir: None,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Device path of the current image.
    pub fn image(&self) -> Option<&Path> {
        self.image.as_deref()
    }

    /// Where the current image is mounted.
    pub fn image_mnt_dir(&self) -> Option<&Path> {
        self.image_mnt_dir.as_deref()
    }

    /// Mount directory used by the run phase.
    pub fn default_mount_dir(&self) -> PathBuf {
        self.scratch_dir.join(MOUNT_SUBDIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_empty() {
        let ctx = ImageContext::new("/scratch");
        assert_eq!(ctx.scratch_dir(), Path::new("/scratch"));
        assert!(ctx.image().is_none());
        assert!(ctx.image_mnt_dir().is_none());
        assert_eq!(ctx.default_mount_dir(), Path::new("/scratch/mnt"));
    }
}
