//! Error types used across the image lifecycle.
//!
//! Errors follow the phase that raises them:
//! - preparation: [`ImageError::SizeParse`], [`ImageError::FileCreate`],
//!   [`ImageError::FileResize`], [`ImageError::LoopAttach`],
//!   [`ImageError::DelegateCreate`]
//! - run: [`ImageError::FormatCommand`], [`ImageError::Lock`],
//!   [`ImageError::Mount`]
//! - cleanup: [`ImageError::Unmount`], [`ImageError::LoopDetach`],
//!   [`ImageError::LoopRemove`]
//!
//! Preparation and run errors abort the action. Cleanup errors are returned
//! to the caller as well, since they mean the image may be incomplete.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for image lifecycle operations.
pub type ImageResult<T> = Result<T, ImageError>;

#[derive(Debug, Error)]
pub enum ImageError {
    /// The human-readable size string could not be parsed.
    #[error("failed to parse image size: {input:?}")]
    SizeParse { input: String },

    /// The backing file could not be opened or created.
    #[error("couldn't open image file {path}: {source}")]
    FileCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backing file could not be truncated/extended to the requested size.
    #[error("couldn't resize image file {path} to {size} bytes: {source}")]
    FileResize {
        path: PathBuf,
        size: u64,
        #[source]
        source: io::Error,
    },

    /// The kernel refused to bind the file to a loop device.
    #[error(
        "failed to setup loop device for {path} (need root or CAP_SYS_ADMIN?): {source}"
    )]
    LoopAttach {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Clearing the loop binding failed.
    #[error("failed to detach loop device {device}: {source}")]
    LoopDetach {
        device: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Removing the loop device node failed on every attempt.
    #[error("failed to remove loop device {device} after {attempts} attempts: {source}")]
    LoopRemove {
        device: PathBuf,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    /// The formatting tool exited unsuccessfully or could not be spawned.
    #[error("formatting command `{command}` failed ({status}): {stderr}")]
    FormatCommand {
        command: String,
        status: String,
        stderr: String,
    },

    /// The exclusive advisory lock on the device could not be taken.
    #[error("failed to lock image device {device}: {source}")]
    Lock {
        device: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Mounting the device failed.
    #[error("{mount_dir} mount failed: {source}")]
    Mount {
        mount_dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Unmounting failed; image content may be incomplete.
    #[error("failed to unmount {mount_dir}: {source}")]
    Unmount {
        mount_dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The virtualization delegate could not create the image.
    #[error("delegate failed to create image: {0}")]
    DelegateCreate(String),

    /// Action configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A lifecycle phase was invoked in the wrong state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl ImageError {
    /// Whether this error was raised while tearing the image down.
    pub fn is_cleanup(&self) -> bool {
        matches!(
            self,
            ImageError::Unmount { .. } | ImageError::LoopDetach { .. } | ImageError::LoopRemove { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_attach_mentions_privilege() {
        let err = ImageError::LoopAttach {
            path: PathBuf::from("debian.img"),
            source: io::Error::from_raw_os_error(1),
        };
        let msg = err.to_string();
        assert!(msg.contains("debian.img"));
        assert!(msg.contains("root"));
    }

    #[test]
    fn test_mount_error_names_directory() {
        let err = ImageError::Mount {
            mount_dir: PathBuf::from("/scratch/mnt"),
            source: io::Error::from_raw_os_error(22),
        };
        assert!(err.to_string().starts_with("/scratch/mnt mount failed"));
    }

    #[test]
    fn test_cleanup_classification() {
        let unmount = ImageError::Unmount {
            mount_dir: PathBuf::from("/mnt"),
            source: io::Error::from_raw_os_error(16),
        };
        assert!(unmount.is_cleanup());
        assert!(!ImageError::SizeParse { input: "x".into() }.is_cleanup());
    }
}
