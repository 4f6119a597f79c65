//! Shared constants between the host side and the sandboxed side.
//!
//! These values must be identical on both sides of the delegation boundary.

/// Image-file action configuration
pub mod action {
    /// Value of the `action:` key that selects the image-file action.
    pub const KIND: &str = "image-file";

    /// Argument appended to the sandboxed command line so the in-machine run
    /// can find the device created by the delegate.
    pub const INTERNAL_IMAGE_ARG: &str = "--internal-image";

    /// Directory (relative to the scratch dir) where the image is mounted.
    pub const MOUNT_SUBDIR: &str = "mnt";
}

/// Loop device facility
pub mod loopdev {
    /// Control node used to allocate and remove loop devices.
    pub const CONTROL_PATH: &str = "/dev/loop-control";

    /// Prefix of loop device nodes (`/dev/loop0`, `/dev/loop1`, ...).
    pub const DEVICE_PREFIX: &str = "/dev/loop";

    /// Removal attempts before giving up on a detached loop device.
    pub const REMOVE_MAX_ATTEMPTS: u32 = 60;

    /// Delay between removal attempts, in milliseconds.
    pub const REMOVE_RETRY_DELAY_MS: u64 = 1000;
}

/// Image file allocation
pub mod image {
    /// Permission bits for newly created image files (before umask).
    pub const FILE_MODE: u32 = 0o666;

    /// Permission bits for the mount directory.
    pub const MOUNT_DIR_MODE: u32 = 0o755;
}

/// Virtio block devices as seen inside the sandbox
pub mod virtio {
    /// Maximum number of virtio block devices (vda..vdz).
    pub const MAX_DEVICES: u8 = 26;

    /// Device node prefix inside the machine.
    pub const DEVICE_PREFIX: &str = "/dev/vd";
}
