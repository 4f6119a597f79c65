//! diskforge - disk image lifecycle for build pipelines.
//!
//! Allocates an image file, binds it to a block device (a loop device on the
//! host, or a virtio disk created by a delegate when running inside a
//! machine), formats it, mounts it under an exclusive device lock, and
//! unmounts/releases it again during cleanup.
//!
//! ```rust,no_run
//! use diskforge::{HostOps, ImageContext, ImageFileAction, ImageSpec, Preparation};
//!
//! let spec = ImageSpec::from_yaml_str(
//!     "imagename: debian.img\nimagesize: 1GB\nfs: ext4\nfsname: debian\n",
//! )?;
//! let mut ctx = ImageContext::new("/tmp/scratch");
//! let mut action = ImageFileAction::new(spec, HostOps::default())?;
//!
//! action.prepare(Preparation::Direct, &mut ctx)?;
//! action.run(&mut ctx)?;
//! // ... populate ctx.image_mnt_dir() ...
//! action.cleanup(&mut ctx)?;
//! # Ok::<(), diskforge::ImageError>(())
//! ```

pub mod config;
pub mod delegate;
pub mod device;
pub mod disk;
pub mod format;
pub mod lifecycle;
pub mod loopdev;
pub mod mount;
pub mod size;

pub use config::ImageSpec;
pub use delegate::{ImageDelegate, VirtioDiskDelegate};
pub use device::BlockDeviceHandle;
pub use diskforge_shared::{ImageError, ImageResult};
pub use format::{CommandRunner, Filesystem, Formatter, HostCommandRunner};
pub use lifecycle::{HostOps, ImageContext, ImageFileAction, ImageState, Preparation};
pub use loopdev::{KernelLoopBackend, LoopBackend, LoopDevice, LoopDeviceManager, RetryPolicy};
pub use mount::{DeviceLock, MountGuard, Mounter, SysMounter};
pub use size::parse_human_size;
