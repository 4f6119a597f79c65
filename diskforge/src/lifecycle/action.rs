//! The image-file action.

use std::path::{Path, PathBuf};

use diskforge_shared::constants::action::INTERNAL_IMAGE_ARG;
use diskforge_shared::{ImageError, ImageResult};

use super::{HostOps, ImageContext, ImageState, Preparation};
use crate::config::ImageSpec;
use crate::delegate::ImageDelegate;
use crate::device::BlockDeviceHandle;
use crate::disk;
use crate::format::{Filesystem, Formatter};
use crate::loopdev::LoopDeviceManager;
use crate::mount::MountGuard;
use crate::size::format_human_size;

/// Creates, formats and mounts an image file, and tears it down again.
///
/// Phases run strictly in order: [`prepare`](Self::prepare) (or
/// [`adopt_device`](Self::adopt_device) inside a sandbox), [`run`](Self::run),
/// [`cleanup`](Self::cleanup).
pub struct ImageFileAction {
    spec: ImageSpec,
    size: u64,
    /// Filesystem used from the run phase on (normalized after formatting).
    fs: Filesystem,
    state: ImageState,
    handle: Option<BlockDeviceHandle>,
    loops: LoopDeviceManager,
    formatter: Formatter,
    mounts: MountGuard,
}

impl ImageFileAction {
    /// Validate `spec` and parse its size once.
    pub fn new(spec: ImageSpec, ops: HostOps) -> ImageResult<Self> {
        let size = spec.validate()?;
        let fs = spec.fs().clone();

        Ok(Self {
            spec,
            size,
            fs,
            state: ImageState::Unprepared,
            handle: None,
            loops: LoopDeviceManager::new(ops.loops, ops.retry),
            formatter: Formatter::new(ops.runner),
            mounts: MountGuard::new(ops.mounter),
        })
    }

    pub fn spec(&self) -> &ImageSpec {
        &self.spec
    }

    /// Image size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn state(&self) -> ImageState {
        self.state
    }

    /// Filesystem type as used for mounting and reporting.
    pub fn filesystem(&self) -> &Filesystem {
        &self.fs
    }

    pub fn handle(&self) -> Option<&BlockDeviceHandle> {
        self.handle.as_ref()
    }

    fn expect_state(&self, expected: ImageState, phase: &str) -> ImageResult<()> {
        if self.state != expected {
            return Err(ImageError::InvalidState(format!(
                "{} requires state {}, image is {}",
                phase, expected, self.state
            )));
        }
        Ok(())
    }

    /// Obtain the block device and record it in `ctx`.
    pub fn prepare(&mut self, preparation: Preparation<'_>, ctx: &mut ImageContext) -> ImageResult<()> {
        self.expect_state(ImageState::Unprepared, "prepare")?;

        let handle = match preparation {
            Preparation::Direct => self.prepare_direct()?,
            Preparation::Delegated { delegate, args } => self.prepare_delegated(delegate, args)?,
        };

        ctx.image = Some(handle.device_path().to_path_buf());
        self.handle = Some(handle);
        self.state.transition_to(ImageState::DeviceReady)
    }

    fn prepare_direct(&self) -> ImageResult<BlockDeviceHandle> {
        let name = self.spec.image_name();
        tracing::info!(
            image = %name.display(),
            size = %format_human_size(self.size),
            "Preparing image on host"
        );

        let image = disk::allocate(name, self.size)?;
        self.loops.attach(image.path())
    }

    fn prepare_delegated(
        &self,
        delegate: &mut dyn ImageDelegate,
        args: &mut Vec<String>,
    ) -> ImageResult<BlockDeviceHandle> {
        let name = self.spec.image_name();
        tracing::info!(
            image = %name.display(),
            size = %format_human_size(self.size),
            "Preparing image through delegate"
        );

        let device = delegate.create_image(name, self.size)?;
        args.push(INTERNAL_IMAGE_ARG.to_string());
        args.push(device.to_string_lossy().into_owned());

        Ok(BlockDeviceHandle::external(device, Some(name.to_path_buf())))
    }

    /// Take over a device created outside this process, e.g. the path
    /// passed to a sandboxed run with `--internal-image`.
    pub fn adopt_device(&mut self, device: PathBuf, ctx: &mut ImageContext) -> ImageResult<()> {
        self.expect_state(ImageState::Unprepared, "adopt_device")?;

        tracing::info!(device = %device.display(), "Using image device provided by caller");
        ctx.image = Some(device.clone());
        self.handle = Some(BlockDeviceHandle::external(device, None));
        self.state.transition_to(ImageState::DeviceReady)
    }

    /// Format and mount the prepared device.
    ///
    /// The device stays locked from before mkfs until the mount call has
    /// returned. Any error aborts the action as-is.
    pub fn run(&mut self, ctx: &mut ImageContext) -> ImageResult<()> {
        self.expect_state(ImageState::DeviceReady, "run")?;
        let device = ctx
            .image()
            .map(Path::to_path_buf)
            .ok_or_else(|| ImageError::InvalidState("no image device in context".into()))?;

        tracing::info!(device = %device.display(), "Running image-file action");

        let lock = self.mounts.lock(&device)?;

        self.fs = self
            .formatter
            .format(&device, self.spec.fs(), self.spec.fs_name())?;
        self.state.transition_to(ImageState::Formatted)?;

        let mount_dir = ctx.default_mount_dir();
        ctx.image_mnt_dir = Some(mount_dir.clone());
        self.mounts.mount_locked(&lock, &self.fs, &mount_dir)?;
        drop(lock);

        self.state.transition_to(ImageState::Mounted)
    }

    /// Unmount (if mounted) and release the device (if owned).
    ///
    /// Each step is attempted at most once per action. Failures are logged
    /// and returned: they mean the image may be incomplete.
    pub fn cleanup(&mut self, ctx: &mut ImageContext) -> ImageResult<()> {
        if self.state.is_released() {
            return Ok(());
        }

        if self.state.is_mounted() {
            let mount_dir = ctx
                .image_mnt_dir()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| ctx.default_mount_dir());

            if let Err(e) = self.mounts.unmount(&mount_dir) {
                tracing::warn!("Failed to unmount {}: {}", mount_dir.display(), e);
                tracing::warn!("Unmount failure can cause images being incomplete!");
                return Err(e);
            }
            ctx.image_mnt_dir = None;
            self.state.transition_to(ImageState::Unmounted)?;
        }

        if let Some(handle) = self.handle.take() {
            // The handle is consumed by the attempt, so the context stops
            // naming the device whatever the outcome.
            ctx.image = None;
            if let Err(e) = self.loops.release(handle) {
                tracing::warn!(
                    image = %self.spec.image_name().display(),
                    "Releasing the image device failed, image may be incomplete: {}",
                    e
                );
                return Err(e);
            }
        }

        self.state.transition_to(ImageState::Released)
    }
}
