//! Recording fakes for the diskforge OS seams.
//!
//! Device nodes are plain files inside a temporary directory, so the real
//! `DeviceLock` and symlink resolution work against them unprivileged.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use diskforge::mount::is_locked;
use diskforge::{
    CommandRunner, HostOps, ImageDelegate, ImageError, ImageResult, LoopBackend, LoopDevice,
    Mounter, RetryPolicy,
};
use parking_lot::Mutex;
use tempfile::TempDir;

fn errno(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

// ============================================================================
// Loop devices
// ============================================================================

#[derive(Debug, Default)]
struct LoopLog {
    attached: Vec<(PathBuf, u64, bool)>,
    detached: Vec<u32>,
    remove_attempts: u32,
}

/// Loop backend whose devices are files under `dev_dir`.
pub struct FakeLoopBackend {
    dev_dir: PathBuf,
    fail_attach: bool,
    fail_detach: bool,
    /// Number of leading `remove` calls that fail with EBUSY.
    remove_failures: u32,
    log: Mutex<LoopLog>,
}

impl FakeLoopBackend {
    pub fn new(dev_dir: &Path) -> Self {
        Self {
            dev_dir: dev_dir.to_path_buf(),
            fail_attach: false,
            fail_detach: false,
            remove_failures: 0,
            log: Mutex::new(LoopLog::default()),
        }
    }

    pub fn failing_attach(mut self) -> Self {
        self.fail_attach = true;
        self
    }

    pub fn failing_detach(mut self) -> Self {
        self.fail_detach = true;
        self
    }

    pub fn with_remove_failures(mut self, failures: u32) -> Self {
        self.remove_failures = failures;
        self
    }

    pub fn attached(&self) -> Vec<(PathBuf, u64, bool)> {
        self.log.lock().attached.clone()
    }

    pub fn detach_count(&self) -> usize {
        self.log.lock().detached.len()
    }

    pub fn remove_attempts(&self) -> u32 {
        self.log.lock().remove_attempts
    }
}

impl LoopBackend for FakeLoopBackend {
    fn attach(&self, backing: &Path, offset: u64, read_only: bool) -> ImageResult<LoopDevice> {
        if self.fail_attach {
            return Err(ImageError::LoopAttach {
                path: backing.to_path_buf(),
                source: errno(libc::EPERM),
            });
        }

        let mut log = self.log.lock();
        let index = log.attached.len() as u32;
        let node = self.dev_dir.join(format!("loop{}", index));
        std::fs::write(&node, b"").map_err(|source| ImageError::LoopAttach {
            path: backing.to_path_buf(),
            source,
        })?;
        log.attached.push((backing.to_path_buf(), offset, read_only));

        Ok(LoopDevice::at(index, node))
    }

    fn detach(&self, device: &LoopDevice) -> io::Result<()> {
        if self.fail_detach {
            return Err(errno(libc::ENXIO));
        }
        self.log.lock().detached.push(device.index());
        Ok(())
    }

    fn remove(&self, _device: &LoopDevice) -> io::Result<()> {
        let mut log = self.log.lock();
        log.remove_attempts += 1;
        if log.remove_attempts <= self.remove_failures {
            Err(errno(libc::EBUSY))
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Mounting
// ============================================================================

/// One observed mount(2) call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountCall {
    pub device: PathBuf,
    pub target: PathBuf,
    pub fstype: String,
    /// Whether the device was flock-ed while mount ran.
    pub device_locked: bool,
}

/// Mounter that records calls. Like the kernel, it refuses `none`.
#[derive(Default)]
pub struct RecordingMounter {
    fail_mount: bool,
    fail_unmount: bool,
    mounts: Mutex<Vec<MountCall>>,
    unmounts: Mutex<Vec<PathBuf>>,
}

impl RecordingMounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_mount(mut self) -> Self {
        self.fail_mount = true;
        self
    }

    pub fn failing_unmount(mut self) -> Self {
        self.fail_unmount = true;
        self
    }

    pub fn mounts(&self) -> Vec<MountCall> {
        self.mounts.lock().clone()
    }

    pub fn unmounts(&self) -> Vec<PathBuf> {
        self.unmounts.lock().clone()
    }
}

impl Mounter for RecordingMounter {
    fn mount(&self, device: &Path, target: &Path, fstype: &str) -> io::Result<()> {
        let device_locked = is_locked(device).unwrap_or(false);
        self.mounts.lock().push(MountCall {
            device: device.to_path_buf(),
            target: target.to_path_buf(),
            fstype: fstype.to_string(),
            device_locked,
        });

        if self.fail_mount || fstype == "none" {
            return Err(errno(libc::ENODEV));
        }
        Ok(())
    }

    fn unmount(&self, target: &Path) -> io::Result<()> {
        self.unmounts.lock().push(target.to_path_buf());
        if self.fail_unmount {
            return Err(errno(libc::EBUSY));
        }
        Ok(())
    }
}

// ============================================================================
// Formatting commands
// ============================================================================

/// Command runner that records argv instead of executing.
#[derive(Default)]
pub struct RecordingRunner {
    fail: bool,
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, argv: &[OsString]) -> ImageResult<()> {
        let argv: Vec<String> = argv
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        self.calls.lock().push(argv.clone());

        if self.fail {
            return Err(ImageError::FormatCommand {
                command: argv.join(" "),
                status: "exit status: 1".to_string(),
                stderr: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Delegate
// ============================================================================

/// Delegate that creates device files under `dev_dir`.
pub struct FakeDelegate {
    dev_dir: PathBuf,
    fail: bool,
    pub created: Vec<(PathBuf, u64)>,
}

impl FakeDelegate {
    pub fn new(dev_dir: &Path) -> Self {
        Self {
            dev_dir: dev_dir.to_path_buf(),
            fail: false,
            created: Vec::new(),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl ImageDelegate for FakeDelegate {
    fn create_image(&mut self, name: &Path, size: u64) -> ImageResult<PathBuf> {
        if self.fail {
            return Err(ImageError::DelegateCreate("machine refused disk".into()));
        }

        let device = self
            .dev_dir
            .join(format!("vd{}", (b'a' + self.created.len() as u8) as char));
        std::fs::write(&device, b"").map_err(|e| ImageError::DelegateCreate(e.to_string()))?;
        self.created.push((name.to_path_buf(), size));
        Ok(device)
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Temporary workspace with `dev/`, `scratch/` and `images/` directories
/// plus the fakes wired into a [`HostOps`].
pub struct TestEnv {
    pub dir: TempDir,
    pub loops: Arc<FakeLoopBackend>,
    pub mounter: Arc<RecordingMounter>,
    pub runner: Arc<RecordingRunner>,
    pub retry: RetryPolicy,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> TestEnvBuilder {
        TestEnvBuilder::default()
    }

    pub fn dev_dir(&self) -> PathBuf {
        self.dir.path().join("dev")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    /// Path for an image file inside the workspace.
    pub fn image_path(&self, name: &str) -> PathBuf {
        self.dir.path().join("images").join(name)
    }

    pub fn host_ops(&self) -> HostOps {
        HostOps {
            loops: self.loops.clone(),
            mounter: self.mounter.clone(),
            runner: self.runner.clone(),
            retry: self.retry,
        }
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Configures the fakes of a [`TestEnv`].
#[derive(Default)]
pub struct TestEnvBuilder {
    loops: Option<Box<dyn FnOnce(FakeLoopBackend) -> FakeLoopBackend>>,
    mounter: Option<RecordingMounter>,
    runner: Option<RecordingRunner>,
    retry: Option<RetryPolicy>,
}

impl TestEnvBuilder {
    pub fn loops(mut self, f: impl FnOnce(FakeLoopBackend) -> FakeLoopBackend + 'static) -> Self {
        self.loops = Some(Box::new(f));
        self
    }

    pub fn mounter(mut self, mounter: RecordingMounter) -> Self {
        self.mounter = Some(mounter);
        self
    }

    pub fn runner(mut self, runner: RecordingRunner) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn build(self) -> TestEnv {
        let dir = TempDir::new().expect("failed to create temp dir");
        for sub in ["dev", "scratch", "images"] {
            std::fs::create_dir_all(dir.path().join(sub)).expect("failed to create test dirs");
        }

        let mut loops = FakeLoopBackend::new(&dir.path().join("dev"));
        if let Some(configure) = self.loops {
            loops = configure(loops);
        }

        TestEnv {
            loops: Arc::new(loops),
            mounter: Arc::new(self.mounter.unwrap_or_default()),
            runner: Arc::new(self.runner.unwrap_or_default()),
            retry: self.retry.unwrap_or_else(|| RetryPolicy::immediate(60)),
            dir,
        }
    }
}
