//! Loop devices through the kernel's `/dev/loop-control` interface.
//!
//! See loop(4): a free index is requested from the control node, the backing
//! file descriptor is bound with `LOOP_SET_FD`, and the offset/flags are set
//! with `LOOP_SET_STATUS64`.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use diskforge_shared::constants::loopdev::CONTROL_PATH;
use diskforge_shared::{ImageError, ImageResult};
use nix::errno::Errno;

use super::{LoopBackend, LoopDevice};

/// Binding races with other `losetup` users show up as EBUSY on `LOOP_SET_FD`.
const ATTACH_ATTEMPTS: u32 = 3;

mod ioctl {
    // Request numbers from <linux/loop.h>.
    const LOOP_SET_FD: u32 = 0x4C00;
    const LOOP_CLR_FD: u32 = 0x4C01;
    const LOOP_SET_STATUS64: u32 = 0x4C04;
    const LOOP_CTL_REMOVE: u32 = 0x4C81;
    const LOOP_CTL_GET_FREE: u32 = 0x4C82;

    pub const LO_FLAGS_READ_ONLY: u32 = 1;
    pub const LO_NAME_SIZE: usize = 64;

    /// `struct loop_info64`.
    #[repr(C)]
    pub struct LoopInfo64 {
        pub lo_device: u64,
        pub lo_inode: u64,
        pub lo_rdevice: u64,
        pub lo_offset: u64,
        pub lo_sizelimit: u64,
        pub lo_number: u32,
        pub lo_encrypt_type: u32,
        pub lo_encrypt_key_size: u32,
        pub lo_flags: u32,
        pub lo_file_name: [u8; LO_NAME_SIZE],
        pub lo_crypt_name: [u8; LO_NAME_SIZE],
        pub lo_encrypt_key: [u8; 32],
        pub lo_init: [u64; 2],
    }

    nix::ioctl_none_bad!(loop_ctl_get_free, LOOP_CTL_GET_FREE);
    nix::ioctl_write_int_bad!(loop_ctl_remove, LOOP_CTL_REMOVE);
    nix::ioctl_write_int_bad!(loop_set_fd, LOOP_SET_FD);
    nix::ioctl_none_bad!(loop_clr_fd, LOOP_CLR_FD);
    nix::ioctl_write_ptr_bad!(loop_set_status64, LOOP_SET_STATUS64, LoopInfo64);
}

use ioctl::{LO_FLAGS_READ_ONLY, LO_NAME_SIZE, LoopInfo64};

impl LoopInfo64 {
    fn new(backing: &Path, offset: u64, read_only: bool) -> Self {
        let mut lo_file_name = [0u8; LO_NAME_SIZE];
        let name = backing.as_os_str().as_bytes();
        // Informational only; the kernel truncates as well.
        let len = name.len().min(LO_NAME_SIZE - 1);
        lo_file_name[..len].copy_from_slice(&name[..len]);

        Self {
            lo_device: 0,
            lo_inode: 0,
            lo_rdevice: 0,
            lo_offset: offset,
            lo_sizelimit: 0,
            lo_number: 0,
            lo_encrypt_type: 0,
            lo_encrypt_key_size: 0,
            lo_flags: if read_only { LO_FLAGS_READ_ONLY } else { 0 },
            lo_file_name,
            lo_crypt_name: [0; LO_NAME_SIZE],
            lo_encrypt_key: [0; 32],
            lo_init: [0; 2],
        }
    }
}

/// Loop device backend talking to the running kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct KernelLoopBackend;

impl KernelLoopBackend {
    pub fn new() -> Self {
        Self
    }

    fn open_control() -> io::Result<File> {
        OpenOptions::new().read(true).write(true).open(CONTROL_PATH)
    }

    fn open_device(path: &Path, read_only: bool) -> io::Result<File> {
        OpenOptions::new().read(true).write(!read_only).open(path)
    }
}

impl LoopBackend for KernelLoopBackend {
    fn attach(&self, backing: &Path, offset: u64, read_only: bool) -> ImageResult<LoopDevice> {
        let attach_err = |source: io::Error| ImageError::LoopAttach {
            path: backing.to_path_buf(),
            source,
        };

        let control = Self::open_control().map_err(attach_err)?;
        let backing_file = Self::open_device(backing, read_only).map_err(attach_err)?;

        for _ in 0..ATTACH_ATTEMPTS {
            let index = unsafe { ioctl::loop_ctl_get_free(control.as_raw_fd()) }
                .map_err(|e| attach_err(e.into()))?;
            let device = LoopDevice::new(index as u32);
            let device_file = Self::open_device(device.path(), read_only).map_err(attach_err)?;

            match unsafe { ioctl::loop_set_fd(device_file.as_raw_fd(), backing_file.as_raw_fd()) } {
                Ok(_) => {}
                Err(Errno::EBUSY) => {
                    tracing::debug!(device = %device.path().display(), "Loop device taken, retrying");
                    continue;
                }
                Err(e) => return Err(attach_err(e.into())),
            }

            let info = LoopInfo64::new(backing, offset, read_only);
            if let Err(e) = unsafe { ioctl::loop_set_status64(device_file.as_raw_fd(), &info) } {
                let _ = unsafe { ioctl::loop_clr_fd(device_file.as_raw_fd()) };
                return Err(attach_err(e.into()));
            }

            return Ok(device);
        }

        Err(attach_err(Errno::EBUSY.into()))
    }

    fn detach(&self, device: &LoopDevice) -> io::Result<()> {
        let file = Self::open_device(device.path(), true)?;
        unsafe { ioctl::loop_clr_fd(file.as_raw_fd()) }?;
        Ok(())
    }

    fn remove(&self, device: &LoopDevice) -> io::Result<()> {
        let control = Self::open_control()?;
        unsafe { ioctl::loop_ctl_remove(control.as_raw_fd(), device.index() as libc::c_int) }?;
        Ok(())
    }
}
