//! Filesystem formatting.
//!
//! The mkfs command line for each filesystem type comes from a table in
//! [`filesystem`]; running it goes through the [`CommandRunner`] seam so the
//! dispatch can be tested without the tools installed.

mod filesystem;

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use diskforge_shared::{ImageError, ImageResult};

pub use filesystem::Filesystem;

/// Runs external formatting commands.
pub trait CommandRunner {
    /// Run `argv` (program first) to completion. A non-zero exit is an error.
    fn run(&self, argv: &[OsString]) -> ImageResult<()>;
}

/// Runs commands on the host with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostCommandRunner;

fn render(argv: &[OsString]) -> String {
    argv.iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

impl CommandRunner for HostCommandRunner {
    fn run(&self, argv: &[OsString]) -> ImageResult<()> {
        let command = render(argv);
        let (program, args) = argv.split_first().ok_or_else(|| ImageError::FormatCommand {
            command: command.clone(),
            status: "not run".to_string(),
            stderr: "empty command line".to_string(),
        })?;

        tracing::debug!(%command, "Running formatting command");

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| ImageError::FormatCommand {
                command: command.clone(),
                status: "failed to spawn".to_string(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ImageError::FormatCommand {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Full argv for formatting `device`, or `None` when nothing should run.
pub fn format_command(fs: &Filesystem, label: &str, device: &Path) -> Option<Vec<OsString>> {
    let args = fs.mkfs_args(label)?;
    let mut argv: Vec<OsString> = args.into_iter().map(OsString::from).collect();
    argv.push(device.as_os_str().to_os_string());
    Some(argv)
}

/// Formats block devices with the tool matching the filesystem type.
#[derive(Clone)]
pub struct Formatter {
    runner: Arc<dyn CommandRunner>,
}

impl Formatter {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Format `device` as `fs` with volume label `label`.
    ///
    /// Returns the filesystem type all later steps must use (`hfsx` comes
    /// back as `hfsplus`). For `none` no command is run.
    pub fn format(&self, device: &Path, fs: &Filesystem, label: &str) -> ImageResult<Filesystem> {
        match format_command(fs, label, device) {
            Some(argv) => {
                tracing::info!(
                    device = %device.display(),
                    filesystem = %fs,
                    label,
                    "Formatting image"
                );
                self.runner.run(&argv)?;
            }
            None => {
                tracing::info!(device = %device.display(), "Leaving image unformatted");
            }
        }

        Ok(fs.normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Capture {
        calls: RefCell<Vec<Vec<OsString>>>,
    }

    impl CommandRunner for Capture {
        fn run(&self, argv: &[OsString]) -> ImageResult<()> {
            self.calls.borrow_mut().push(argv.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_device_appended_last() {
        let argv = format_command(&Filesystem::Vfat, "EFI", Path::new("/dev/loop0")).unwrap();
        assert_eq!(argv.last().unwrap(), "/dev/loop0");
        assert_eq!(argv.len(), 5);
    }

    #[test]
    fn test_format_none_runs_nothing() {
        let capture = Arc::new(Capture::default());
        let formatter = Formatter::new(capture.clone());

        let fs = formatter
            .format(Path::new("/dev/loop0"), &Filesystem::None, "x")
            .unwrap();

        assert_eq!(fs, Filesystem::None);
        assert!(capture.calls.borrow().is_empty());
    }

    #[test]
    fn test_format_hfsx_returns_hfsplus() {
        let capture = Arc::new(Capture::default());
        let formatter = Formatter::new(capture.clone());

        let fs = formatter
            .format(Path::new("/dev/loop1"), &Filesystem::Hfsx, "mac")
            .unwrap();

        assert_eq!(fs, Filesystem::HfsPlus);
        let calls = capture.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], "mkfs.hfsplus");
        assert_eq!(calls[0][1], "-s");
    }

    #[test]
    fn test_host_runner_reports_exit_status() {
        let argv: Vec<OsString> = ["sh", "-c", "echo boom >&2; exit 3"]
            .iter()
            .map(OsString::from)
            .collect();

        let err = HostCommandRunner.run(&argv).unwrap_err();
        match err {
            ImageError::FormatCommand { status, stderr, .. } => {
                assert!(status.contains('3'));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_host_runner_missing_program() {
        let argv = vec![OsString::from("mkfs.does-not-exist-anywhere")];
        let err = HostCommandRunner.run(&argv).unwrap_err();
        assert!(matches!(err, ImageError::FormatCommand { .. }));
    }

    #[test]
    fn test_host_runner_success() {
        let argv = vec![OsString::from("true")];
        HostCommandRunner.run(&argv).unwrap();
    }
}
