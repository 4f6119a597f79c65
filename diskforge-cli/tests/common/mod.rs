#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

pub struct TestContext {
    pub cmd: Command,
    pub dir: TempDir,
}

impl TestContext {
    pub fn new_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_diskforge");
        let mut cmd = Command::new(bin_path);
        cmd.timeout(Duration::from_secs(30));
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Write an action file into the test directory.
    pub fn write_action(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("failed to write action file");
        path
    }

    pub fn image_action(&self, name: &str, size: &str, fs: &str, label: &str) -> PathBuf {
        let image = self.dir.path().join(format!("{}.img", name));
        self.write_action(
            &format!("{}.yaml", name),
            &format!(
                "action: image-file\nimagename: {}\nimagesize: {}\nfs: {}\nfsname: {}\n",
                image.display(),
                size,
                fs,
                label
            ),
        )
    }
}

pub fn diskforge() -> TestContext {
    let dir = TempDir::new().expect("failed to create temp dir");
    let bin_path = env!("CARGO_BIN_EXE_diskforge");
    let mut cmd = Command::new(bin_path);
    cmd.timeout(Duration::from_secs(30));
    cmd.env_remove("RUST_LOG");

    TestContext { cmd, dir }
}
