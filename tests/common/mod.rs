use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Temporary home and store for running the binary in isolation
pub struct TestFixture {
    _temp_dir: TempDir,
    pub base_path: PathBuf,
    pub store_path: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path().to_path_buf();
        let store_path = base_path.join("store.env");
        Self {
            _temp_dir: temp_dir,
            base_path,
            store_path,
        }
    }

    pub fn write_store(&self, content: &str) {
        fs::write(&self.store_path, content).unwrap();
    }

    /// Runs envcreds with the store path supplied through the environment.
    ///
    /// Settings lookups are pointed at the fixture so the caller's own
    /// configuration never leaks in.
    pub fn run(&self, args: &[&str]) -> Output {
        self.command(args)
            .env("ENVCREDS_STORE", &self.store_path)
            .output()
            .expect("Failed to execute envcreds")
    }

    pub fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_envcreds"));
        cmd.args(args)
            .env("HOME", &self.base_path)
            .env("XDG_CONFIG_HOME", self.base_path.join("config"))
            .env("NO_COLOR", "1")
            .env("CLICOLOR", "0")
            .env_remove("RUST_LOG")
            .env_remove("ENVCREDS_STORE");
        cmd
    }

    pub fn settings_dir(&self) -> PathBuf {
        self.base_path.join("config").join("envcreds")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[allow(dead_code)]
pub fn file_len(path: &Path) -> u64 {
    fs::metadata(path).unwrap().len()
}
