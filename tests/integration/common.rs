//! Common test utilities.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// An isolated working area: config home, data home and current directory.
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    /// Create an empty sandbox.
    pub fn new() -> Self {
        Self { dir: TempDir::new().expect("Failed to create temp dir") }
    }

    /// Root of the sandbox; also the working directory of commands.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// `$XDG_CONFIG_HOME` of commands.
    pub fn config_home(&self) -> PathBuf {
        self.root().join("config")
    }

    /// `$XDG_DATA_HOME` of commands.
    pub fn data_home(&self) -> PathBuf {
        self.root().join("data")
    }

    /// Default snapshot directory of commands.
    pub fn artifact_dir(&self) -> PathBuf {
        self.root().join("artifact")
    }

    /// Bucket mirror root of commands.
    pub fn buckets(&self) -> PathBuf {
        self.data_home().join("hubstack").join("buckets")
    }

    /// Write the user config file.
    pub fn write_user_config(&self, yaml: &str) {
        let dir = self.config_home().join("hubstack");
        std::fs::create_dir_all(&dir).expect("Failed to create config dir");
        std::fs::write(dir.join("config.yaml"), yaml).expect("Failed to write config");
    }

    /// A `hubstack` command with a clean environment rooted in the sandbox.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("hubstack"));
        cmd.env_clear()
            .env("XDG_CONFIG_HOME", self.config_home())
            .env("XDG_DATA_HOME", self.data_home())
            .current_dir(self.root());
        cmd
    }
}
