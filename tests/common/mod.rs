//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use assert_fs::prelude::*;
use assert_fs::TempDir;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Isolated imgbrew environment
///
/// Library, cache and config all live in one temporary directory, so tests
/// never see the user's configuration or mirrors.
pub struct TestEnv {
    /// Temporary directory holding everything
    pub dir: TempDir,
}

impl TestEnv {
    /// Create a new environment in a temporary directory
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        dir.child("library")
            .create_dir_all()
            .expect("Failed to create library");
        dir.child("config")
            .create_dir_all()
            .expect("Failed to create config dir");
        Self { dir }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn library(&self) -> PathBuf {
        self.dir.path().join("library")
    }

    pub fn cache(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    /// Write a manifest into the library
    pub fn add_manifest(&self, name: &str, content: &str) {
        self.dir
            .child("library")
            .child(name)
            .write_str(content)
            .expect("Failed to write manifest");
    }

    /// Write `config.toml`
    pub fn write_config(&self, content: &str) {
        self.dir
            .child("config/config.toml")
            .write_str(content)
            .expect("Failed to write config");
    }

    /// Run imgbrew with `args`
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_imgbrew"))
            .current_dir(self.dir.path())
            .env("IMGBREW_CONFIG_DIR", self.dir.path().join("config"))
            .env("IMGBREW_CACHE_DIR", self.cache())
            .env("IMGBREW_LIBRARY", self.library())
            .env_remove("IMGBREW_CONFIG")
            .env_remove("RUST_LOG")
            .args(args)
            .output()
            .expect("Failed to execute imgbrew")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Whether the git binary is installed
pub fn git_available() -> bool {
    which::which("git").is_ok()
}

/// Run git in `dir` with a fixed identity and date
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .env("GIT_AUTHOR_NAME", "test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .env("GIT_AUTHOR_DATE", "2024-01-02T03:04:05+00:00")
        .env("GIT_COMMITTER_DATE", "2024-01-02T03:04:05+00:00")
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Create a repository with one commit holding a Dockerfile per
/// `(directory, base image)` pair
pub fn image_repo(dir: &Path, images: &[(&str, &str)]) -> String {
    std::fs::create_dir_all(dir).expect("Failed to create repository dir");
    git(dir, &["init", "--quiet", "--initial-branch=main"]);
    for (subdir, from) in images {
        let path = dir.join(subdir);
        std::fs::create_dir_all(&path).expect("Failed to create image dir");
        std::fs::write(path.join("Dockerfile"), format!("FROM {from}\n"))
            .expect("Failed to write Dockerfile");
    }
    git(dir, &["add", "."]);
    git(dir, &["commit", "--quiet", "-m", "images"]);
    git(dir, &["rev-parse", "HEAD"])
}

/// `file://` URL of a local repository
pub fn file_url(dir: &Path) -> String {
    format!("file://{}", dir.display())
}
