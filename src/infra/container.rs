//! Container engine access
//!
//! Drives the Docker or Podman CLI to build and tag images.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

use crate::config::defaults;
use crate::core::backend::ContainerBackend;

/// Container engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// Neither runtime is installed
    #[error("Neither Docker nor Podman found in PATH")]
    RuntimeNotFound,

    /// The runtime binary could not be started
    #[error("Failed to run '{program}': {error}")]
    SpawnFailed { program: String, error: String },

    /// `build` exited non-zero
    #[error("Image build failed for '{tag}':\n{output}")]
    BuildFailed { tag: String, output: String },

    /// `tag` exited non-zero
    #[error("Tagging '{existing}' as '{new_tag}' failed: {output}")]
    TagFailed {
        existing: String,
        new_tag: String,
        output: String,
    },
}

/// Container runtime type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    /// Docker container runtime
    Docker,
    /// Podman container runtime
    Podman,
}

impl ContainerRuntime {
    /// Get the command name for this runtime
    pub fn command(&self) -> &'static str {
        match self {
            ContainerRuntime::Docker => "docker",
            ContainerRuntime::Podman => "podman",
        }
    }

    /// Detect an installed runtime, preferring Docker
    pub fn detect() -> Option<Self> {
        [Self::Docker, Self::Podman]
            .into_iter()
            .find(|runtime| which::which(runtime.command()).is_ok())
    }
}

/// Builds images with a container runtime CLI
#[derive(Debug, Clone)]
pub struct DockerBackend {
    program: PathBuf,
}

impl DockerBackend {
    /// Create a backend for `runtime`
    pub fn new(runtime: ContainerRuntime) -> Self {
        Self {
            program: PathBuf::from(runtime.command()),
        }
    }

    /// Create a backend running an explicit executable
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Create a backend for the configured runtime, or the detected one
    pub fn detect(configured: Option<ContainerRuntime>) -> Result<Self, ContainerError> {
        configured
            .or_else(ContainerRuntime::detect)
            .map(Self::new)
            .ok_or(ContainerError::RuntimeNotFound)
    }

    /// Executable this backend runs
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn run(&self, args: &[&str], context: Option<&Path>) -> Result<(bool, String), ContainerError> {
        let mut command = Command::new(&self.program);
        command.args(args);
        if let Some(dir) = context {
            command.arg(dir);
        }
        tracing::debug!("{:?}", command);

        let output = command.output().map_err(|e| ContainerError::SpawnFailed {
            program: self.program.display().to_string(),
            error: e.to_string(),
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok((output.status.success(), combined))
    }
}

/// Last `max_lines` lines of build output
fn tail(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

impl ContainerBackend for DockerBackend {
    fn build(&self, context: &Path, tag: &str) -> Result<(), ContainerError> {
        let (success, output) = self.run(&["build", "--tag", tag], Some(context))?;
        if success {
            return Ok(());
        }
        Err(ContainerError::BuildFailed {
            tag: tag.to_string(),
            output: tail(&output, defaults::BUILD_OUTPUT_TAIL_LINES),
        })
    }

    fn tag(&self, existing: &str, new_tag: &str) -> Result<(), ContainerError> {
        let (success, output) = self.run(&["tag", existing, new_tag], None)?;
        if success {
            return Ok(());
        }
        Err(ContainerError::TagFailed {
            existing: existing.to_string(),
            new_tag: new_tag.to_string(),
            output: output.trim().to_string(),
        })
    }
}
