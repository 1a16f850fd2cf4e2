//! imgbrew - Build container images from git-pinned manifests
//!
//! This library resolves manifests into build units, keeps a local mirror of
//! every source repository, and builds images so that each base image is
//! built before the images that use it.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Manifest parsing, source resolution, scheduling, execution
//! - [`infra`] - Infrastructure layer (git, container runtime, network, filesystem)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
