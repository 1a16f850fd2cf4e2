//! Core business logic module
//!
//! Everything here reaches git and the container engine only through the
//! traits in [`backend`].
//!
//! # Submodules
//!
//! - [`manifest`] - Manifest parsing into build units
//! - [`mirror`] - Repository mirrors and commit resolution
//! - [`dockerfile`] - Base image lookup
//! - [`scheduler`] - Build ordering with deferral
//! - [`builder`] - Build execution for a single unit
//! - [`report`] - Per-unit outcomes
//! - [`backend`] - Version control and container engine interfaces
//! - [`global_config`] - Global configuration management

pub mod backend;
pub mod builder;
pub mod dockerfile;
pub mod global_config;
pub mod manifest;
pub mod mirror;
pub mod report;
pub mod scheduler;
