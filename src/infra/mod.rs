//! Infrastructure layer
//!
//! Handles all I/O operations: network, filesystem, and external processes.
//! This module is the only place where side effects occur.

pub mod container;
pub mod dirs;
pub mod filesystem;
pub mod git;
pub mod manifest_source;
