//! Error types for imgbrew
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::global_config::GlobalConfigError;

/// Manifest loading and parsing errors
///
/// Fatal for every unit the manifest would have defined.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest not found in the library directory
    #[error("Manifest '{name}' not found in library '{library}'")]
    NotFound { name: String, library: PathBuf },

    /// Local manifest file could not be read
    #[error("Failed to read manifest '{path}': {error}")]
    ReadFailed { path: PathBuf, error: String },

    /// Remote manifest could not be fetched
    #[error("Failed to fetch manifest '{url}': {error}")]
    FetchFailed { url: String, error: String },

    /// Identifier does not name a manifest
    #[error("Invalid manifest identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    /// `--all` needs a library directory to enumerate
    #[error("Failed to list library '{path}': {error}")]
    LibraryUnreadable { path: PathBuf, error: String },
}

/// Source tree resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Commit is missing even after fetching
    #[error("Ref '{reference}' not found in '{url}' (even after fetch)")]
    RefNotFound { url: String, reference: String },

    /// Network access needed but disabled
    #[error("Ref '{reference}' of '{url}' is not available locally and network access is disabled")]
    NoNetwork { url: String, reference: String },

    /// Clone failed
    #[error("Failed to clone '{url}': {error}")]
    CloneFailed { url: String, error: String },

    /// Fetch failed
    #[error("Failed to fetch '{url}': {error}")]
    FetchFailed { url: String, error: String },

    /// Mirror path could not be derived
    #[error("Cannot derive a mirror location for '{url}'")]
    InvalidUrl { url: String },

    /// Mirror exists but cannot be read
    #[error("Mirror at '{path}' is unusable: {error}")]
    MirrorUnusable { path: PathBuf, error: String },
}

/// Per-unit build errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Deferral made no progress
    #[error("Dependency cycle detected: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    /// Dockerfile missing or without a FROM line
    #[error("Cannot read base image of '{tag}': {error}")]
    BaseImageUnreadable { tag: String, error: String },

    /// Source could not be resolved before scheduling
    #[error("Source resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    /// Commit vanished between resolution and build
    #[error("Invalid ref '{reference}' for '{tag}'")]
    InvalidRef { tag: String, reference: String },

    /// Working tree could not be prepared
    #[error("Failed to materialize '{commit}' in '{path}': {error}")]
    Materialize {
        path: PathBuf,
        commit: String,
        error: String,
    },

    /// Container backend reported failure
    #[error("Build backend error for '{tag}': {output}")]
    Backend { tag: String, output: String },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Directory walk failed
    #[error("Failed to walk '{path}': {error}")]
    Walk { path: PathBuf, error: String },

    /// Timestamps could not be set
    #[error("Failed to set timestamps on '{path}': {error}")]
    SetTimes { path: PathBuf, error: String },
}

/// Secondary namespace tagging failed; never revokes a successful build
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to tag '{source_tag}' as '{target_tag}': {error}")]
pub struct TagApplyError {
    pub source_tag: String,
    pub target_tag: String,
    pub error: String,
}

/// Top-level imgbrew error type
///
/// Errors that stop a command before any unit is processed.
#[derive(Error, Debug)]
pub enum ImgbrewError {
    /// Configuration file could not be loaded
    #[error("Failed to load configuration: {0}")]
    Config(#[from] GlobalConfigError),

    /// Manifests could not be loaded
    #[error("Failed to load manifests: {0}")]
    Manifest(#[from] ManifestError),

    /// Neither tags nor `--all` were given
    #[error("No tags given. Name manifests or tags, or pass --all.")]
    NothingRequested,
}
