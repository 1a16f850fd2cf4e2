//! Global configuration management
//!
//! Reads settings from `config.toml` in the config directory. Command-line
//! flags override every value here.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::defaults;
use crate::infra::container::ContainerRuntime;
use crate::infra::dirs::ImgbrewDirs;

/// Global configuration error types
#[derive(Error, Debug)]
pub enum GlobalConfigError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    ReadError { path: String, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    ParseError { path: String, error: String },
}

/// Global configuration for imgbrew
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Directory overrides
    #[serde(default)]
    pub paths: PathsConfig,

    /// Build behaviour
    #[serde(default)]
    pub build: BuildConfig,

    /// Network access
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Directory overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Manifest library directory
    pub library: Option<PathBuf>,

    /// Cache directory holding repository mirrors
    pub cache: Option<PathBuf>,
}

/// Build behaviour
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Namespaces every built image is also tagged into
    #[serde(default)]
    pub namespaces: Vec<String>,

    /// Variant assumed for unqualified base images
    pub default_variant: Option<String>,

    /// Container runtime to use instead of auto-detection
    pub runtime: Option<ContainerRuntime>,
}

/// Network access
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Never clone or fetch
    #[serde(default)]
    pub offline: bool,
}

impl GlobalConfig {
    /// Load configuration from a specific path
    ///
    /// A missing file yields the default configuration; an invalid one is an
    /// error.
    pub fn load_from_path(path: &Path) -> Result<Self, GlobalConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| GlobalConfigError::ReadError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| GlobalConfigError::ParseError {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Effective library directory
    ///
    /// `IMGBREW_LIBRARY` wins over `paths.library`, which wins over the
    /// platform default.
    #[must_use]
    pub fn library_dir(&self, dirs: &ImgbrewDirs) -> PathBuf {
        let configured = self.paths.library.clone();
        let library = dirs.library_override().or(configured);
        library.unwrap_or_else(|| dirs.library_dir())
    }

    /// Effective mirror root, with the same precedence as [`Self::library_dir`]
    #[must_use]
    pub fn mirrors_dir(&self, dirs: &ImgbrewDirs) -> PathBuf {
        let configured = self.paths.cache.clone();
        let cache = dirs.cache_override().or(configured);
        cache
            .unwrap_or_else(|| dirs.cache_dir())
            .join(defaults::MIRRORS_SUBDIR)
    }

    /// Effective default variant
    #[must_use]
    pub fn default_variant(&self) -> &str {
        self.build
            .default_variant
            .as_deref()
            .unwrap_or(defaults::DEFAULT_VARIANT)
    }
}
