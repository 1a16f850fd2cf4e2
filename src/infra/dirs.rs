//! Platform-specific directory management
//!
//! Provides platform-specific paths for the mirror cache, the config file and
//! the manifest library. Follows XDG Base Directory Specification on Linux
//! and standard locations on macOS.
//!
//! Environment variables override both the platform defaults and the paths
//! set in `config.toml`; command-line flags override all of them:
//! - `IMGBREW_CACHE_DIR` - Override cache directory (mirrors live here)
//! - `IMGBREW_CONFIG_DIR` - Override config directory
//! - `IMGBREW_LIBRARY` - Override manifest library directory

use std::env;
use std::path::PathBuf;

use crate::config::defaults;

/// Environment variable names for directory overrides
pub const ENV_CACHE_DIR: &str = "IMGBREW_CACHE_DIR";
pub const ENV_CONFIG_DIR: &str = "IMGBREW_CONFIG_DIR";
pub const ENV_LIBRARY_DIR: &str = "IMGBREW_LIBRARY";

/// Application name used in directory paths
const APP_NAME: &str = "imgbrew";

/// Subdirectory of the data directory holding manifests
const LIBRARY_SUBDIR: &str = "library";

/// Platform-specific directory provider for imgbrew
#[derive(Debug, Clone)]
pub struct ImgbrewDirs {
    cache_dir: PathBuf,
    config_dir: PathBuf,
    library_dir: PathBuf,
    cache_from_env: bool,
    library_from_env: bool,
}

impl ImgbrewDirs {
    /// Create a new `ImgbrewDirs` instance
    ///
    /// Checks environment variables first, then falls back to platform defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup instead of the process environment
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        };
        let cache = var(ENV_CACHE_DIR);
        let library = var(ENV_LIBRARY_DIR);

        Self {
            cache_from_env: cache.is_some(),
            library_from_env: library.is_some(),
            cache_dir: cache.unwrap_or_else(platform_cache_dir),
            config_dir: var(ENV_CONFIG_DIR).unwrap_or_else(platform_config_dir),
            library_dir: library.unwrap_or_else(platform_library_dir),
        }
    }

    /// Cache directory set through `IMGBREW_CACHE_DIR`, if any
    #[must_use]
    pub fn cache_override(&self) -> Option<PathBuf> {
        self.cache_from_env.then(|| self.cache_dir.clone())
    }

    /// Library directory set through `IMGBREW_LIBRARY`, if any
    #[must_use]
    pub fn library_override(&self) -> Option<PathBuf> {
        self.library_from_env.then(|| self.library_dir.clone())
    }

    /// Cache directory
    ///
    /// - Linux: `$XDG_CACHE_HOME/imgbrew` or `~/.cache/imgbrew`
    /// - macOS: `~/Library/Caches/imgbrew`
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone()
    }

    /// Config directory
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Default manifest library
    #[must_use]
    pub fn library_dir(&self) -> PathBuf {
        self.library_dir.clone()
    }

    /// Path to `config.toml` in the config directory
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(defaults::CONFIG_FILE)
    }
}

impl Default for ImgbrewDirs {
    fn default() -> Self {
        Self::new()
    }
}

fn platform_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|p| p.join(APP_NAME))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".cache").join(APP_NAME))
                .unwrap_or_else(|| PathBuf::from(".").join(".cache").join(APP_NAME))
        })
}

fn platform_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join(APP_NAME))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".config").join(APP_NAME))
                .unwrap_or_else(|| PathBuf::from(".").join(".config").join(APP_NAME))
        })
}

fn platform_library_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join(APP_NAME))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".local").join("share").join(APP_NAME))
                .unwrap_or_else(|| PathBuf::from(".").join(".local").join("share").join(APP_NAME))
        })
        .join(LIBRARY_SUBDIR)
}
