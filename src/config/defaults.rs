//! Default configuration values

/// Variant appended to unqualified base image references
pub const DEFAULT_VARIANT: &str = "latest";

/// Lines of backend output kept in a failed build's record
pub const BUILD_OUTPUT_TAIL_LINES: usize = 40;

/// Maximum number of manifest fetch attempts
pub const MAX_MANIFEST_FETCH_RETRIES: u32 = 3;

/// Base delay between manifest fetch attempts (in milliseconds)
pub const MANIFEST_FETCH_BASE_DELAY_MS: u64 = 500;

/// Subdirectory of the cache holding repository mirrors
pub const MIRRORS_SUBDIR: &str = "git";

/// Name of the configuration file in the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Largest remote manifest accepted (in bytes)
pub const MAX_MANIFEST_BYTES: usize = 1024 * 1024;
