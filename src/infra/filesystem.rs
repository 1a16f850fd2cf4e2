//! Filesystem operations
//!
//! Build contexts are handed to the container engine with every timestamp
//! pinned to the commit time, so layer caches see the same tree no matter
//! when it was checked out.

use std::path::Path;

use filetime::FileTime;
use walkdir::WalkDir;

use crate::error::FilesystemError;

/// Set the modification and access times of `root` and everything below it
///
/// Symlinks are updated themselves and never followed. Returns the number of
/// entries touched.
pub fn normalize_mtimes(root: &Path, epoch_secs: i64) -> Result<usize, FilesystemError> {
    let time = FileTime::from_unix_time(epoch_secs, 0);
    let mut touched = 0;

    for entry in WalkDir::new(root).follow_links(false).contents_first(true) {
        let entry = entry.map_err(|e| FilesystemError::Walk {
            path: root.to_path_buf(),
            error: e.to_string(),
        })?;
        filetime::set_symlink_file_times(entry.path(), time, time).map_err(|e| {
            FilesystemError::SetTimes {
                path: entry.path().to_path_buf(),
                error: e.to_string(),
            }
        })?;
        touched += 1;
    }

    tracing::debug!("Set {touched} timestamps under {} to {epoch_secs}", root.display());
    Ok(touched)
}
