//! Collaborator interfaces
//!
//! The scheduling core talks to version control and the container engine
//! only through these traits. Production implementations live in
//! [`crate::infra::git`] and [`crate::infra::container`].

use std::path::Path;

use crate::infra::container::ContainerError;
use crate::infra::git::GitError;

/// Version-control operations on a local mirror
pub trait SourceControl {
    /// Clone `url` into `dest`
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError>;

    /// Fetch every branch and tag from the origin
    fn fetch_all(&self, repo: &Path) -> Result<(), GitError>;

    /// Resolve a branch, tag, or commit to a full commit hash
    ///
    /// `Ok(None)` means the ref is not present locally; fetching may help.
    fn resolve_commit(&self, repo: &Path, reference: &str) -> Result<Option<String>, GitError>;

    /// Reset, clean and check out `commit` in the working tree
    fn materialize(&self, repo: &Path, commit: &str) -> Result<(), GitError>;

    /// Read a file as stored in `commit`, without touching the working tree
    fn read_file(&self, repo: &Path, commit: &str, path: &str)
        -> Result<Option<Vec<u8>>, GitError>;

    /// Committer timestamp of `commit`, in seconds since the Unix epoch
    fn commit_timestamp(&self, repo: &Path, commit: &str) -> Result<i64, GitError>;

    /// Turn off automatic garbage collection
    fn disable_gc(&self, repo: &Path) -> Result<(), GitError>;
}

/// Container image build engine
pub trait ContainerBackend {
    /// Build `context` into an image named `tag`
    fn build(&self, context: &Path, tag: &str) -> Result<(), ContainerError>;

    /// Add `new_tag` to the image currently tagged `existing`
    fn tag(&self, existing: &str, new_tag: &str) -> Result<(), ContainerError>;
}
