//! Git operations
//!
//! Clones and inspects mirrors using the gix crate. Worktree mutation
//! (reset, clean, checkout), fetching every ref, and config writes go through
//! the `git` binary.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

use crate::core::backend::SourceControl;

/// Refspecs fetched when a ref is missing locally
const FETCH_REFSPECS: [&str; 2] = [
    "+refs/heads/*:refs/remotes/origin/*",
    "+refs/tags/*:refs/tags/*",
];

/// Git operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitError {
    /// Failed to clone repository
    #[error("Failed to clone '{url}': {error}")]
    CloneFailed { url: String, error: String },

    /// A `git` invocation failed
    #[error("'git {command}' failed in '{repo}': {error}")]
    CommandFailed {
        repo: PathBuf,
        command: String,
        error: String,
    },

    /// Object could not be read
    #[error("Failed to read '{object}' in '{repo}': {error}")]
    ReadFailed {
        repo: PathBuf,
        object: String,
        error: String,
    },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },

    /// Invalid repository
    #[error("Invalid repository at '{path}': {error}")]
    InvalidRepository { path: PathBuf, error: String },
}

/// Git backend for mirrors
#[derive(Debug, Clone)]
pub struct GitBackend {
    /// `git` executable used for worktree mutation
    git: PathBuf,
}

impl GitBackend {
    /// Create a backend using `git` from `PATH`
    pub fn new() -> Self {
        Self {
            git: PathBuf::from("git"),
        }
    }

    fn open(repo: &Path) -> Result<gix::Repository, GitError> {
        gix::open(repo).map_err(|e| GitError::InvalidRepository {
            path: repo.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Run `git -C <repo> <args>` and return stdout
    fn run(&self, repo: &Path, args: &[&str]) -> Result<String, GitError> {
        tracing::debug!("git -C {} {}", repo.display(), args.join(" "));

        let output = Command::new(&self.git)
            .arg("-C")
            .arg(repo)
            .args(args)
            .output()
            .map_err(|e| GitError::CommandFailed {
                repo: repo.to_path_buf(),
                command: args.join(" "),
                error: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                repo: repo.to_path_buf(),
                command: args.join(" "),
                error: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Full (non-shallow) clone with a checked-out main worktree
fn clone_with_gix(url: &str, dest: &Path) -> Result<(), GitError> {
    let clone_failed = |e: &dyn std::fmt::Display| GitError::CloneFailed {
        url: url.to_string(),
        error: e.to_string(),
    };

    let mut prepare = gix::prepare_clone(url, dest).map_err(|e| clone_failed(&e))?;

    let (mut checkout, _outcome) = prepare
        .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        .map_err(|e| clone_failed(&e))?;

    checkout
        .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        .map_err(|e| clone_failed(&e))?;

    Ok(())
}

impl Default for GitBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceControl for GitBackend {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GitError::IoError {
                path: parent.to_path_buf(),
                error: e.to_string(),
            })?;
        }

        let result = clone_with_gix(url, dest);
        if result.is_err() && dest.exists() {
            // A half-written clone would be mistaken for a mirror next time
            let _ = std::fs::remove_dir_all(dest);
        }
        result
    }

    fn fetch_all(&self, repo: &Path) -> Result<(), GitError> {
        let mut args = vec!["fetch", "--quiet", "--force", "origin"];
        args.extend(FETCH_REFSPECS);
        self.run(repo, &args).map(|_| ())
    }

    fn resolve_commit(&self, repo: &Path, reference: &str) -> Result<Option<String>, GitError> {
        let repository = Self::open(repo)?;

        // Remote-tracking branches first: local branches go stale after a fetch
        let candidates = [format!("refs/remotes/origin/{reference}"), reference.to_string()];
        for candidate in &candidates {
            let spec = format!("{candidate}^{{commit}}");
            if let Ok(id) = repository.rev_parse_single(spec.as_str()) {
                return Ok(Some(id.detach().to_string()));
            }
        }

        Ok(None)
    }

    fn materialize(&self, repo: &Path, commit: &str) -> Result<(), GitError> {
        self.run(repo, &["reset", "--hard", "--quiet"])?;
        self.run(repo, &["clean", "-dffxq"])?;
        self.run(repo, &["checkout", "--quiet", "--force", "--detach", commit])?;
        Ok(())
    }

    fn read_file(
        &self,
        repo: &Path,
        commit: &str,
        path: &str,
    ) -> Result<Option<Vec<u8>>, GitError> {
        let repository = Self::open(repo)?;
        let spec = format!("{commit}:{path}");

        let Ok(id) = repository.rev_parse_single(spec.as_str()) else {
            return Ok(None);
        };

        let object = id.object().map_err(|e| GitError::ReadFailed {
            repo: repo.to_path_buf(),
            object: spec.clone(),
            error: e.to_string(),
        })?;

        if object.kind != gix::object::Kind::Blob {
            return Ok(None);
        }
        Ok(Some(object.detach().data))
    }

    fn commit_timestamp(&self, repo: &Path, commit: &str) -> Result<i64, GitError> {
        let repository = Self::open(repo)?;
        let read_failed = |e: &dyn std::fmt::Display| GitError::ReadFailed {
            repo: repo.to_path_buf(),
            object: commit.to_string(),
            error: e.to_string(),
        };

        let oid = gix::ObjectId::from_hex(commit.as_bytes()).map_err(|e| read_failed(&e))?;
        let found = repository.find_commit(oid).map_err(|e| read_failed(&e))?;
        let time = found.time().map_err(|e| read_failed(&e))?;

        Ok(time.seconds)
    }

    fn disable_gc(&self, repo: &Path) -> Result<(), GitError> {
        self.run(repo, &["config", "gc.auto", "0"]).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Fixed committer date so timestamps are predictable
    const COMMIT_DATE: &str = "2024-01-02T03:04:05+00:00";
    const COMMIT_EPOCH: i64 = 1_704_164_645;

    fn git_available() -> bool {
        which::which("git").is_ok()
    }

    fn git(dir: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .current_dir(dir)
            .args(args)
            .env("GIT_AUTHOR_NAME", "test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .env("GIT_AUTHOR_DATE", COMMIT_DATE)
            .env("GIT_COMMITTER_DATE", COMMIT_DATE)
            .output()
            .expect("Failed to run git");
        assert!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Create a repository with one commit containing `app/Dockerfile`
    fn init_repo(dir: &Path) -> String {
        std::fs::create_dir_all(dir.join("app")).unwrap();
        git(dir, &["init", "--quiet", "--initial-branch=main"]);
        std::fs::write(dir.join("app/Dockerfile"), "FROM scratch\n").unwrap();
        git(dir, &["add", "."]);
        git(dir, &["commit", "--quiet", "-m", "initial"]);
        git(dir, &["tag", "v1"]);
        git(dir, &["rev-parse", "HEAD"])
    }

    #[test]
    fn test_resolve_commit_by_branch_tag_and_hash() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let head = init_repo(temp.path());
        let backend = GitBackend::new();

        for reference in ["main", "v1", head.as_str(), &head[..10]] {
            assert_eq!(
                backend.resolve_commit(temp.path(), reference).unwrap(),
                Some(head.clone()),
                "ref {reference}"
            );
        }
        assert_eq!(backend.resolve_commit(temp.path(), "nope").unwrap(), None);
    }

    #[test]
    fn test_resolve_commit_outside_repository_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = GitBackend::new().resolve_commit(temp.path(), "main");
        assert!(matches!(result, Err(GitError::InvalidRepository { .. })));
    }

    #[test]
    fn test_read_file_and_timestamp_at_commit() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let head = init_repo(temp.path());
        let backend = GitBackend::new();

        let contents = backend
            .read_file(temp.path(), &head, "app/Dockerfile")
            .unwrap();
        assert_eq!(contents.as_deref(), Some(&b"FROM scratch\n"[..]));
        assert_eq!(
            backend.read_file(temp.path(), &head, "missing").unwrap(),
            None
        );
        assert_eq!(backend.read_file(temp.path(), &head, "app").unwrap(), None);

        assert_eq!(
            backend.commit_timestamp(temp.path(), &head).unwrap(),
            COMMIT_EPOCH
        );
    }

    #[test]
    fn test_materialize_discards_local_state() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let head = init_repo(temp.path());
        let backend = GitBackend::new();

        std::fs::write(temp.path().join("app/Dockerfile"), "FROM dirty\n").unwrap();
        std::fs::write(temp.path().join("untracked.txt"), "junk").unwrap();

        backend.materialize(temp.path(), &head).unwrap();

        assert_eq!(
            std::fs::read_to_string(temp.path().join("app/Dockerfile")).unwrap(),
            "FROM scratch\n"
        );
        assert!(!temp.path().join("untracked.txt").exists());
    }

    #[test]
    fn test_clone_fetch_and_disable_gc() {
        if !git_available() {
            return;
        }
        let upstream = TempDir::new().unwrap();
        init_repo(upstream.path());
        let mirrors = TempDir::new().unwrap();
        let dest = mirrors.path().join("nested/mirror");
        let backend = GitBackend::new();

        let url = upstream.path().to_str().unwrap();
        backend.clone_repo(url, &dest).unwrap();
        assert!(backend.resolve_commit(&dest, "main").unwrap().is_some());

        // New upstream commit is only visible after a fetch
        std::fs::write(upstream.path().join("app/extra"), "x").unwrap();
        git(upstream.path(), &["add", "."]);
        git(upstream.path(), &["commit", "--quiet", "-m", "second"]);
        git(upstream.path(), &["tag", "v2"]);
        assert_eq!(backend.resolve_commit(&dest, "v2").unwrap(), None);

        backend.fetch_all(&dest).unwrap();
        assert!(backend.resolve_commit(&dest, "v2").unwrap().is_some());

        backend.disable_gc(&dest).unwrap();
        assert_eq!(git(&dest, &["config", "gc.auto"]), "0");
    }

    #[test]
    fn test_clone_invalid_source_leaves_nothing_behind() {
        let mirrors = TempDir::new().unwrap();
        let dest = mirrors.path().join("missing");
        let backend = GitBackend::new();

        let result = backend.clone_repo(
            mirrors.path().join("does-not-exist").to_str().unwrap(),
            &dest,
        );

        assert!(matches!(result, Err(GitError::CloneFailed { .. })));
        assert!(!dest.exists());
    }
}
