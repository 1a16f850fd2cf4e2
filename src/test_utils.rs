//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Generate a valid manifest variant name
    pub fn variant() -> impl Strategy<Value = String> {
        "[a-z0-9][a-z0-9._-]{0,15}"
    }

    /// Generate a full 40-character commit SHA
    pub fn commit_sha() -> impl Strategy<Value = String> {
        "[0-9a-f]{40}"
    }

    /// Generate an HTTPS repository URL without embedded `@`
    pub fn repo_url() -> impl Strategy<Value = String> {
        (
            "[a-z]{3,10}",
            prop_oneof!["com", "org", "io"],
            "[a-z0-9-]{1,12}",
            "[a-z0-9-]{1,12}",
            any::<bool>(),
        )
            .prop_map(|(domain, tld, org, repo, dot_git)| {
                let suffix = if dot_git { ".git" } else { "" };
                format!("https://{domain}.{tld}/{org}/{repo}{suffix}")
            })
    }
}

/// In-memory stand-ins for the git and container backends
#[cfg(test)]
pub mod fakes {
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use std::path::{Path, PathBuf};

    use crate::core::backend::{ContainerBackend, SourceControl};
    use crate::infra::container::ContainerError;
    use crate::infra::git::GitError;

    #[derive(Debug, Clone, Default)]
    struct FakeCommit {
        files: Vec<(String, String)>,
        timestamp: i64,
    }

    /// Repository content: commits addressed by hash plus named refs
    #[derive(Debug, Clone, Default)]
    pub struct FakeRepo {
        commits: HashMap<String, FakeCommit>,
        refs: HashMap<String, String>,
    }

    impl FakeRepo {
        /// Add a commit with the given files
        pub fn add_commit(&mut self, commit: &str, files: &[(&str, &str)], timestamp: i64) {
            self.commits.insert(
                commit.to_string(),
                FakeCommit {
                    files: files
                        .iter()
                        .map(|(p, c)| ((*p).to_string(), (*c).to_string()))
                        .collect(),
                    timestamp,
                },
            );
        }

        /// Point a branch or tag at a commit
        pub fn add_ref(&mut self, name: &str, commit: &str) {
            self.refs.insert(name.to_string(), commit.to_string());
        }

        fn resolve(&self, reference: &str) -> Option<String> {
            if self.commits.contains_key(reference) {
                return Some(reference.to_string());
            }
            self.refs.get(reference).cloned()
        }
    }

    #[derive(Debug, Default)]
    struct VcsState {
        remotes: HashMap<String, FakeRepo>,
        mirrors: HashMap<PathBuf, (String, FakeRepo)>,
        calls: Vec<(String, String)>,
    }

    /// Version control backed by in-memory repositories
    ///
    /// Clones create a real directory so the resolver sees the mirror on
    /// disk, and materializing writes the commit's files into it.
    #[derive(Debug, Default)]
    pub struct FakeVcs {
        state: RefCell<VcsState>,
    }

    impl FakeVcs {
        pub fn new() -> Self {
            Self::default()
        }

        /// Serve `repo` at `url`
        #[must_use]
        pub fn with_remote(self, url: &str, repo: FakeRepo) -> Self {
            self.state
                .borrow_mut()
                .remotes
                .insert(url.to_string(), repo);
            self
        }

        /// Add a commit upstream after mirrors were cloned
        pub fn push_remote_commit(&self, url: &str, commit: &str, files: &[(&str, &str)]) {
            self.state
                .borrow_mut()
                .remotes
                .entry(url.to_string())
                .or_default()
                .add_commit(commit, files, 0);
        }

        /// Number of calls of one operation
        pub fn count(&self, op: &str) -> usize {
            self.state
                .borrow()
                .calls
                .iter()
                .filter(|(name, _)| name == op)
                .count()
        }

        fn record(&self, op: &str, arg: impl Into<String>) {
            self.state
                .borrow_mut()
                .calls
                .push((op.to_string(), arg.into()));
        }

        fn mirror(&self, repo: &Path) -> Result<FakeRepo, GitError> {
            self.state
                .borrow()
                .mirrors
                .get(repo)
                .map(|(_, r)| r.clone())
                .ok_or_else(|| GitError::InvalidRepository {
                    path: repo.to_path_buf(),
                    error: "not a fake mirror".to_string(),
                })
        }

        fn commit(&self, repo: &Path, commit: &str) -> Result<FakeCommit, GitError> {
            self.mirror(repo)?
                .commits
                .get(commit)
                .cloned()
                .ok_or_else(|| GitError::ReadFailed {
                    repo: repo.to_path_buf(),
                    object: commit.to_string(),
                    error: "no such commit".to_string(),
                })
        }
    }

    impl SourceControl for FakeVcs {
        fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
            self.record("clone", url);
            let remote = self.state.borrow().remotes.get(url).cloned().ok_or_else(|| {
                GitError::CloneFailed {
                    url: url.to_string(),
                    error: "repository not found".to_string(),
                }
            })?;
            std::fs::create_dir_all(dest).map_err(|e| GitError::IoError {
                path: dest.to_path_buf(),
                error: e.to_string(),
            })?;
            self.state
                .borrow_mut()
                .mirrors
                .insert(dest.to_path_buf(), (url.to_string(), remote));
            Ok(())
        }

        fn fetch_all(&self, repo: &Path) -> Result<(), GitError> {
            self.record("fetch", repo.display().to_string());
            let mut state = self.state.borrow_mut();
            let url = state
                .mirrors
                .get(repo)
                .map(|(url, _)| url.clone())
                .ok_or_else(|| GitError::InvalidRepository {
                    path: repo.to_path_buf(),
                    error: "not a fake mirror".to_string(),
                })?;
            let remote = state.remotes.get(&url).cloned().unwrap_or_default();
            state.mirrors.insert(repo.to_path_buf(), (url, remote));
            Ok(())
        }

        fn resolve_commit(
            &self,
            repo: &Path,
            reference: &str,
        ) -> Result<Option<String>, GitError> {
            Ok(self.mirror(repo)?.resolve(reference))
        }

        fn materialize(&self, repo: &Path, commit: &str) -> Result<(), GitError> {
            self.record("materialize", commit);
            let fake = self.commit(repo, commit)?;
            let io = |e: std::io::Error| GitError::IoError {
                path: repo.to_path_buf(),
                error: e.to_string(),
            };
            for entry in std::fs::read_dir(repo).map_err(io)? {
                let path = entry.map_err(io)?.path();
                if path.is_dir() {
                    std::fs::remove_dir_all(&path).map_err(io)?;
                } else {
                    std::fs::remove_file(&path).map_err(io)?;
                }
            }
            for (file, contents) in &fake.files {
                let path = repo.join(file);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(io)?;
                }
                std::fs::write(&path, contents).map_err(io)?;
            }
            Ok(())
        }

        fn read_file(
            &self,
            repo: &Path,
            commit: &str,
            path: &str,
        ) -> Result<Option<Vec<u8>>, GitError> {
            self.record("read_file", format!("{commit}:{path}"));
            Ok(self
                .commit(repo, commit)?
                .files
                .iter()
                .find(|(p, _)| p == path)
                .map(|(_, c)| c.clone().into_bytes()))
        }

        fn commit_timestamp(&self, repo: &Path, commit: &str) -> Result<i64, GitError> {
            Ok(self.commit(repo, commit)?.timestamp)
        }

        fn disable_gc(&self, repo: &Path) -> Result<(), GitError> {
            self.record("disable_gc", repo.display().to_string());
            Ok(())
        }
    }

    /// Container backend that records builds instead of running them
    #[derive(Debug, Default)]
    pub struct FakeBackend {
        builds: RefCell<Vec<(String, PathBuf)>>,
        tags: RefCell<Vec<(String, String)>>,
        failing_builds: HashSet<String>,
        failing_tags: HashSet<String>,
    }

    impl FakeBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make the build of `tag` fail
        #[must_use]
        pub fn failing_build(mut self, tag: &str) -> Self {
            self.failing_builds.insert(tag.to_string());
            self
        }

        /// Make tagging as `new_tag` fail
        #[must_use]
        pub fn failing_tag(mut self, new_tag: &str) -> Self {
            self.failing_tags.insert(new_tag.to_string());
            self
        }

        /// Tags in the order they were built
        pub fn built(&self) -> Vec<String> {
            self.builds.borrow().iter().map(|(t, _)| t.clone()).collect()
        }

        /// Build contexts in the order they were built
        pub fn contexts(&self) -> Vec<PathBuf> {
            self.builds.borrow().iter().map(|(_, c)| c.clone()).collect()
        }

        /// `(existing, new)` pairs in the order they were tagged
        pub fn tagged(&self) -> Vec<(String, String)> {
            self.tags.borrow().clone()
        }
    }

    impl ContainerBackend for FakeBackend {
        fn build(&self, context: &Path, tag: &str) -> Result<(), ContainerError> {
            self.builds
                .borrow_mut()
                .push((tag.to_string(), context.to_path_buf()));
            if self.failing_builds.contains(tag) {
                return Err(ContainerError::BuildFailed {
                    tag: tag.to_string(),
                    output: "step 2/3: exit code 1".to_string(),
                });
            }
            Ok(())
        }

        fn tag(&self, existing: &str, new_tag: &str) -> Result<(), ContainerError> {
            self.tags
                .borrow_mut()
                .push((existing.to_string(), new_tag.to_string()));
            if self.failing_tags.contains(new_tag) {
                return Err(ContainerError::TagFailed {
                    existing: existing.to_string(),
                    new_tag: new_tag.to_string(),
                    output: "no such image".to_string(),
                });
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use crate::core::manifest::is_valid_variant;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_variant_generator(v in variant()) {
            prop_assert!(is_valid_variant(&v));
        }

        #[test]
        fn test_commit_sha_generator(sha in commit_sha()) {
            prop_assert_eq!(sha.len(), 40);
            prop_assert!(sha.chars().all(|c| c.is_ascii_hexdigit()));
        }

        #[test]
        fn test_repo_url_generator(url in repo_url()) {
            prop_assert!(url.starts_with("https://"));
            prop_assert!(!url.contains('@'));
        }
    }
}
