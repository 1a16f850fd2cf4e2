//! Source tree resolution
//!
//! Keeps one persistent mirror per repository and makes sure it contains the
//! commit a build unit needs. Resolution is a two-stage lookup: the local
//! mirror is asked first, and only a miss triggers a fetch of every branch
//! and tag. Nothing here touches a mirror's working tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::backend::SourceControl;
use crate::error::ResolveError;

/// A repository mirror owned by the resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorHandle {
    /// Normalized repository key
    pub key: String,
    /// Location on disk
    pub path: PathBuf,
}

/// A build unit's source, pinned to a commit present in its mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Mirror location
    pub path: PathBuf,
    /// Full commit hash
    pub commit: String,
}

/// Outcome of asking a mirror for a ref
#[derive(Debug, Clone, PartialEq, Eq)]
enum Lookup {
    /// The ref resolves locally
    Present(String),
    /// The mirror lacks the ref; fetching may help
    NeedsFetch,
}

#[derive(Debug)]
struct MirrorState {
    handle: MirrorHandle,
    /// Cloned or fetched during this run, so another fetch cannot help
    fresh: bool,
}

/// Derive a filesystem-safe mirror key from a repository URL
///
/// Strips the scheme, credentials, a trailing `/` and `.git`, maps scp-style
/// `git@host:org/repo` to `host/org/repo`, and replaces characters outside
/// `[A-Za-z0-9._-]` in each path component. Returns `None` when nothing
/// usable remains or when the path contains a `..` component.
pub fn mirror_key(url: &str) -> Option<String> {
    let rest = if let Some(i) = url.find("://") {
        url[i + 3..].to_string()
    } else {
        match url.split_once(':') {
            // scp-like, as long as no '/' precedes the ':'
            Some((host, path)) if !host.contains('/') => format!("{host}/{path}"),
            _ => url.to_string(),
        }
    };

    // Credentials end at the last '@' before the first '/'
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let rest = match rest[..authority_end].rfind('@') {
        Some(at) => &rest[at + 1..],
        None => rest.as_str(),
    };

    let rest = rest.trim_end_matches('/');
    let rest = rest.strip_suffix(".git").unwrap_or(rest);

    if rest.split('/').any(|c| c == "..") {
        return None;
    }

    let components: Vec<String> = rest
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .map(|c| {
            c.chars()
                .map(|ch| {
                    if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                        ch
                    } else {
                        '_'
                    }
                })
                .collect()
        })
        .collect();

    if components.is_empty() {
        None
    } else {
        Some(components.join("/"))
    }
}

/// Sole owner and mutator of repository mirrors
pub struct SourceResolver<'v, V: SourceControl + ?Sized> {
    vcs: &'v V,
    root: PathBuf,
    offline: bool,
    mirrors: HashMap<String, MirrorState>,
}

impl<'v, V: SourceControl + ?Sized> SourceResolver<'v, V> {
    /// Create a resolver keeping mirrors under `root`
    ///
    /// With `offline` set, any clone or fetch the resolver would need becomes
    /// a [`ResolveError::NoNetwork`] for the affected unit.
    pub fn new(vcs: &'v V, root: impl Into<PathBuf>, offline: bool) -> Self {
        Self {
            vcs,
            root: root.into(),
            offline,
            mirrors: HashMap::new(),
        }
    }

    /// Mirrors touched so far
    pub fn mirrors(&self) -> impl Iterator<Item = &MirrorHandle> {
        self.mirrors.values().map(|state| &state.handle)
    }

    /// Make sure the mirror for `url` exists and contains `reference`
    ///
    /// Idempotent. Fetches at most once per mirror per resolver, and only when
    /// the ref is missing locally.
    pub fn ensure(&mut self, url: &str, reference: &str) -> Result<ResolvedSource, ResolveError> {
        let key = mirror_key(url).ok_or_else(|| ResolveError::InvalidUrl {
            url: url.to_string(),
        })?;
        let vcs = self.vcs;
        let offline = self.offline;

        if !self.mirrors.contains_key(&key) {
            let state = self.open_mirror(&key, url, reference)?;
            self.mirrors.insert(key.clone(), state);
        }
        let Some(state) = self.mirrors.get_mut(&key) else {
            return Err(ResolveError::InvalidUrl {
                url: url.to_string(),
            });
        };
        let path = state.handle.path.clone();

        if let Lookup::Present(commit) = lookup(vcs, &path, reference)? {
            return Ok(ResolvedSource { path, commit });
        }

        let not_found = || ResolveError::RefNotFound {
            url: url.to_string(),
            reference: reference.to_string(),
        };
        if state.fresh {
            return Err(not_found());
        }
        if offline {
            return Err(ResolveError::NoNetwork {
                url: url.to_string(),
                reference: reference.to_string(),
            });
        }

        tracing::info!("Fetching {url} (missing '{reference}')");
        state.fresh = true;
        vcs.fetch_all(&path).map_err(|e| ResolveError::FetchFailed {
            url: url.to_string(),
            error: e.to_string(),
        })?;

        match lookup(vcs, &path, reference)? {
            Lookup::Present(commit) => Ok(ResolvedSource { path, commit }),
            Lookup::NeedsFetch => Err(not_found()),
        }
    }

    /// First touch of a mirror during this run: clone if absent, disable gc
    fn open_mirror(
        &self,
        key: &str,
        url: &str,
        reference: &str,
    ) -> Result<MirrorState, ResolveError> {
        // The suffix keeps `host/group` from becoming the parent of `host/group/project`
        let path = self.root.join(format!("{key}.git"));
        let fresh = if path.exists() {
            false
        } else {
            if self.offline {
                return Err(ResolveError::NoNetwork {
                    url: url.to_string(),
                    reference: reference.to_string(),
                });
            }
            tracing::info!("Cloning {url} into {}", path.display());
            self.vcs
                .clone_repo(url, &path)
                .map_err(|e| ResolveError::CloneFailed {
                    url: url.to_string(),
                    error: e.to_string(),
                })?;
            true
        };

        // Later runs may need commits git would consider unreachable
        if let Err(e) = self.vcs.disable_gc(&path) {
            tracing::warn!("Could not disable gc in {}: {e}", path.display());
        }

        Ok(MirrorState {
            handle: MirrorHandle {
                key: key.to_string(),
                path,
            },
            fresh,
        })
    }
}

fn lookup<V: SourceControl + ?Sized>(
    vcs: &V,
    path: &Path,
    reference: &str,
) -> Result<Lookup, ResolveError> {
    match vcs.resolve_commit(path, reference) {
        Ok(Some(commit)) => Ok(Lookup::Present(commit)),
        Ok(None) => Ok(Lookup::NeedsFetch),
        Err(e) => Err(ResolveError::MirrorUnusable {
            path: path.to_path_buf(),
            error: e.to_string(),
        }),
    }
}
