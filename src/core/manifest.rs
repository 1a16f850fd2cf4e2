//! Manifest parsing
//!
//! A manifest maps variants of one image repository to pinned sources, one
//! entry per line:
//!
//! ```text
//! # comment
//! bookworm: https://example.com/debian.git@deadbeef debian/bookworm
//! latest:   https://example.com/tools.git@v1.2
//! ```
//!
//! The manifest's name (its file name) plus the variant forms the image tag,
//! e.g. `debian:bookworm`. Parsing is pure; loading lives in
//! [`crate::infra::manifest_source`].

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::error::ManifestError;

/// Comment marker for manifest lines
const COMMENT_MARKER: char = '#';

/// One tag's worth of buildable work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildUnit {
    /// Image tag, `repository:variant`
    pub tag: String,
    /// Version-control URL of the source
    pub repository_url: String,
    /// Branch, tag, or commit to build from
    pub commit_ref: String,
    /// Build context relative to the tree root, empty for the root itself
    pub subdirectory: String,
}

/// A manifest line that was ignored because it could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    /// 1-based line number
    pub line: usize,
    /// Raw line text
    pub text: String,
    /// Why the line was skipped
    pub reason: String,
}

/// Result of parsing one manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedManifest {
    /// Units in declaration order
    pub units: Vec<BuildUnit>,
    /// Lines that were skipped with a warning
    pub skipped: Vec<SkippedLine>,
}

/// Where a manifest comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// A file name inside the library directory
    Library(String),
    /// A manifest file referenced directly
    Path(PathBuf),
    /// A manifest served over HTTP(S)
    Url(String),
}

/// A parsed command-line manifest identifier, e.g. `debian:bookworm`,
/// `./manifests/debian:bookworm` or `https://example.com/library/debian`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRequest {
    /// Where to load the manifest from
    pub source: ManifestSource,
    /// Repository part of the tags this manifest defines
    pub name: String,
    /// Single variant selected by the caller, if any
    pub variant: Option<String>,
}

impl ManifestRequest {
    /// Parse a manifest identifier
    pub fn parse(identifier: &str) -> Result<Self, ManifestError> {
        let identifier = identifier.trim();
        let invalid = |reason: &str| ManifestError::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        };

        if identifier.is_empty() {
            return Err(invalid("empty identifier"));
        }

        // The variant suffix is a ':' after the last path separator, so
        // ports in URLs are left alone.
        let last_slash = identifier.rfind('/').map_or(0, |i| i + 1);
        let (location, variant) = match identifier[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                (&identifier[..split], Some(&identifier[split + 1..]))
            }
            None => (identifier, None),
        };

        if let Some(v) = variant {
            if !is_valid_variant(v) {
                return Err(invalid("invalid variant suffix"));
            }
        }

        let name = location
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        if name.is_empty() {
            return Err(invalid("no manifest name"));
        }

        let source = if location.starts_with("https://") || location.starts_with("http://") {
            ManifestSource::Url(location.to_string())
        } else if location.contains('/') {
            ManifestSource::Path(PathBuf::from(location))
        } else {
            ManifestSource::Library(location.to_string())
        };

        Ok(Self {
            source,
            name,
            variant: variant.map(str::to_string),
        })
    }

    /// Canonical tag of the selected variant, if one was requested
    pub fn requested_tag(&self) -> Option<String> {
        self.variant.as_ref().map(|v| format!("{}:{v}", self.name))
    }
}

fn variant_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("valid variant regex"))
}

/// Check whether a string is a usable variant name
pub fn is_valid_variant(variant: &str) -> bool {
    variant_regex().is_match(variant)
}

/// Split `url@ref` into its URL and ref
///
/// The split happens at the first `@` after the scheme boundary and any
/// `user[:password]@` credentials, so `https://u:p@host/r.git@main` and
/// `git@host:org/r.git@v1` both split correctly. Returns `None` when no ref
/// is present.
pub fn split_url_ref(source: &str) -> Option<(&str, &str)> {
    let start = if let Some(i) = source.find("://") {
        let after_scheme = i + 3;
        // Credentials end at the last '@' of the authority (before the path)
        let authority_end = source[after_scheme..]
            .find('/')
            .map_or(source.len(), |p| after_scheme + p);
        source[after_scheme..authority_end]
            .rfind('@')
            .map_or(after_scheme, |p| after_scheme + p + 1)
    } else if let Some(colon) = source.find(':') {
        // scp-like `user@host:path`
        colon + 1
    } else {
        0
    };

    let at = start + source[start..].find('@')?;
    let (url, reference) = (&source[..at], &source[at + 1..]);
    if url.is_empty() || reference.is_empty() {
        return None;
    }
    Some((url, reference))
}

/// Parse one manifest line. `Ok(None)` for blank and comment lines.
fn parse_line(line: &str) -> Result<Option<(String, String, String, String)>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(COMMENT_MARKER) {
        return Ok(None);
    }

    let (variant, rest) = line
        .split_once(':')
        .ok_or_else(|| "expected '<variant>: <url>@<ref> [<subdirectory>]'".to_string())?;
    // A URL without a variant would otherwise split at its scheme
    if !rest.starts_with(char::is_whitespace) {
        return Err(format!("expected whitespace after '{variant}:'"));
    }
    let variant = variant.trim();
    if !is_valid_variant(variant) {
        return Err(format!("invalid variant '{variant}'"));
    }

    let mut fields = rest.split_whitespace();
    let source = fields
        .next()
        .ok_or_else(|| "missing repository".to_string())?;
    let subdirectory = fields.next().unwrap_or_default();
    if fields.next().is_some() {
        return Err("unexpected trailing fields".to_string());
    }

    let (url, reference) =
        split_url_ref(source).ok_or_else(|| format!("missing '@<ref>' in '{source}'"))?;

    let subdirectory = normalize_subdirectory(subdirectory)?;

    Ok(Some((
        variant.to_string(),
        url.to_string(),
        reference.to_string(),
        subdirectory,
    )))
}

/// Normalize a build-context subdirectory; it must stay inside the tree
fn normalize_subdirectory(dir: &str) -> Result<String, String> {
    if dir.starts_with('/') {
        return Err(format!("subdirectory '{dir}' must be relative"));
    }
    let parts: Vec<&str> = dir
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    if parts.contains(&"..") {
        return Err(format!("subdirectory '{dir}' escapes the source tree"));
    }
    Ok(parts.join("/"))
}

/// Parse manifest text into build units
///
/// `name` is the repository part of each tag. With `variant` set, only that
/// entry is kept. Malformed lines and repeated variants are skipped with a
/// warning; the first definition of a variant wins.
pub fn parse_manifest(name: &str, text: &str, variant: Option<&str>) -> ParsedManifest {
    let mut parsed = ParsedManifest::default();
    let mut seen = HashSet::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let mut skip = |reason: String| {
            tracing::warn!("{name}: skipping line {line_no}: {reason}");
            parsed.skipped.push(SkippedLine {
                line: line_no,
                text: raw.to_string(),
                reason,
            });
        };

        match parse_line(raw) {
            Ok(None) => {}
            Err(reason) => skip(reason),
            Ok(Some((entry_variant, repository_url, commit_ref, subdirectory))) => {
                if !seen.insert(entry_variant.clone()) {
                    skip(format!("duplicate variant '{entry_variant}', keeping the first"));
                    continue;
                }
                if variant.is_some_and(|v| v != entry_variant) {
                    continue;
                }
                parsed.units.push(BuildUnit {
                    tag: format!("{name}:{entry_variant}"),
                    repository_url,
                    commit_ref,
                    subdirectory,
                });
            }
        }
    }

    parsed
}
