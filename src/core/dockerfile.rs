//! Base image lookup
//!
//! Finds the first `FROM` directive of a build context's Dockerfile and
//! normalizes the referenced image so it can be compared with manifest tags.

use crate::core::backend::SourceControl;
use crate::core::manifest::BuildUnit;
use crate::core::mirror::ResolvedSource;
use crate::error::BuildError;

/// Declarative build file looked up in every build context
pub const DOCKERFILE: &str = "Dockerfile";

/// The empty base image, never a dependency
pub const SCRATCH: &str = "scratch";

/// Extract the image named by the first `FROM` directive
///
/// Handles comments, `\` line continuations, case-insensitive keywords and
/// flags such as `--platform=linux/amd64`. Returns `None` when the file has
/// no `FROM`.
pub fn base_image_from_dockerfile(contents: &str) -> Option<String> {
    let mut logical = String::new();

    for line in contents.lines() {
        let trimmed = line.trim();
        // Comments and blank lines are dropped, also inside a continuation
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(continued) = trimmed.strip_suffix('\\') {
            logical.push_str(continued);
            logical.push(' ');
            continue;
        }
        logical.push_str(trimmed);

        let instruction = std::mem::take(&mut logical);
        let mut words = instruction.split_whitespace();
        if !words
            .next()
            .is_some_and(|w| w.eq_ignore_ascii_case("FROM"))
        {
            continue;
        }
        return words.find(|w| !w.starts_with("--")).map(str::to_string);
    }

    None
}

/// Normalize an image reference for comparison with manifest tags
///
/// Unqualified references get `default_variant` appended
/// (`debian` becomes `debian:latest`), the Docker Hub `library/` prefixes are
/// dropped, and digests are left untouched.
pub fn normalize_image_ref(reference: &str, default_variant: &str) -> String {
    let reference = reference.strip_prefix("docker.io/").unwrap_or(reference);
    let reference = reference.strip_prefix("library/").unwrap_or(reference);

    if reference == SCRATCH || reference.contains('@') {
        return reference.to_string();
    }

    let last_component = reference.rsplit('/').next().unwrap_or(reference);
    if last_component.contains(':') {
        reference.to_string()
    } else {
        format!("{reference}:{default_variant}")
    }
}

/// Path of a unit's Dockerfile relative to the tree root
pub fn dockerfile_path(unit: &BuildUnit) -> String {
    if unit.subdirectory.is_empty() {
        DOCKERFILE.to_string()
    } else {
        format!("{}/{DOCKERFILE}", unit.subdirectory)
    }
}

/// Normalized base image of `unit` as of its resolved commit
///
/// Reads the Dockerfile straight from the commit, so the mirror's working
/// tree is left alone.
pub fn read_base_image<V: SourceControl + ?Sized>(
    vcs: &V,
    unit: &BuildUnit,
    source: &ResolvedSource,
    default_variant: &str,
) -> Result<String, BuildError> {
    let path = dockerfile_path(unit);
    let unreadable = |error: String| BuildError::BaseImageUnreadable {
        tag: unit.tag.clone(),
        error,
    };

    let bytes = vcs
        .read_file(&source.path, &source.commit, &path)
        .map_err(|e| unreadable(e.to_string()))?
        .ok_or_else(|| unreadable(format!("no {path} in commit {}", source.commit)))?;
    let contents = String::from_utf8_lossy(&bytes);

    let image = base_image_from_dockerfile(&contents)
        .ok_or_else(|| unreadable(format!("{path} has no FROM instruction")))?;
    Ok(normalize_image_ref(&image, default_variant))
}
