//! Build execution
//!
//! Turns one schedulable unit into an image: pin the mirror's working tree
//! to the unit's commit, normalize timestamps, build, then add namespace tags.

use std::path::Path;

use crate::core::backend::{ContainerBackend, SourceControl};
use crate::core::manifest::BuildUnit;
use crate::core::mirror::ResolvedSource;
use crate::core::report::BuildRecord;
use crate::error::{BuildError, TagApplyError};
use crate::infra::filesystem;

/// Runs builds for units the scheduler releases
pub struct BuildExecutor<'a, V: ?Sized, B: ?Sized> {
    vcs: &'a V,
    backend: &'a B,
    namespaces: Vec<String>,
    dry_run: bool,
}

impl<'a, V, B> BuildExecutor<'a, V, B>
where
    V: SourceControl + ?Sized,
    B: ContainerBackend + ?Sized,
{
    pub fn new(vcs: &'a V, backend: &'a B) -> Self {
        Self {
            vcs,
            backend,
            namespaces: Vec::new(),
            dry_run: false,
        }
    }

    /// Namespaces every built image is also tagged into
    #[must_use]
    pub fn with_namespaces(mut self, namespaces: Vec<String>) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Resolve only; never touch the working tree or the backend
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Build one unit and report the outcome
    pub fn execute(&self, unit: &BuildUnit, source: &ResolvedSource) -> BuildRecord {
        match self.try_execute(unit, source) {
            Ok((extra_tags, tag_failures)) => BuildRecord::Built {
                tag: unit.tag.clone(),
                commit: source.commit.clone(),
                extra_tags,
                tag_failures,
            },
            Err(error) => BuildRecord::Failed {
                tag: unit.tag.clone(),
                error,
            },
        }
    }

    fn try_execute(
        &self,
        unit: &BuildUnit,
        source: &ResolvedSource,
    ) -> Result<(Vec<String>, Vec<String>), BuildError> {
        let invalid_ref = || BuildError::InvalidRef {
            tag: unit.tag.clone(),
            reference: unit.commit_ref.clone(),
        };
        let commit = self
            .vcs
            .resolve_commit(&source.path, &source.commit)
            .map_err(|_| invalid_ref())?
            .ok_or_else(invalid_ref)?;

        if self.dry_run {
            tracing::info!("Would build {} from {commit}", unit.tag);
            return Ok((Vec::new(), Vec::new()));
        }

        let materialize_err = |path: &Path, error: String| BuildError::Materialize {
            path: path.to_path_buf(),
            commit: commit.clone(),
            error,
        };

        tracing::debug!("Checking out {commit} in {}", source.path.display());
        self.vcs
            .materialize(&source.path, &commit)
            .map_err(|e| materialize_err(&source.path, e.to_string()))?;

        let context = if unit.subdirectory.is_empty() {
            source.path.clone()
        } else {
            source.path.join(&unit.subdirectory)
        };
        if !context.is_dir() {
            return Err(materialize_err(
                &context,
                "build context is not a directory".to_string(),
            ));
        }

        let timestamp = self
            .vcs
            .commit_timestamp(&source.path, &commit)
            .map_err(|e| materialize_err(&source.path, e.to_string()))?;
        filesystem::normalize_mtimes(&context, timestamp)
            .map_err(|e| materialize_err(&context, e.to_string()))?;

        tracing::info!("Building {} from {}", unit.tag, context.display());
        self.backend
            .build(&context, &unit.tag)
            .map_err(|e| BuildError::Backend {
                tag: unit.tag.clone(),
                output: e.to_string(),
            })?;

        let mut extra_tags = Vec::new();
        let mut tag_failures = Vec::new();
        for namespace in &self.namespaces {
            let target = format!("{namespace}/{}", unit.tag);
            match self.backend.tag(&unit.tag, &target) {
                Ok(()) => extra_tags.push(target),
                Err(e) => {
                    let failure = TagApplyError {
                        source_tag: unit.tag.clone(),
                        target_tag: target,
                        error: e.to_string(),
                    };
                    tracing::warn!("{failure}");
                    tag_failures.push(failure.to_string());
                }
            }
        }

        Ok((extra_tags, tag_failures))
    }
}
