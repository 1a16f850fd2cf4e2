//! From command implementation
//!
//! Implements `imgbrew from`: resolve each unit's mirror and print the base
//! image its Dockerfile starts from. Working trees are never touched.

use anyhow::{Context, Result};
use serde::Serialize;
use std::process::ExitCode;

use crate::cli::commands::Settings;
use crate::cli::output::status;
use crate::core::backend::SourceControl;
use crate::core::dockerfile::read_base_image;
use crate::core::mirror::SourceResolver;
use crate::core::scheduler::ResolvedSet;
use crate::infra::git::GitBackend;

/// Base image of one tag, or why it is unknown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseImage {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Execute the from command
pub async fn execute(
    settings: &Settings,
    tags: &[String],
    all: bool,
    no_network: bool,
) -> Result<ExitCode> {
    let set = settings.working_set(tags, all).await?;
    let offline = no_network || settings.config.network.offline;
    let default_variant = settings.config.default_variant().to_string();
    let mirrors = settings.mirrors.clone();
    let output = settings.output;

    std::fs::create_dir_all(&mirrors)
        .with_context(|| format!("Failed to create mirror directory {}", mirrors.display()))?;

    let bases = tokio::task::spawn_blocking(move || {
        let vcs = GitBackend::new();
        let mut resolver = SourceResolver::new(&vcs, mirrors, offline);
        let spinner = output.spinner("Resolving sources");
        let resolved = set.resolve(&mut resolver);
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }
        base_images(&vcs, &resolved, &default_variant)
    })
    .await
    .context("Base image lookup aborted")?;

    if output.json {
        output.print_json(&bases)?;
    } else if !output.quiet {
        for base in &bases {
            match (&base.from, &base.error) {
                (Some(from), _) => println!("{}: {from}", base.tag),
                (None, Some(error)) => println!("{} {}: {error}", status::ERROR, base.tag),
                (None, None) => {}
            }
        }
    }

    Ok(if bases.iter().any(|b| b.error.is_some()) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Base image of every queued tag, in queue order
pub fn base_images<V: SourceControl + ?Sized>(
    vcs: &V,
    resolved: &ResolvedSet,
    default_variant: &str,
) -> Vec<BaseImage> {
    resolved
        .queue()
        .iter()
        .map(|tag| {
            let result = match resolved.get(tag) {
                None => Err("unknown tag".to_string()),
                Some(prepared) => match &prepared.source {
                    Err(e) => Err(e.to_string()),
                    Ok(source) => read_base_image(vcs, &prepared.unit, source, default_variant)
                        .map_err(|e| e.to_string()),
                },
            };
            match result {
                Ok(from) => BaseImage {
                    tag: tag.clone(),
                    from: Some(from),
                    error: None,
                },
                Err(error) => BaseImage {
                    tag: tag.clone(),
                    from: None,
                    error: Some(error),
                },
            }
        })
        .collect()
}
