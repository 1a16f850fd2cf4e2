//! List command implementation
//!
//! Implements `imgbrew list`. Nothing is cloned or built.

use anyhow::Result;
use std::collections::HashSet;
use std::process::ExitCode;

use crate::cli::commands::Settings;
use crate::core::manifest::BuildUnit;
use crate::core::mirror::mirror_key;

/// Execute the list command
pub async fn execute(
    settings: &Settings,
    tags: &[String],
    all: bool,
    uniq: bool,
) -> Result<ExitCode> {
    let set = settings.working_set(tags, all).await?;

    let mut units: Vec<&BuildUnit> = set.units().collect();
    if uniq {
        units = unique_sources(units);
    }

    let known: HashSet<&str> = set.units().map(|u| u.tag.as_str()).collect();
    let unknown: Vec<&String> = set
        .queue()
        .iter()
        .filter(|tag| !known.contains(tag.as_str()))
        .collect();
    for tag in &unknown {
        tracing::warn!("Unknown tag {tag}");
    }

    if settings.output.json {
        settings.output.print_json(&units)?;
    } else {
        for unit in &units {
            println!("{}", unit.tag);
        }
    }

    Ok(if unknown.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Keep the first unit of each (repository, ref, subdirectory) combination
fn unique_sources(units: Vec<&BuildUnit>) -> Vec<&BuildUnit> {
    let mut seen = HashSet::new();
    units
        .into_iter()
        .filter(|unit| {
            let repository = mirror_key(&unit.repository_url)
                .unwrap_or_else(|| unit.repository_url.clone());
            seen.insert((repository, unit.commit_ref.clone(), unit.subdirectory.clone()))
        })
        .collect()
}
