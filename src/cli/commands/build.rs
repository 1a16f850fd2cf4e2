//! Build command implementation
//!
//! Implements `imgbrew build`: resolve every requested unit's source, then
//! build in dependency order.

use anyhow::{Context, Result};
use std::process::ExitCode;

use crate::cli::commands::Settings;
use crate::core::builder::BuildExecutor;
use crate::core::mirror::SourceResolver;
use crate::core::scheduler::Scheduler;
use crate::infra::container::{ContainerRuntime, DockerBackend};
use crate::infra::git::GitBackend;

/// Build options
pub struct BuildOptions {
    /// Manifests or tags to build
    pub tags: Vec<String>,
    /// Build every library manifest
    pub all: bool,
    /// Extra namespaces; replaces the configured list when non-empty
    pub namespaces: Vec<String>,
    /// Never clone or fetch
    pub no_network: bool,
    /// Resolve and order only
    pub dry_run: bool,
    /// Container runtime override
    pub runtime: Option<ContainerRuntime>,
    /// Default variant override
    pub default_variant: Option<String>,
}

/// Execute the build command
pub async fn execute(settings: &Settings, options: BuildOptions) -> Result<ExitCode> {
    let set = settings.working_set(&options.tags, options.all).await?;

    let namespaces = if options.namespaces.is_empty() {
        settings.config.build.namespaces.clone()
    } else {
        options.namespaces
    };
    let offline = options.no_network || settings.config.network.offline;
    let default_variant = options
        .default_variant
        .unwrap_or_else(|| settings.config.default_variant().to_string());
    let runtime = options.runtime.or(settings.config.build.runtime);

    let backend = match DockerBackend::detect(runtime) {
        Ok(backend) => backend,
        // A dry run never calls the runtime
        Err(_) if options.dry_run => DockerBackend::new(ContainerRuntime::Docker),
        Err(e) => return Err(e).context("Cannot build images"),
    };

    tracing::info!(
        "Building {} tag(s) with {}",
        set.len(),
        backend.program().display()
    );

    std::fs::create_dir_all(&settings.mirrors).with_context(|| {
        format!(
            "Failed to create mirror directory {}",
            settings.mirrors.display()
        )
    })?;

    let output = settings.output;
    let mirrors = settings.mirrors.clone();
    let dry_run = options.dry_run;

    // gix's blocking transport must not run on the async runtime
    let report = tokio::task::spawn_blocking(move || {
        let vcs = GitBackend::new();
        let mut resolver = SourceResolver::new(&vcs, mirrors, offline);

        let spinner = output.spinner("Resolving sources");
        let resolved = set.resolve(&mut resolver);
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        let executor = BuildExecutor::new(&vcs, &backend)
            .with_namespaces(namespaces)
            .dry_run(dry_run);
        Scheduler::new(&vcs, executor, &default_variant)
            .run_with(&resolved, |record| output.print_record(record))
    })
    .await
    .context("Build run aborted")?;

    output.print_report(&report)?;

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
