//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod from;
pub mod list;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::cli::output::OutputConfig;
use crate::core::global_config::GlobalConfig;
use crate::core::scheduler::WorkingSet;
use crate::error::ImgbrewError;
use crate::infra::container::ContainerRuntime;
use crate::infra::dirs::ImgbrewDirs;
use crate::infra::manifest_source::ManifestLoader;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build images in dependency order
    Build {
        /// Manifests or tags to build (`name`, `name:variant`, a path or a URL)
        tags: Vec<String>,

        /// Build every manifest in the library
        #[arg(long, conflicts_with = "tags")]
        all: bool,

        /// Also tag each image as `<namespace>/<tag>` (repeatable)
        #[arg(long = "namespace", value_name = "NS")]
        namespaces: Vec<String>,

        /// Never clone or fetch; use existing mirrors only
        #[arg(long)]
        no_network: bool,

        /// Resolve and order, but do not build
        #[arg(long)]
        dry_run: bool,

        /// Container runtime to use
        #[arg(long, value_enum)]
        runtime: Option<ContainerRuntime>,

        /// Variant assumed for base images without one
        #[arg(long, value_name = "VARIANT")]
        default_variant: Option<String>,
    },

    /// List the tags manifests define
    List {
        /// Manifests or tags to list
        tags: Vec<String>,

        /// List every manifest in the library
        #[arg(long, conflicts_with = "tags")]
        all: bool,

        /// Only the first tag of units sharing repository, ref and directory
        #[arg(long)]
        uniq: bool,
    },

    /// Print the base image of each tag
    From {
        /// Manifests or tags to inspect
        tags: Vec<String>,

        /// Inspect every manifest in the library
        #[arg(long, conflicts_with = "tags")]
        all: bool,

        /// Never clone or fetch; use existing mirrors only
        #[arg(long)]
        no_network: bool,
    },
}

/// Global flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub library: Option<PathBuf>,
    pub cache: Option<PathBuf>,
    pub output: OutputConfig,
}

/// Effective settings after merging config file and flags
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: GlobalConfig,
    pub library: PathBuf,
    pub mirrors: PathBuf,
    pub output: OutputConfig,
}

impl Settings {
    /// Load the config file and apply command-line overrides
    pub fn load(args: &GlobalArgs) -> Result<Self, ImgbrewError> {
        let dirs = ImgbrewDirs::new();
        let config_path = args.config.clone().unwrap_or_else(|| dirs.config_path());
        let config = GlobalConfig::load_from_path(&config_path)?;

        let library = args
            .library
            .clone()
            .unwrap_or_else(|| config.library_dir(&dirs));
        let mirrors = match &args.cache {
            Some(cache) => cache.join(crate::config::defaults::MIRRORS_SUBDIR),
            None => config.mirrors_dir(&dirs),
        };

        Ok(Self {
            config,
            library,
            mirrors,
            output: args.output,
        })
    }

    /// Load requested manifests into a working set
    pub async fn working_set(
        &self,
        tags: &[String],
        all: bool,
    ) -> Result<WorkingSet, ImgbrewError> {
        if tags.is_empty() && !all {
            return Err(ImgbrewError::NothingRequested);
        }
        let loader = ManifestLoader::new(&self.library);
        Ok(loader.load_working_set(tags, all).await?)
    }
}

impl Commands {
    /// Execute the command
    pub async fn run(self, args: &GlobalArgs) -> Result<ExitCode> {
        let settings = Settings::load(args)?;
        match self {
            Self::Build {
                tags,
                all,
                namespaces,
                no_network,
                dry_run,
                runtime,
                default_variant,
            } => {
                let options = build::BuildOptions {
                    tags,
                    all,
                    namespaces,
                    no_network,
                    dry_run,
                    runtime,
                    default_variant,
                };
                build::execute(&settings, options).await
            }
            Self::List { tags, all, uniq } => list::execute(&settings, &tags, all, uniq).await,
            Self::From {
                tags,
                all,
                no_network,
            } => from::execute(&settings, &tags, all, no_network).await,
        }
    }
}
