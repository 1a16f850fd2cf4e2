//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use commands::{Commands, GlobalArgs};
use output::OutputConfig;

/// imgbrew - Build container images from git-pinned manifests
///
/// Each manifest line pins an image variant to a repository commit. Images
/// are built in an order that puts every base image before the images that
/// use it.
#[derive(Parser, Debug)]
#[command(name = "imgbrew")]
#[command(author, version, about, long_about = None)]
#[command(long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("VERGEN_GIT_SHA"), ")"))]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file to use instead of the default
    #[arg(long, global = true, env = "IMGBREW_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Manifest library directory
    #[arg(long, global = true, value_name = "DIR")]
    pub library: Option<PathBuf>,

    /// Cache directory holding repository mirrors
    #[arg(long, global = true, value_name = "DIR")]
    pub cache: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Output settings derived from the global flags
    pub fn output_config(&self) -> OutputConfig {
        OutputConfig::new(self.quiet, self.json, self.verbose)
    }

    /// Execute the CLI command
    pub async fn run(self) -> Result<ExitCode> {
        let args = GlobalArgs {
            config: self.config.clone(),
            library: self.library.clone(),
            cache: self.cache.clone(),
            output: self.output_config(),
        };
        if let Some(cmd) = self.command {
            cmd.run(&args).await
        } else {
            // No subcommand provided, show help
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
