//! imgbrew CLI - build container images from git-pinned manifests
//!
//! Entry point for the imgbrew command-line application.

use clap::Parser;
use std::process::ExitCode;

use imgbrew::cli::output::display_error;
use imgbrew::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = cli.output_config();

    // Logs go to stderr so stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(output.log_level().into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            display_error(&e);
            ExitCode::FAILURE
        }
    }
}
