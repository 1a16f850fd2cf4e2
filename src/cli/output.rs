//! Output formatting and progress indicators
//!
//! Human-readable progress goes to stdout, one line per unit transition.
//! `--json` replaces it with a single document at the end; logs always go
//! to stderr.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::core::report::{BuildRecord, RunReport};

/// How much the CLI prints, and in which format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    pub quiet: bool,
    pub json: bool,
    pub verbose: u8,
}

impl OutputConfig {
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Default log level for the tracing subscriber
    pub fn log_level(&self) -> tracing::Level {
        match (self.quiet, self.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, _) => tracing::Level::DEBUG,
        }
    }

    /// Progress lines and spinners are shown
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.json
    }

    /// Spinner for a long operation, unless progress is hidden
    pub fn spinner(&self, message: &str) -> Option<ProgressBar> {
        self.show_progress().then(|| create_spinner(message))
    }

    /// Print one record as it happens
    pub fn print_record(&self, record: &BuildRecord) {
        if self.show_progress() {
            println!("{}", format_record(record));
        }
    }

    /// Print the end of a run: a summary, or the whole report as JSON
    pub fn print_report(&self, report: &RunReport) -> Result<()> {
        if self.json {
            return self.print_json(report);
        }
        if self.quiet {
            return Ok(());
        }

        let summary = report.summary();
        let prefix = if report.has_failures() {
            status::ERROR
        } else {
            status::SUCCESS
        };
        let built = if report.dry_run {
            "would build"
        } else {
            "built"
        };
        println!(
            "{prefix} {} {built}, {} failed, {} skipped ({} deferrals)",
            summary.built, summary.failed, summary.skipped, summary.deferrals
        );
        Ok(())
    }

    /// Print any serializable value as pretty JSON
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// One progress line for a record
pub fn format_record(record: &BuildRecord) -> String {
    match record {
        BuildRecord::Built {
            tag,
            commit,
            extra_tags,
            tag_failures,
        } => {
            let mut line = format!("{} {tag} ({})", status::SUCCESS, short_commit(commit));
            if !extra_tags.is_empty() {
                line.push_str(&format!(" also as {}", extra_tags.join(", ")));
            }
            for failure in tag_failures {
                line.push_str(&format!("\n  {} {failure}", status::WARNING));
            }
            line
        }
        BuildRecord::Deferred {
            tag,
            behind,
            deferrals,
        } => format!("{} {tag} waits for {behind} (deferral {deferrals})", status::DEFERRED),
        BuildRecord::Failed { tag, error } => format!("{} {tag}: {error}", status::ERROR),
        BuildRecord::Skipped { tag } => format!("{} {tag}: unknown tag, skipped", status::WARNING),
    }
}

fn short_commit(commit: &str) -> &str {
    commit.get(..12).unwrap_or(commit)
}

/// Print an error and its causes to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} Error: {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

/// Create a spinner for operations with unknown duration
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.blue} {msg}")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Deferred prefix
    pub const DEFERRED: &str = "↻";
}
