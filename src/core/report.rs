//! Per-unit outcomes of a build run

use serde::{Serialize, Serializer};

use crate::error::BuildError;

/// What happened to one unit at one point of the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BuildRecord {
    /// Image built (or would have been, in a dry run)
    Built {
        tag: String,
        commit: String,
        /// Namespace tags applied after the build
        extra_tags: Vec<String>,
        /// Namespace tags that could not be applied
        tag_failures: Vec<String>,
    },
    /// Sent to the back of the queue behind its base image
    Deferred {
        tag: String,
        behind: String,
        deferrals: u32,
    },
    /// Unit could not be built
    Failed {
        tag: String,
        #[serde(serialize_with = "display")]
        error: BuildError,
    },
    /// Requested but unknown
    Skipped { tag: String },
}

fn display<S: Serializer>(error: &BuildError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

impl BuildRecord {
    /// Tag the record is about
    pub fn tag(&self) -> &str {
        match self {
            Self::Built { tag, .. }
            | Self::Deferred { tag, .. }
            | Self::Failed { tag, .. }
            | Self::Skipped { tag } => tag,
        }
    }

    /// Whether this is the last record the unit will get
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Deferred { .. })
    }
}

/// Counts of final outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub built: usize,
    pub failed: usize,
    pub skipped: usize,
    pub deferrals: usize,
}

/// Every record of a run, in the order they happened
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub records: Vec<BuildRecord>,
    pub dry_run: bool,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            records: Vec::new(),
            dry_run,
        }
    }

    pub fn push(&mut self, record: BuildRecord) {
        self.records.push(record);
    }

    /// Tags in the order their images were built
    pub fn build_order(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter_map(|r| match r {
                BuildRecord::Built { tag, .. } => Some(tag.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Final record of `tag`, if it has one
    pub fn outcome(&self, tag: &str) -> Option<&BuildRecord> {
        self.records
            .iter()
            .rev()
            .find(|r| r.tag() == tag && r.is_final())
    }

    /// Any unit failed or was skipped
    pub fn has_failures(&self) -> bool {
        self.records
            .iter()
            .any(|r| matches!(r, BuildRecord::Failed { .. } | BuildRecord::Skipped { .. }))
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for record in &self.records {
            match record {
                BuildRecord::Built { .. } => summary.built += 1,
                BuildRecord::Deferred { .. } => summary.deferrals += 1,
                BuildRecord::Failed { .. } => summary.failed += 1,
                BuildRecord::Skipped { .. } => summary.skipped += 1,
            }
        }
        summary
    }
}
