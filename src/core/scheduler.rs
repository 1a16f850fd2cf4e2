//! Build ordering
//!
//! Units are built in declaration order, except that a unit whose base image
//! is still waiting in the queue is sent to the back. Deferral is the only
//! reordering; there is no up-front dependency graph.
//!
//! A run ends when the queue is empty, or when every pending unit has been
//! deferred once since anything else happened. At that point nothing can
//! change any more, so the remaining units sit on a dependency cycle (or
//! wait on one) and are all failed.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::core::backend::{ContainerBackend, SourceControl};
use crate::core::builder::BuildExecutor;
use crate::core::dockerfile::read_base_image;
use crate::core::manifest::BuildUnit;
use crate::core::mirror::{ResolvedSource, SourceResolver};
use crate::core::report::{BuildRecord, RunReport};
use crate::error::{BuildError, ResolveError};

/// Tags requested for a run, in the order they were requested
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    queue: Vec<String>,
    units: HashMap<String, BuildUnit>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a unit. The first definition of a tag wins; later ones are
    /// ignored and `false` is returned.
    pub fn add_unit(&mut self, unit: BuildUnit) -> bool {
        if self.units.contains_key(&unit.tag) {
            tracing::warn!(
                "Duplicate definition of {} ({}@{}) ignored",
                unit.tag,
                unit.repository_url,
                unit.commit_ref
            );
            return false;
        }
        if !self.queue.contains(&unit.tag) {
            self.queue.push(unit.tag.clone());
        }
        self.units.insert(unit.tag.clone(), unit);
        true
    }

    /// Queue a requested tag that no manifest defines
    pub fn add_unknown(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.queue.contains(&tag) {
            self.queue.push(tag);
        }
    }

    /// Queued tags in order
    pub fn queue(&self) -> &[String] {
        &self.queue
    }

    /// Known units in queue order
    pub fn units(&self) -> impl Iterator<Item = &BuildUnit> {
        self.queue.iter().filter_map(|tag| self.units.get(tag))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Resolve every known unit's source through `resolver`
    ///
    /// Failures are kept per unit; the scheduler turns them into `Failed`
    /// records when the unit reaches the front of the queue.
    pub fn resolve<V: SourceControl + ?Sized>(
        self,
        resolver: &mut SourceResolver<'_, V>,
    ) -> ResolvedSet {
        let mut entries = HashMap::with_capacity(self.units.len());
        for tag in &self.queue {
            let Some(unit) = self.units.get(tag) else {
                continue;
            };
            let source = resolver.ensure(&unit.repository_url, &unit.commit_ref);
            match &source {
                Ok(s) => tracing::debug!("{tag} -> {} at {}", s.commit, s.path.display()),
                Err(e) => tracing::warn!("{tag}: {e}"),
            }
            entries.insert(
                tag.clone(),
                PreparedUnit {
                    unit: unit.clone(),
                    source,
                },
            );
        }
        ResolvedSet {
            queue: self.queue,
            entries,
        }
    }
}

/// A unit together with the outcome of resolving its source
#[derive(Debug, Clone)]
pub struct PreparedUnit {
    pub unit: BuildUnit,
    pub source: Result<ResolvedSource, ResolveError>,
}

/// A working set after source resolution, ready to schedule
#[derive(Debug, Clone, Default)]
pub struct ResolvedSet {
    queue: Vec<String>,
    entries: HashMap<String, PreparedUnit>,
}

impl ResolvedSet {
    /// Queued tags in order
    pub fn queue(&self) -> &[String] {
        &self.queue
    }

    /// Resolution outcome of `tag`, `None` for unknown tags
    pub fn get(&self, tag: &str) -> Option<&PreparedUnit> {
        self.entries.get(tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueEntry {
    tag: String,
    deferrals: u32,
}

enum Step {
    Done(BuildRecord),
    Defer { behind: String },
}

/// Orders builds and hands each ready unit to the executor
pub struct Scheduler<'a, V: ?Sized, B: ?Sized> {
    vcs: &'a V,
    executor: BuildExecutor<'a, V, B>,
    default_variant: String,
}

impl<'a, V, B> Scheduler<'a, V, B>
where
    V: SourceControl + ?Sized,
    B: ContainerBackend + ?Sized,
{
    /// `default_variant` completes unqualified base images before they are
    /// compared with queued tags
    pub fn new(vcs: &'a V, executor: BuildExecutor<'a, V, B>, default_variant: &str) -> Self {
        Self {
            vcs,
            executor,
            default_variant: default_variant.to_string(),
        }
    }

    /// Run the whole queue
    pub fn run(&self, set: &ResolvedSet) -> RunReport {
        self.run_with(set, |_| {})
    }

    /// Run the whole queue, handing every record to `on_record` as it happens
    pub fn run_with(
        &self,
        set: &ResolvedSet,
        mut on_record: impl FnMut(&BuildRecord),
    ) -> RunReport {
        let mut report = RunReport::new(self.executor.is_dry_run());
        let mut queue: VecDeque<QueueEntry> = set
            .queue()
            .iter()
            .map(|tag| QueueEntry {
                tag: tag.clone(),
                deferrals: 0,
            })
            .collect();
        let mut pending: HashSet<String> = set.queue().iter().cloned().collect();
        let mut bases: HashMap<String, String> = HashMap::new();
        let mut stalled = 0usize;

        while let Some(mut entry) = queue.pop_front() {
            pending.remove(&entry.tag);

            match self.step(&entry.tag, set, &pending, &mut bases) {
                Step::Done(record) => {
                    stalled = 0;
                    log_record(&record);
                    on_record(&record);
                    report.push(record);
                }
                Step::Defer { behind } => {
                    entry.deferrals += 1;
                    let record = BuildRecord::Deferred {
                        tag: entry.tag.clone(),
                        behind,
                        deferrals: entry.deferrals,
                    };
                    log_record(&record);
                    on_record(&record);
                    report.push(record);

                    pending.insert(entry.tag.clone());
                    queue.push_back(entry);
                    stalled += 1;

                    if stalled >= queue.len() {
                        for record in fail_stalled(queue.drain(..), &bases) {
                            log_record(&record);
                            on_record(&record);
                            report.push(record);
                        }
                    }
                }
            }
        }

        report
    }

    fn step(
        &self,
        tag: &str,
        set: &ResolvedSet,
        pending: &HashSet<String>,
        bases: &mut HashMap<String, String>,
    ) -> Step {
        let Some(prepared) = set.get(tag) else {
            return Step::Done(BuildRecord::Skipped {
                tag: tag.to_string(),
            });
        };
        let source = match &prepared.source {
            Ok(source) => source,
            Err(e) => {
                return Step::Done(BuildRecord::Failed {
                    tag: tag.to_string(),
                    error: BuildError::Resolve(e.clone()),
                })
            }
        };

        let base = if let Some(base) = bases.get(tag) {
            base.clone()
        } else {
            match read_base_image(self.vcs, &prepared.unit, source, &self.default_variant) {
                Ok(base) => {
                    bases.insert(tag.to_string(), base.clone());
                    base
                }
                Err(error) => {
                    return Step::Done(BuildRecord::Failed {
                        tag: tag.to_string(),
                        error,
                    })
                }
            }
        };

        if pending.contains(&base) {
            return Step::Defer { behind: base };
        }
        Step::Done(self.executor.execute(&prepared.unit, source))
    }
}

/// Fail every stalled entry, naming the cycle its base chain runs into
fn fail_stalled(
    stalled: impl Iterator<Item = QueueEntry>,
    bases: &HashMap<String, String>,
) -> Vec<BuildRecord> {
    let entries: Vec<QueueEntry> = stalled.collect();
    let tags: HashSet<&str> = entries.iter().map(|e| e.tag.as_str()).collect();

    entries
        .iter()
        .map(|entry| BuildRecord::Failed {
            tag: entry.tag.clone(),
            error: BuildError::DependencyCycle {
                cycle: find_cycle(&entry.tag, bases, &tags),
            },
        })
        .collect()
}

/// Follow base images from `start` through `stalled` until a tag repeats
///
/// Returns the loop itself, closed with its first tag (`a -> b -> a`). A unit
/// that only waits on a cycle gets the cycle it waits on.
fn find_cycle(
    start: &str,
    bases: &HashMap<String, String>,
    stalled: &HashSet<&str>,
) -> Vec<String> {
    let mut path: Vec<String> = Vec::new();
    let mut current = start.to_string();

    loop {
        if let Some(pos) = path.iter().position(|t| *t == current) {
            let mut cycle = path.split_off(pos);
            cycle.push(current);
            return cycle;
        }
        path.push(current.clone());
        match bases.get(&current) {
            Some(next) if stalled.contains(next.as_str()) => current = next.clone(),
            _ => return path,
        }
    }
}

fn log_record(record: &BuildRecord) {
    match record {
        BuildRecord::Built { tag, commit, .. } => tracing::info!("Built {tag} ({commit})"),
        BuildRecord::Deferred {
            tag,
            behind,
            deferrals,
        } => tracing::info!("Deferring {tag} behind {behind} ({deferrals})"),
        BuildRecord::Failed { tag, error } => tracing::error!("{tag}: {error}"),
        BuildRecord::Skipped { tag } => tracing::warn!("Skipping unknown tag {tag}"),
    }
}
