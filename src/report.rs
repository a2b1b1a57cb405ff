//! Per-file and per-run aggregation of diagnostics.
//!
//! Group sequences preserve encounter order so the earliest record of a group
//! is the deterministic representative for issue synthesis. Dedup scope is
//! the full run with no early cutoff.

use indexmap::IndexMap;
use std::collections::HashSet;

use crate::diagnostic::{CategoryCounts, DiagnosticRecord, Maximums};

/// All diagnostics for one path, deduplicated and grouped by tracked-issue
/// identity. Mutated only during the aggregation pass.
#[derive(Debug, Default)]
pub struct FileReport {
    pub path: String,
    groups: IndexMap<String, Vec<DiagnosticRecord>>,
    seen: HashSet<String>,
    pub counts: CategoryCounts,
    pub maximums: Maximums,
}

impl FileReport {
    pub fn new(path: String) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    /// Appends a record unless its dedup key was already seen; returns whether
    /// it was kept. Silent dropping of duplicates is a correctness
    /// requirement, not an optimization.
    pub fn push(&mut self, record: DiagnosticRecord) -> bool {
        if !self.seen.insert(record.dedup_key()) {
            return false;
        }

        self.counts.record(&record.category, record.blame.is_new);
        self.maximums.update(&record);
        self.groups
            .entry(record.group_key())
            .or_default()
            .push(record);
        true
    }

    /// Groups in encounter order; each sequence is non-empty.
    pub fn groups(&self) -> impl Iterator<Item = (&String, &Vec<DiagnosticRecord>)> {
        self.groups.iter()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// The whole analysis run. Run-wide counters always equal the elementwise sum
/// of the per-file counters; they are merged on insert, never recomputed.
#[derive(Debug, Default)]
pub struct RunReport {
    files: IndexMap<String, FileReport>,
    pub counts: CategoryCounts,
    pub maximums: Maximums,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, report: FileReport) {
        self.counts.merge(&report.counts);
        self.maximums.merge(&report.maximums);
        self.files.insert(report.path.clone(), report);
    }

    pub fn files(&self) -> impl Iterator<Item = (&String, &FileReport)> {
        self.files.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether any diagnostic was recorded against `path` this run.
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}
