//! Move planning.
//!
//! The planner walks a batch of discovered files in order, filters out files
//! that must stay where they are, classifies the rest and assigns each one a
//! conflict-free destination. The result is an [`ExecutionPlan`] that the
//! executor applies as-is.

use crate::file_category::{Categorizer, CategoryRegistry, DiagnosticSink};
use crate::file_record::{DateField, FileRecord, split_name};
use crate::path_template::{OrganizedLayout, build_path, join_path};
use chrono::{DateTime, Duration, Utc};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Highest numeric suffix tried before a name conflict is given up.
pub const MAX_SUFFIX_ATTEMPTS: u32 = 1000;

/// Filters and batch size for one run.
#[derive(Debug, Clone, Default)]
pub struct PlanLimits {
    /// Maximum number of moves per run; `None` means unlimited.
    pub max_files_per_run: Option<usize>,
    /// Normalized (`.ext`) extensions that are never moved.
    pub exclude_extensions: HashSet<String>,
    /// Glob patterns matched against the source path.
    pub exclude_patterns: Vec<Pattern>,
    pub min_age_days: u32,
}

/// Everything the planner needs besides the registry.
#[derive(Debug, Clone)]
pub struct PlanSettings {
    pub destination_root: String,
    pub template: String,
    pub date_field: DateField,
    pub limits: PlanLimits,
}

impl PlanSettings {
    pub fn new(destination_root: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            destination_root: destination_root.into(),
            template: template.into(),
            date_field: DateField::default(),
            limits: PlanLimits::default(),
        }
    }

    pub fn with_date_field(mut self, date_field: DateField) -> Self {
        self.date_field = date_field;
        self
    }

    pub fn with_limits(mut self, limits: PlanLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Builds the "already organized" matcher for these settings.
    pub fn layout(&self) -> Result<OrganizedLayout, regex::Error> {
        OrganizedLayout::new(&self.destination_root, &self.template)
    }
}

/// Why a file was left out of the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyOrganized,
    ExcludedExtension,
    ExcludedPattern,
    TooRecent,
    /// No free destination name within [`MAX_SUFFIX_ATTEMPTS`].
    NameConflict,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AlreadyOrganized => "already_organized",
            SkipReason::ExcludedExtension => "excluded_extension",
            SkipReason::ExcludedPattern => "excluded_pattern",
            SkipReason::TooRecent => "too_recent",
            SkipReason::NameConflict => "name_conflict",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single planned move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveStatus {
    Planned,
    Executed,
    Failed,
    Skipped,
    /// Dry run: everything computed, nothing moved.
    Simulated,
}

/// One file move within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveOperation {
    pub file_id: String,
    pub source_path: String,
    pub destination_folder: String,
    /// File name at the destination; carries a `(n)` suffix after a conflict.
    pub destination_name: String,
    pub category: String,
    pub score: f64,
    pub status: MoveStatus,
    /// Failure reason once the executor has tried the move.
    pub error: Option<String>,
}

impl MoveOperation {
    pub fn destination_path(&self) -> String {
        join_path([self.destination_folder.as_str(), self.destination_name.as_str()])
    }
}

/// A file the planner left in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: SkipReason,
}

/// Ordered, conflict-free moves for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Moves in discovery order.
    pub operations: Vec<MoveOperation>,
    /// Distinct destination folders, each created once.
    pub folders: BTreeSet<String>,
    pub conflicts_resolved: usize,
    pub skipped: Vec<SkippedFile>,
    /// Eligible files beyond the batch limit, left for a later run.
    pub deferred: Vec<String>,
    pub total_discovered: usize,
}

impl ExecutionPlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Aggregates the plan for reporting.
    pub fn report(&self) -> BatchReport {
        let mut skip_reasons = BTreeMap::new();
        for skipped in &self.skipped {
            *skip_reasons.entry(skipped.reason.as_str().to_string()).or_insert(0) += 1;
        }

        let mut categories = BTreeMap::new();
        for op in &self.operations {
            *categories.entry(op.category.clone()).or_insert(0) += 1;
        }

        BatchReport {
            total_discovered: self.total_discovered,
            to_move: self.operations.len(),
            to_skip: self.skipped.len(),
            deferred: self.deferred.len(),
            skip_reasons,
            categories,
            folders_needed: self.folders.len(),
            conflicts_resolved: self.conflicts_resolved,
        }
    }
}

/// Summary of a plan, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total_discovered: usize,
    pub to_move: usize,
    pub to_skip: usize,
    pub deferred: usize,
    pub skip_reasons: BTreeMap<String, usize>,
    pub categories: BTreeMap<String, usize>,
    pub folders_needed: usize,
    pub conflicts_resolved: usize,
}

/// Turns a batch of files into an [`ExecutionPlan`].
pub struct MovePlanner<'a> {
    categorizer: Categorizer<'a>,
    settings: &'a PlanSettings,
    now: DateTime<Utc>,
}

impl<'a> MovePlanner<'a> {
    pub fn new(registry: &'a CategoryRegistry, settings: &'a PlanSettings) -> Self {
        Self {
            categorizer: Categorizer::new(registry),
            settings,
            now: Utc::now(),
        }
    }

    /// Fixes the reference time used by the minimum-age filter.
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Plans moves for `files`, in order.
    ///
    /// `already_organized` decides which files are already in place; see
    /// [`OrganizedLayout`] for the usual predicate. Every classified file emits
    /// one line to `sink`.
    pub fn plan<F>(
        &self,
        files: &[FileRecord],
        already_organized: F,
        sink: &mut dyn DiagnosticSink,
    ) -> ExecutionPlan
    where
        F: Fn(&FileRecord) -> bool,
    {
        let mut plan = ExecutionPlan {
            total_discovered: files.len(),
            ..Default::default()
        };
        // Existing files occupy their paths, including ones left in place.
        let mut taken: HashSet<String> =
            files.iter().map(|f| join_path([f.path.as_str()])).collect();
        let limit = self.settings.limits.max_files_per_run;

        for file in files {
            if let Some(reason) = self.skip_reason(file, &already_organized) {
                debug!(path = %file.path, %reason, "Skipping file");
                plan.skipped.push(SkippedFile {
                    path: file.path.clone(),
                    reason,
                });
                continue;
            }

            if limit.is_some_and(|max| plan.operations.len() >= max) {
                plan.deferred.push(file.path.clone());
                continue;
            }

            let result = self.categorizer.classify(file, sink);
            let timestamp = file.timestamp(self.settings.date_field);
            let folder = join_path([
                self.settings.destination_root.as_str(),
                build_path(&result.category, timestamp, &self.settings.template).as_str(),
            ]);

            let mut destination_name = file.name.clone();
            if taken.contains(&join_path([folder.as_str(), destination_name.as_str()])) {
                match next_free_name(&taken, &folder, &file.name) {
                    Some(name) => {
                        debug!(path = %file.path, renamed = %name, "Resolved name conflict");
                        destination_name = name;
                        plan.conflicts_resolved += 1;
                    }
                    None => {
                        warn!(path = %file.path, folder = %folder, "No free destination name");
                        plan.skipped.push(SkippedFile {
                            path: file.path.clone(),
                            reason: SkipReason::NameConflict,
                        });
                        continue;
                    }
                }
            }

            taken.insert(join_path([folder.as_str(), destination_name.as_str()]));
            plan.folders.insert(folder.clone());
            plan.operations.push(MoveOperation {
                file_id: file.id.clone(),
                source_path: file.path.clone(),
                destination_folder: folder,
                destination_name,
                category: result.category,
                score: result.score,
                status: MoveStatus::Planned,
                error: None,
            });
        }

        info!(
            discovered = plan.total_discovered,
            moves = plan.operations.len(),
            skipped = plan.skipped.len(),
            deferred = plan.deferred.len(),
            folders = plan.folders.len(),
            conflicts = plan.conflicts_resolved,
            "Execution plan created"
        );
        plan
    }

    fn skip_reason<F>(&self, file: &FileRecord, already_organized: &F) -> Option<SkipReason>
    where
        F: Fn(&FileRecord) -> bool,
    {
        let limits = &self.settings.limits;

        if already_organized(file) {
            return Some(SkipReason::AlreadyOrganized);
        }
        if !file.extension.is_empty() && limits.exclude_extensions.contains(&file.extension) {
            return Some(SkipReason::ExcludedExtension);
        }
        if limits.exclude_patterns.iter().any(|p| p.matches(&file.path)) {
            return Some(SkipReason::ExcludedPattern);
        }
        if limits.min_age_days > 0 {
            let age = self.now - file.timestamp(self.settings.date_field);
            if age < Duration::days(i64::from(limits.min_age_days)) {
                return Some(SkipReason::TooRecent);
            }
        }
        None
    }
}

/// Inserts a `(n)` suffix before the extension.
///
/// ```
/// use cloudtidy::planner::suffixed_name;
///
/// assert_eq!(suffixed_name("report.pdf", 2), "report(2).pdf");
/// assert_eq!(suffixed_name("README", 3), "README(3)");
/// ```
pub fn suffixed_name(name: &str, n: u32) -> String {
    let (stem, ext) = split_name(name);
    format!("{}({}){}", stem, n, ext)
}

fn next_free_name(taken: &HashSet<String>, folder: &str, name: &str) -> Option<String> {
    (2..=MAX_SUFFIX_ATTEMPTS + 1)
        .map(|n| suffixed_name(name, n))
        .find(|candidate| !taken.contains(&join_path([folder, candidate.as_str()])))
}
