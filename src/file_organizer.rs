/// Plan execution.
///
/// The [`Executor`] applies an [`ExecutionPlan`] through a [`Mover`], the storage
/// abstraction that actually creates folders and moves files. Every run yields
/// an [`OperationRecord`] that the history store keeps for undo.
use crate::planner::{ExecutionPlan, MoveStatus};
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors a [`Mover`] reports for a single call.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("destination already exists: {0}")]
    AlreadyExists(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// Provider-side failure (quota, network, rejected request).
    #[error("remote error: {0}")]
    Remote(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage operations needed to apply and revert plans.
///
/// Paths are `/`-separated and relative to the storage root.
pub trait Mover {
    /// Creates `folder` and its parents; an existing folder is not an error.
    fn ensure_folder(&mut self, folder: &str) -> Result<(), MoveError>;

    /// Moves a file. Must not overwrite an existing destination.
    fn move_file(&mut self, source: &str, destination: &str) -> Result<(), MoveError>;

    fn exists(&self, path: &str) -> bool;
}

/// State of a recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Every planned move executed.
    Complete,
    /// Some moves failed or were never attempted.
    Partial,
    Undone,
    PartiallyUndone,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Complete => "complete",
            RecordStatus::Partial => "partial",
            RecordStatus::Undone => "undone",
            RecordStatus::PartiallyUndone => "partially_undone",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A move that succeeded (or, in a dry run, would have).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovedFile {
    pub source: String,
    pub destination: String,
    pub category: String,
}

/// A move that failed. Kept for reporting; undo never touches these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedMove {
    pub source: String,
    pub destination: String,
    pub reason: String,
}

/// Persistent outcome of one executed plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub dry_run: bool,
    pub status: RecordStatus,
    /// Executed moves, in execution order.
    pub moves: Vec<MovedFile>,
    #[serde(default)]
    pub failures: Vec<FailedMove>,
}

impl OperationRecord {
    pub fn files_moved(&self) -> usize {
        self.moves.len()
    }

    pub fn files_failed(&self) -> usize {
        self.failures.len()
    }
}

/// Builds an operation id of the form `YYYYMMDD_HHMMSS_xxxxxx`.
///
/// The suffix is six random hex characters, so ids created within the same
/// second still differ.
pub fn generate_operation_id(now: DateTime<Utc>) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", now.format("%Y%m%d_%H%M%S"), &random[..6])
}

/// Applies plans, or simulates them in dry-run mode.
#[derive(Default)]
pub struct Executor {
    dry_run: bool,
    cancel: Option<Arc<AtomicBool>>,
    progress: Option<ProgressBar>,
}

impl Executor {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    /// Stops the run before the next operation once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Advances `progress` once per attempted operation.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Runs `plan` against `mover` and returns the record of what happened.
    ///
    /// Operation statuses in `plan` are updated in place. A live run creates
    /// each destination folder once, then moves files in plan order. A failed
    /// move is recorded and the run continues; nothing is retried.
    pub fn execute(&self, plan: &mut ExecutionPlan, mover: &mut dyn Mover) -> OperationRecord {
        let now = Utc::now();
        let mut record = OperationRecord {
            id: generate_operation_id(now),
            created_at: now,
            dry_run: self.dry_run,
            status: RecordStatus::Complete,
            moves: Vec::new(),
            failures: Vec::new(),
        };

        if self.dry_run {
            for op in plan.operations.iter_mut() {
                op.status = MoveStatus::Simulated;
                record.moves.push(MovedFile {
                    source: op.source_path.clone(),
                    destination: op.destination_path(),
                    category: op.category.clone(),
                });
            }
            info!(id = %record.id, moves = record.moves.len(), "Dry run simulated");
            return record;
        }

        let mut unavailable: HashMap<&str, String> = HashMap::new();
        for folder in &plan.folders {
            if let Err(e) = mover.ensure_folder(folder) {
                warn!(folder = %folder, error = %e, "Could not create destination folder");
                unavailable.insert(folder.as_str(), e.to_string());
            }
        }

        for op in plan.operations.iter_mut() {
            if self.cancelled() {
                warn!(id = %record.id, "Run cancelled before all operations were attempted");
                break;
            }

            let destination = op.destination_path();
            let outcome = match unavailable.get(op.destination_folder.as_str()) {
                Some(reason) => Err(format!("destination folder unavailable: {}", reason)),
                None => mover.move_file(&op.source_path, &destination).map_err(|e| e.to_string()),
            };

            match outcome {
                Ok(()) => {
                    debug!(from = %op.source_path, to = %destination, "Moved file");
                    op.status = MoveStatus::Executed;
                    record.moves.push(MovedFile {
                        source: op.source_path.clone(),
                        destination,
                        category: op.category.clone(),
                    });
                }
                Err(reason) => {
                    warn!(from = %op.source_path, to = %destination, %reason, "Move failed");
                    op.status = MoveStatus::Failed;
                    op.error = Some(reason.clone());
                    record.failures.push(FailedMove {
                        source: op.source_path.clone(),
                        destination,
                        reason,
                    });
                }
            }

            if let Some(progress) = &self.progress {
                progress.inc(1);
            }
        }

        if plan.operations.iter().any(|op| op.status != MoveStatus::Executed) {
            record.status = RecordStatus::Partial;
        }

        info!(
            id = %record.id,
            moved = record.files_moved(),
            failed = record.files_failed(),
            status = %record.status,
            "Execution finished"
        );
        record
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}
