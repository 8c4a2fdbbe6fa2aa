/// Operation history and undo.
///
/// Each executed run is stored as `<history_dir>/<id>.json`. Records are
/// append-only: the only field ever rewritten is the status, when a run is
/// undone.
use crate::file_organizer::{Mover, OperationRecord, RecordStatus};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Skip reason for a pair whose destination no longer holds the file.
pub const ALREADY_DIVERGED: &str = "already_diverged";

/// Errors from the history store.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("no operation with id '{0}'")]
    NotFound(String),
    #[error("operation '{0}' has already been undone")]
    AlreadyUndone(String),
    #[error("operation '{0}' was a dry run; there is nothing to undo")]
    DryRun(String),
    #[error("operation '{0}' is already recorded")]
    AlreadyRecorded(String),
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid history record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Listing entry for one recorded run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub status: RecordStatus,
    pub files_moved: usize,
    pub files_failed: usize,
    pub dry_run: bool,
}

impl From<&OperationRecord> for RecordSummary {
    fn from(record: &OperationRecord) -> Self {
        Self {
            id: record.id.clone(),
            created_at: record.created_at,
            status: record.status,
            files_moved: record.files_moved(),
            files_failed: record.files_failed(),
            dry_run: record.dry_run,
        }
    }
}

/// Represents the result of an undo operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndoReport {
    pub operation_id: String,
    /// Number of files moved back to their source.
    pub restored: usize,
    /// `(destination, reason)` for pairs that were left alone.
    pub skipped: Vec<(String, String)>,
    /// `(destination, reason)` for pairs whose move back failed.
    pub failed: Vec<(String, String)>,
    /// Status persisted on the record.
    pub status: RecordStatus,
}

impl UndoReport {
    pub fn total_processed(&self) -> usize {
        self.restored + self.failed.len() + self.skipped.len()
    }

    /// Returns true if every recorded move was reverted.
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// File-backed store of [`OperationRecord`]s.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    /// Opens the store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persists a new record.
    ///
    /// # Errors
    ///
    /// [`HistoryError::AlreadyRecorded`] if a record with this id exists.
    pub fn record(&self, record: &OperationRecord) -> Result<(), HistoryError> {
        let path = self.record_path(&record.id)?;
        let json = serde_json::to_string_pretty(record)?;

        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(HistoryError::AlreadyRecorded(record.id.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(json.as_bytes())?;

        info!(id = %record.id, moves = record.files_moved(), "Recorded operation");
        Ok(())
    }

    /// Loads one record by id.
    pub fn get(&self, id: &str) -> Result<OperationRecord, HistoryError> {
        let path = self.record_path(id)?;
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(HistoryError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&json)?)
    }

    /// Summaries of every record, newest first.
    ///
    /// Unreadable files in the directory are logged and left out.
    pub fn list(&self) -> Result<Vec<RecordSummary>, HistoryError> {
        let mut summaries: Vec<RecordSummary> = self
            .load_all()?
            .iter()
            .map(RecordSummary::from)
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(summaries)
    }

    /// Like [`list`](Self::list), restricted to records created within `days`
    /// days before `now`.
    pub fn list_within(
        &self,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecordSummary>, HistoryError> {
        let cutoff = now - Duration::days(i64::from(days));
        let mut summaries = self.list()?;
        summaries.retain(|s| s.created_at >= cutoff);
        Ok(summaries)
    }

    /// Reverts a recorded run by moving each file back.
    ///
    /// Pairs are walked in reverse order. A pair whose destination no longer
    /// exists is skipped as [`ALREADY_DIVERGED`]; a failed move back is
    /// recorded and the walk continues. The record ends up `undone` only when
    /// every pair was restored, `partially_undone` otherwise.
    ///
    /// # Errors
    ///
    /// Unknown ids, dry-run records and records that are already `undone` are
    /// rejected before anything is moved.
    pub fn undo(&self, id: &str, mover: &mut dyn Mover) -> Result<UndoReport, HistoryError> {
        let mut record = self.get(id)?;
        if record.status == RecordStatus::Undone {
            return Err(HistoryError::AlreadyUndone(id.to_string()));
        }
        if record.dry_run {
            return Err(HistoryError::DryRun(id.to_string()));
        }

        let mut report = UndoReport {
            operation_id: record.id.clone(),
            restored: 0,
            skipped: Vec::new(),
            failed: Vec::new(),
            status: RecordStatus::Undone,
        };

        for moved in record.moves.iter().rev() {
            if !mover.exists(&moved.destination) {
                debug!(path = %moved.destination, "File moved since the run; skipping");
                report
                    .skipped
                    .push((moved.destination.clone(), ALREADY_DIVERGED.to_string()));
                continue;
            }

            let restored = match parent_folder(&moved.source) {
                Some(parent) => mover.ensure_folder(parent),
                None => Ok(()),
            }
            .and_then(|()| mover.move_file(&moved.destination, &moved.source));

            match restored {
                Ok(()) => report.restored += 1,
                Err(e) => {
                    warn!(from = %moved.destination, to = %moved.source, error = %e, "Restore failed");
                    report.failed.push((moved.destination.clone(), e.to_string()));
                }
            }
        }

        if !report.is_complete_success() {
            report.status = RecordStatus::PartiallyUndone;
        }
        record.status = report.status;
        self.rewrite(&record)?;

        info!(
            id = %record.id,
            restored = report.restored,
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            status = %record.status,
            "Undo finished"
        );
        Ok(report)
    }

    /// Deletes records created more than `days` days before `now`.
    ///
    /// Returns the number of records removed.
    pub fn cleanup_older_than(&self, days: u32, now: DateTime<Utc>) -> Result<usize, HistoryError> {
        let cutoff = now - Duration::days(i64::from(days));
        let mut removed = 0;

        for record in self.load_all()? {
            if record.created_at < cutoff {
                fs::remove_file(self.record_path(&record.id)?)?;
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, days, "Cleaned up old history records");
        }
        Ok(removed)
    }

    fn load_all(&self) -> Result<Vec<OperationRecord>, HistoryError> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(HistoryError::from)
                .and_then(|json| serde_json::from_str::<OperationRecord>(&json).map_err(HistoryError::from))
            {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable history record"),
            }
        }
        Ok(records)
    }

    /// Replaces an existing record through a temporary file.
    fn rewrite(&self, record: &OperationRecord) -> Result<(), HistoryError> {
        let path = self.record_path(&record.id)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(record)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn record_path(&self, id: &str) -> Result<PathBuf, HistoryError> {
        if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(HistoryError::NotFound(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

fn parent_folder(path: &str) -> Option<&str> {
    path.rsplit_once('/')
        .map(|(parent, _)| parent)
        .filter(|parent| !parent.is_empty())
}
