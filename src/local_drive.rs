//! Local filesystem storage.
//!
//! [`LocalDrive`] treats a directory as a drive: it discovers files beneath it
//! and implements [`Mover`] with plain renames. All paths it hands out or
//! accepts are `/`-separated and relative to the drive root.

use crate::file_organizer::{MoveError, Mover};
use crate::file_record::FileRecord;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("not a directory: {0}")]
    InvalidRoot(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Produces the files a run should consider.
pub trait FileSource {
    /// Lists files under `scope` (a relative folder; empty for the whole
    /// drive), sorted by path.
    fn list_files(&self, scope: &str) -> Result<Vec<FileRecord>, SourceError>;
}

/// A directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalDrive {
    root: PathBuf,
}

impl LocalDrive {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SourceError::InvalidRoot(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a relative drive path, rejecting anything that could escape the
    /// root.
    fn resolve(&self, path: &str) -> Result<PathBuf, MoveError> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || !safe {
            return Err(MoveError::PermissionDenied(format!(
                "path outside drive root: {}",
                path
            )));
        }
        Ok(self.root.join(relative))
    }

    fn relative_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn map_io(err: std::io::Error, path: &str) -> MoveError {
    match err.kind() {
        ErrorKind::NotFound => MoveError::NotFound(path.to_string()),
        ErrorKind::PermissionDenied => MoveError::PermissionDenied(path.to_string()),
        ErrorKind::AlreadyExists => MoveError::AlreadyExists(path.to_string()),
        _ => MoveError::Io(err),
    }
}

impl FileSource for LocalDrive {
    fn list_files(&self, scope: &str) -> Result<Vec<FileRecord>, SourceError> {
        let start = if scope.is_empty() {
            self.root.clone()
        } else {
            self.root.join(scope)
        };
        if !start.is_dir() {
            return Err(SourceError::InvalidRoot(start));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&start)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(path) = self.relative_path(entry.path()) else {
                warn!(path = %entry.path().display(), "Skipping file with a non UTF-8 path");
                continue;
            };

            let metadata = entry.metadata().map_err(|e| SourceError::Read {
                path: entry.path().to_path_buf(),
                source: e.into(),
            })?;
            let modified: DateTime<Utc> = metadata
                .modified()
                .map_err(|e| SourceError::Read {
                    path: entry.path().to_path_buf(),
                    source: e,
                })?
                .into();
            let created: DateTime<Utc> = metadata.created().map(Into::into).unwrap_or(modified);

            files.push(FileRecord::new(path.clone(), path, metadata.len(), created, modified));
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(root = %start.display(), count = files.len(), "Discovered files");
        Ok(files)
    }
}

impl Mover for LocalDrive {
    fn ensure_folder(&mut self, folder: &str) -> Result<(), MoveError> {
        let path = self.resolve(folder)?;
        fs::create_dir_all(&path).map_err(|e| map_io(e, folder))
    }

    fn move_file(&mut self, source: &str, destination: &str) -> Result<(), MoveError> {
        let from = self.resolve(source)?;
        let to = self.resolve(destination)?;

        if !from.exists() {
            return Err(MoveError::NotFound(source.to_string()));
        }
        if to.exists() {
            return Err(MoveError::AlreadyExists(destination.to_string()));
        }
        fs::rename(&from, &to).map_err(|e| map_io(e, source))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }
}
