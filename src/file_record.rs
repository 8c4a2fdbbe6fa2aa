//! File metadata as produced by a discovery source.
//!
//! A [`FileRecord`] is read-only to the rest of the crate: the categorizer and
//! planner only ever borrow it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which timestamp of a file drives its date folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateField {
    /// Creation time.
    #[default]
    Created,
    /// Last modification time.
    Modified,
}

/// Metadata for one discovered file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Provider identifier (the relative path for local drives).
    pub id: String,
    /// File name including extension.
    pub name: String,
    /// Full source path, `/`-separated, relative to the drive root.
    pub path: String,
    /// Lower-cased extension with a leading dot, or empty.
    pub extension: String,
    /// Size in bytes.
    pub size: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Arbitrary provider metadata, carried through untouched.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl FileRecord {
    /// Creates a record from a source path; the name and extension are derived
    /// from its last segment.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Utc;
    /// use cloudtidy::file_record::FileRecord;
    ///
    /// let now = Utc::now();
    /// let file = FileRecord::new("1", "Scans/IMG_1234.JPG", 2048, now, now);
    /// assert_eq!(file.name, "IMG_1234.JPG");
    /// assert_eq!(file.extension, ".jpg");
    /// ```
    pub fn new(
        id: impl Into<String>,
        path: impl Into<String>,
        size: u64,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> Self {
        let path = path.into();
        let name = path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or_default()
            .to_string();
        let extension = extension_of(&name);

        Self {
            id: id.into(),
            name,
            path,
            extension,
            size,
            created,
            modified,
            metadata: Map::new(),
        }
    }

    /// Returns the timestamp selected by `field`.
    pub fn timestamp(&self, field: DateField) -> DateTime<Utc> {
        match field {
            DateField::Created => self.created,
            DateField::Modified => self.modified,
        }
    }
}

/// Extracts the lower-cased, dotted extension of a file name.
///
/// Names without a dot, or whose only dot is the leading one (`.bashrc`), have
/// no extension.
pub fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!(".{}", ext.to_lowercase())
        }
        _ => String::new(),
    }
}

/// Normalizes a configured extension to the `.ext` lower-case form.
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// Splits a file name into stem and dotted extension.
pub(crate) fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}
