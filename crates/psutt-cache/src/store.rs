//! Durable snapshot storage (one XML file).

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use psutt_api::timetable::ScheduleSnapshot;
use tempfile::NamedTempFile;

use super::error::StoreError;

/// Root element of the persisted document.
const ROOT_ELEMENT: &str = "timetable";

/// XML declaration written ahead of the document.
const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

/// Persists the schedule snapshot to a single file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Creates a store backed by `path`. Nothing is touched until first use.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if a persisted copy exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Replaces the persisted copy with `snapshot`.
    ///
    /// The document is written to a temporary file next to the target and
    /// renamed over it, so readers see either the old or the new copy.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding, directory creation, or the write fails.
    pub fn save(&self, snapshot: &ScheduleSnapshot) -> Result<(), StoreError> {
        let xml = quick_xml::se::to_string_with_root(ROOT_ELEMENT, snapshot)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            action: "create directory",
            path: dir.to_path_buf(),
            source,
        })?;

        let write_err = |source| StoreError::Io {
            action: "write",
            path: self.path.clone(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(XML_DECLARATION.as_bytes())
            .and_then(|()| tmp.write_all(xml.as_bytes()))
            .and_then(|()| tmp.flush())
            .map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        tracing::debug!(
            path = %self.path.display(),
            weeks = snapshot.weeks.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    /// Loads the persisted copy.
    ///
    /// Returns `Ok(None)` when no copy exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the file exists but cannot be
    /// decoded, or [`StoreError::Io`] if it cannot be read.
    pub fn load(&self) -> Result<Option<ScheduleSnapshot>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    action: "read",
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let corrupt = |source: Box<dyn std::error::Error + Send + Sync>| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        };
        let content = String::from_utf8(bytes).map_err(|e| corrupt(Box::new(e)))?;
        let snapshot: ScheduleSnapshot =
            quick_xml::de::from_str(&content).map_err(|e| corrupt(Box::new(e)))?;

        if !snapshot.weeks.is_empty() && snapshot.current_week_index >= snapshot.weeks.len() {
            return Err(corrupt(
                format!(
                    "current week index {} out of range for {} weeks",
                    snapshot.current_week_index,
                    snapshot.weeks.len()
                )
                .into(),
            ));
        }

        Ok(Some(snapshot))
    }

    /// Loads the persisted copy, deleting it if it cannot be decoded.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the unreadable copy
    /// cannot be removed.
    pub fn load_or_discard(&self) -> Result<Option<ScheduleSnapshot>, StoreError> {
        match self.load() {
            Err(err @ StoreError::Corrupt { .. }) => {
                tracing::warn!(error = %err, "Discarding unreadable snapshot");
                self.clear()?;
                Ok(None)
            }
            other => other,
        }
    }

    /// Removes the persisted copy. Absent files are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                action: "remove",
                path: self.path.clone(),
                source,
            }),
        }
    }
}
