//! Error types for the snapshot store and facade.

use std::path::PathBuf;

use psutt_api::timetable::BuildError;

/// Snapshot store failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A persisted snapshot exists but cannot be decoded.
    #[error("persisted snapshot {} is unreadable", path.display())]
    Corrupt {
        /// Snapshot file.
        path: PathBuf,
        /// Decoding error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The snapshot could not be encoded.
    #[error("failed to encode snapshot")]
    Encode(#[from] quick_xml::SeError),
    /// File system failure.
    #[error("failed to {action} {}", path.display())]
    Io {
        /// What was being done (`"read"`, `"write"`, ...).
        action: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Facade failure.
#[derive(Debug, thiserror::Error)]
pub enum TimetableError {
    /// Fetching or parsing the schedule failed; the previous snapshot is kept.
    #[error("failed to refresh the timetable")]
    Build(#[from] BuildError),
    /// Persisting or removing the snapshot failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// No schedule has been fetched successfully yet.
    #[error("no timetable has been fetched yet")]
    NoSnapshot,
}
