//! Storage traits and error types
//!
//! This module defines the trait interface for record sinks and the
//! associated error types.

use crate::state::CrawlSession;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("No run has been started on this store")]
    NoActiveRun,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A durable sink for the records and failures of a run
///
/// The controller calls `begin_run` once, `flush` after every few pages, and
/// `finish_run` once at the end. Every call receives the full session, so a
/// store may simply rewrite its output each time.
pub trait RecordStore: Send {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn begin_run(&mut self, session: &CrawlSession) -> StorageResult<()>;

    /// Persists everything accumulated so far
    fn flush(&mut self, session: &CrawlSession) -> StorageResult<()>;

    /// Persists the final state and marks the run complete
    fn finish_run(&mut self, session: &CrawlSession) -> StorageResult<()>;
}
