//! Storage module for persisting harvest output
//!
//! This module handles everything written to or read back from disk:
//! - `JsonRecordStore`: the records and failure files
//! - `SqliteRecordStore`: an optional database mirroring every run
//! - readers for failure files and records files produced by earlier runs

mod json;
mod schema;
mod sqlite;
mod traits;

pub use json::{encode_failures, encode_records, JsonRecordStore};
pub use sqlite::SqliteRecordStore;
pub use traits::{RecordStore, StorageError, StorageResult};

use crate::config::Config;
use crate::state::{EntryRecord, FailureRecord};
use crate::HarvestError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Opens every sink enabled in the configuration
///
/// The JSON files are always written; the SQLite mirror only when
/// `output.database-path` is set.
pub fn open_stores(
    config: &Config,
    config_hash: &str,
) -> Result<Vec<Box<dyn RecordStore>>, HarvestError> {
    let mut stores: Vec<Box<dyn RecordStore>> = vec![Box::new(JsonRecordStore::new(
        &config.output.records_path,
        &config.output.failures_path,
        config.output.format,
    ))];

    if let Some(database_path) = &config.output.database_path {
        let store = SqliteRecordStore::new(Path::new(database_path), config_hash)?;
        stores.push(Box::new(store));
    }

    Ok(stores)
}

/// Sibling of `records_path` used for the records of a retry run
///
/// `records.jsonl` becomes `records.retry.jsonl`, so retrying never
/// overwrites the records of the run that produced the failures.
pub fn retry_records_path(records_path: &Path) -> PathBuf {
    let stem = records_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "records".to_string());
    let name = match records_path.extension() {
        Some(ext) => format!("{}.retry.{}", stem, ext.to_string_lossy()),
        None => format!("{}.retry", stem),
    };
    records_path.with_file_name(name)
}

/// An element of a failure file: a full record or a bare URL
#[derive(Deserialize)]
#[serde(untagged)]
enum FailureEntry {
    Record(FailureRecord),
    Url(String),
}

impl From<FailureEntry> for FailureRecord {
    fn from(entry: FailureEntry) -> Self {
        match entry {
            FailureEntry::Record(record) => record,
            FailureEntry::Url(url) => FailureRecord::new(url, 0, None),
        }
    }
}

/// Reads a failure file written by an earlier run
///
/// Accepts a JSON array or one JSON value per line. Each element may be a
/// full failure record or just the URL string.
pub fn load_failure_file(path: &Path) -> Result<Vec<FailureRecord>, HarvestError> {
    let failure_error = |message: String| HarvestError::FailureFile {
        path: path.to_path_buf(),
        message,
    };

    let contents = fs::read_to_string(path).map_err(|e| failure_error(e.to_string()))?;
    let entries: Vec<FailureEntry> = parse_json_list(&contents).map_err(failure_error)?;
    Ok(entries.into_iter().map(FailureRecord::from).collect())
}

/// Reads a records file in either JSONL or JSON array layout
pub fn load_records_file(path: &Path) -> Result<Vec<EntryRecord>, HarvestError> {
    let records_error = |message: String| HarvestError::RecordsFile {
        path: path.to_path_buf(),
        message,
    };

    let contents = fs::read_to_string(path).map_err(|e| records_error(e.to_string()))?;
    parse_json_list(&contents).map_err(records_error)
}

/// Parses either a JSON array or JSON lines, skipping blank lines
fn parse_json_list<T: DeserializeOwned>(contents: &str) -> Result<Vec<T>, String> {
    let trimmed = contents.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| e.to_string());
    }

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| format!("line {}: {}", i + 1, e))
        })
        .collect()
}

/// Represents a harvest run in the database
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub mode: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub record_count: i64,
    pub failure_count: i64,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}
