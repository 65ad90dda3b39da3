//! JSON file sink
//!
//! Records go to a JSONL file (or a pretty JSON array), failures to a JSON
//! array. Both files are rewritten through a temporary sibling and renamed
//! into place, so a crash mid-write leaves the previous flush intact.

use crate::config::RecordFormat;
use crate::state::{CrawlSession, EntryRecord, FailureRecord};
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct JsonRecordStore {
    records_path: PathBuf,
    failures_path: PathBuf,
    format: RecordFormat,
}

impl JsonRecordStore {
    pub fn new(
        records_path: impl Into<PathBuf>,
        failures_path: impl Into<PathBuf>,
        format: RecordFormat,
    ) -> Self {
        Self {
            records_path: records_path.into(),
            failures_path: failures_path.into(),
            format,
        }
    }

    pub fn records_path(&self) -> &Path {
        &self.records_path
    }

    pub fn failures_path(&self) -> &Path {
        &self.failures_path
    }

    fn write_all(&self, session: &CrawlSession) -> StorageResult<()> {
        let records = encode_records(session.records(), self.format)?;
        write_atomically(&self.records_path, records.as_bytes())?;

        let failures = session.unresolved_failures();
        write_atomically(&self.failures_path, encode_failures(&failures)?.as_bytes())?;

        tracing::debug!(
            "Wrote {} record(s) to {} and {} failure(s) to {}",
            session.records().len(),
            self.records_path.display(),
            failures.len(),
            self.failures_path.display()
        );
        Ok(())
    }
}

impl RecordStore for JsonRecordStore {
    fn name(&self) -> &'static str {
        "json"
    }

    fn begin_run(&mut self, _session: &CrawlSession) -> StorageResult<()> {
        for path in [&self.records_path, &self.failures_path] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    fn flush(&mut self, session: &CrawlSession) -> StorageResult<()> {
        self.write_all(session)
    }

    fn finish_run(&mut self, session: &CrawlSession) -> StorageResult<()> {
        self.write_all(session)?;
        tracing::info!(
            "Saved {} record(s) to {}",
            session.records().len(),
            self.records_path.display()
        );
        if !session.failures().is_empty() {
            tracing::info!(
                "Saved {} failure(s) to {}",
                session.failures().len(),
                self.failures_path.display()
            );
        }
        Ok(())
    }
}

/// Serializes records in the configured layout
pub fn encode_records(records: &[EntryRecord], format: RecordFormat) -> StorageResult<String> {
    match format {
        RecordFormat::Jsonl => {
            let mut out = String::new();
            for record in records {
                out.push_str(&serde_json::to_string(record)?);
                out.push('\n');
            }
            Ok(out)
        }
        RecordFormat::JsonArray => Ok(serde_json::to_string_pretty(records)?),
    }
}

pub fn encode_failures(failures: &[FailureRecord]) -> StorageResult<String> {
    Ok(serde_json::to_string_pretty(failures)?)
}

fn write_atomically(path: &Path, contents: &[u8]) -> StorageResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    };

    write().map_err(|source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    })
}
