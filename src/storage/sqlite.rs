//! SQLite sink
//!
//! Each run gets one row in `runs`; its entries and failures are rewritten
//! inside a transaction on every flush.

use crate::state::CrawlSession;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteRecordStore {
    conn: Connection,
    config_hash: String,
    run_id: Option<i64>,
}

impl SqliteRecordStore {
    /// Opens (or creates) the database at `path`
    pub fn new(path: &Path, config_hash: impl Into<String>) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            config_hash: config_hash.into(),
            run_id: None,
        })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory(config_hash: impl Into<String>) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            config_hash: config_hash.into(),
            run_id: None,
        })
    }

    /// ID of the run started by `begin_run`
    pub fn run_id(&self) -> Option<i64> {
        self.run_id
    }

    pub fn get_run(&self, run_id: i64) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, mode, started_at, finished_at, config_hash, status, record_count, failure_count
                 FROM runs WHERE id = ?1",
                params![run_id],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        mode: row.get(1)?,
                        started_at: row.get(2)?,
                        finished_at: row.get(3)?,
                        config_hash: row.get(4)?,
                        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
                            .unwrap_or(RunStatus::Running),
                        record_count: row.get(6)?,
                        failure_count: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    /// Source URLs stored for a run, in ID order
    pub fn entry_urls(&self, run_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source_url FROM entries WHERE run_id = ?1 ORDER BY id")?;
        let urls = stmt
            .query_map(params![run_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(urls)
    }

    fn write_session(&mut self, run_id: i64, session: &CrawlSession) -> StorageResult<()> {
        let failures = session.unresolved_failures();
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM entries WHERE run_id = ?1", params![run_id])?;
        tx.execute("DELETE FROM failures WHERE run_id = ?1", params![run_id])?;

        {
            let mut insert_entry = tx.prepare(
                "INSERT INTO entries (run_id, id, source_url, title, fields_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in session.records() {
                insert_entry.execute(params![
                    run_id,
                    record.id as i64,
                    record.source_url,
                    record.title(),
                    serde_json::to_string(&record.fields)?,
                ])?;
            }

            let mut insert_failure = tx.prepare(
                "INSERT INTO failures (run_id, url, attempts, last_error_timestamp, last_error, page)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for failure in &failures {
                insert_failure.execute(params![
                    run_id,
                    failure.url,
                    failure.attempts,
                    failure.last_error_timestamp.to_rfc3339(),
                    failure.last_error,
                    failure.page,
                ])?;
            }
        }

        tx.execute(
            "UPDATE runs SET record_count = ?1, failure_count = ?2 WHERE id = ?3",
            params![
                session.records().len() as i64,
                failures.len() as i64,
                run_id
            ],
        )?;

        tx.commit()?;
        Ok(())
    }
}

impl RecordStore for SqliteRecordStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn begin_run(&mut self, session: &CrawlSession) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO runs (mode, description, started_at, config_hash, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.mode.as_str(),
                session.mode.to_string(),
                session.started_at.to_rfc3339(),
                self.config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        let run_id = self.conn.last_insert_rowid();
        tracing::debug!("Started database run {}", run_id);
        self.run_id = Some(run_id);
        Ok(())
    }

    fn flush(&mut self, session: &CrawlSession) -> StorageResult<()> {
        let run_id = self.run_id.ok_or(StorageError::NoActiveRun)?;
        self.write_session(run_id, session)
    }

    fn finish_run(&mut self, session: &CrawlSession) -> StorageResult<()> {
        let run_id = self.run_id.ok_or(StorageError::NoActiveRun)?;
        self.write_session(run_id, session)?;

        let finished_at = session.finished_at.unwrap_or_else(Utc::now).to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), finished_at, run_id],
        )?;
        Ok(())
    }
}
