//! SQLite event sink
//!
//! Each crawl opens a row in `runs` and appends every event to `events`,
//! keeping the JSON payload next to a few indexed columns so the link graph
//! can be queried without parsing JSON.

use crate::events::{CrawlEvent, ROOT_ID};
use crate::output::stats::CrawlStatistics;
use crate::output::traits::{EventSink, OutputError, OutputResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQL schema for the output database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_url TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT,
    status TEXT NOT NULL
);

-- Every emitted event, in emission order
CREATE TABLE IF NOT EXISTS events (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    event_id TEXT NOT NULL,
    type TEXT NOT NULL,
    url TEXT NOT NULL,
    status TEXT,
    target TEXT,
    nofollow INTEGER,
    payload TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_run ON events(run_id);
CREATE INDEX IF NOT EXISTS idx_events_event_id ON events(event_id);
CREATE INDEX IF NOT EXISTS idx_events_type ON events(type);
"#;

/// Status of a crawl run
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

/// A row of the `runs` table
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub start_url: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: Option<String>,
    pub status: Option<RunStatus>,
}

/// Writes events to a SQLite database
pub struct SqliteSink {
    conn: Connection,
    run_id: i64,
}

impl SqliteSink {
    /// Opens (or creates) the database at `path` and starts a new run
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `start_url` - Seed URL of the crawl
    /// * `config_hash` - SHA-256 of the configuration file, if one was used
    pub fn create(path: &Path, start_url: &str, config_hash: Option<&str>) -> OutputResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        Self::with_connection(conn, start_url, config_hash)
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory(start_url: &str) -> OutputResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::with_connection(conn, start_url, None)
    }

    fn with_connection(conn: Connection, start_url: &str, config_hash: Option<&str>) -> OutputResult<Self> {
        conn.execute_batch(SCHEMA_SQL)?;

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO runs (start_url, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![start_url, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        let run_id = conn.last_insert_rowid();

        tracing::info!("Recording events to SQLite run {}", run_id);
        Ok(Self { conn, run_id })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Loads statistics for this sink's run
    pub fn statistics(&self) -> OutputResult<CrawlStatistics> {
        statistics_for_run(&self.conn, self.run_id)
    }
}

impl EventSink for SqliteSink {
    fn emit(&mut self, event: &CrawlEvent) -> OutputResult<()> {
        let payload = serde_json::to_string(event)?;
        let (target, nofollow) = match event {
            CrawlEvent::Link(link) => (Some(link.target.as_str()), Some(link.nofollow)),
            _ => (None, None),
        };

        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO events (run_id, event_id, type, url, status, target, nofollow, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        stmt.execute(params![
            self.run_id,
            event.id(),
            event.kind(),
            event.url(),
            event.status(),
            target,
            nofollow,
            payload,
        ])?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET finished_at = ?1, status = ?2 WHERE id = ?3",
            params![now, RunStatus::Completed.to_db_string(), self.run_id],
        )?;
        Ok(())
    }
}

/// Returns the most recent run recorded in `conn`
pub fn latest_run(conn: &Connection) -> OutputResult<Option<RunRecord>> {
    let run = conn
        .query_row(
            "SELECT id, start_url, started_at, finished_at, config_hash, status
             FROM runs ORDER BY id DESC LIMIT 1",
            [],
            |row| {
                let status: String = row.get(5)?;
                Ok(RunRecord {
                    id: row.get(0)?,
                    start_url: row.get(1)?,
                    started_at: row.get(2)?,
                    finished_at: row.get(3)?,
                    config_hash: row.get(4)?,
                    status: RunStatus::from_db_string(&status),
                })
            },
        )
        .optional()?;
    Ok(run)
}

/// Loads statistics for the latest run stored at `path`
///
/// # Arguments
///
/// * `path` - Path to a database written by [`SqliteSink`]
///
/// # Returns
///
/// * `Ok((RunRecord, CrawlStatistics))` - The run and its event counts
/// * `Err(OutputError)` - The database could not be read or holds no runs
pub fn load_statistics(path: &Path) -> OutputResult<(RunRecord, CrawlStatistics)> {
    let conn = Connection::open(path)?;
    let run = latest_run(&conn)?.ok_or_else(|| OutputError::NoRuns(path.display().to_string()))?;
    let stats = statistics_for_run(&conn, run.id)?;
    Ok((run, stats))
}

fn statistics_for_run(conn: &Connection, run_id: i64) -> OutputResult<CrawlStatistics> {
    let mut stats = CrawlStatistics::new();

    let mut stmt = conn.prepare("SELECT type, COUNT(*) FROM events WHERE run_id = ?1 GROUP BY type")?;
    let rows = stmt.query_map(params![run_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (kind, count) = row?;
        stats.events_by_type.insert(kind, count as u64);
    }

    let count = |sql: &str| -> OutputResult<u64> {
        let n: i64 = conn.query_row(sql, params![run_id], |row| row.get(0))?;
        Ok(n as u64)
    };

    stats.pages = count("SELECT COUNT(*) FROM events WHERE run_id = ?1 AND type = 'response'")?;
    stats.http_errors = count(
        "SELECT COUNT(*) FROM events
         WHERE run_id = ?1 AND type = 'response' AND CAST(status AS INTEGER) >= 400",
    )?;
    stats.links = conn.query_row(
        "SELECT COUNT(*) FROM events WHERE run_id = ?1 AND type = 'link' AND event_id != ?2",
        params![run_id, ROOT_ID],
        |row| row.get::<_, i64>(0),
    )? as u64;
    stats.errors = count(
        "SELECT COUNT(*) FROM events
         WHERE run_id = ?1 AND type IN ('dns_lookup_error', 'timeout_error')",
    )?;

    Ok(stats)
}
