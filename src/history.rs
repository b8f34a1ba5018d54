use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

use crate::app_dirs::AppDirs;
use crate::session::SessionFinished;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("cannot create history directory: {0}")]
    Io(#[from] std::io::Error),
}

/// One row of the results log.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub finished_at: DateTime<Local>,
    pub completed: usize,
    pub total: usize,
    pub elapsed_seconds: f64,
    pub key_count: u64,
    pub keys_per_minute: f64,
    pub aborted: bool,
}

/// Log of finished sessions
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Open the database under the state directory, creating it when needed
    pub fn new() -> Result<Self, HistoryError> {
        let path = AppDirs::history_path().unwrap_or_else(|| "gridrill_history.db".into());
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HistoryError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, HistoryError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, HistoryError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                finished_at TEXT NOT NULL,
                completed INTEGER NOT NULL,
                total INTEGER NOT NULL,
                elapsed_seconds REAL NOT NULL,
                key_count INTEGER NOT NULL,
                keys_per_minute REAL NOT NULL,
                aborted BOOLEAN NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sessions_total ON sessions(total)",
            [],
        )?;

        Ok(HistoryDb { conn })
    }

    pub fn record(&self, result: &SessionFinished) -> Result<(), HistoryError> {
        self.conn.execute(
            r#"
            INSERT INTO sessions
                (finished_at, completed, total, elapsed_seconds, key_count, keys_per_minute, aborted)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                Local::now().to_rfc3339(),
                result.completed as i64,
                result.total as i64,
                result.elapsed_seconds,
                result.key_count as i64,
                result.keys_per_minute,
                result.aborted,
            ],
        )?;
        Ok(())
    }

    /// Most recent sessions first
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT finished_at, completed, total, elapsed_seconds, key_count, keys_per_minute, aborted
            FROM sessions
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let finished_at: String = row.get(0)?;
            Ok(HistoryEntry {
                finished_at: DateTime::parse_from_rfc3339(&finished_at)
                    .map(|d| d.with_timezone(&Local))
                    .unwrap_or_else(|_| Local::now()),
                completed: row.get::<_, i64>(1)? as usize,
                total: row.get::<_, i64>(2)? as usize,
                elapsed_seconds: row.get(3)?,
                key_count: row.get::<_, i64>(4)? as u64,
                keys_per_minute: row.get(5)?,
                aborted: row.get(6)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Fastest fully completed session with `total` assignments
    pub fn best_time(&self, total: usize) -> Result<Option<f64>, HistoryError> {
        let best = self
            .conn
            .query_row(
                r#"
                SELECT MIN(elapsed_seconds) FROM sessions
                WHERE total = ?1 AND completed = total AND aborted = 0
                "#,
                [total as i64],
                |row| row.get::<_, Option<f64>>(0),
            )
            .optional()?
            .flatten();
        Ok(best)
    }

    pub fn clear(&self) -> Result<(), HistoryError> {
        self.conn.execute("DELETE FROM sessions", [])?;
        Ok(())
    }
}
