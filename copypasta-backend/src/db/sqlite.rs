//! SQLite connection and schema for item metadata

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file and ensure the schema exists
    pub fn new(path: &Path) -> SqliteResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    #[cfg(test)]
    pub fn in_memory() -> SqliteResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> SqliteResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                item_type TEXT NOT NULL,
                file_name TEXT,
                file_type TEXT,
                is_text INTEGER,
                language TEXT NOT NULL,
                original_size INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                sort_order INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_items_created_at ON items(created_at);
             CREATE INDEX IF NOT EXISTS idx_items_expires_at ON items(expires_at);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection. A panic in another holder does not leave
    /// SQLite in a bad state, so a poisoned lock is recovered.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Timestamps are stored as fixed-width RFC 3339 strings so that
/// lexicographic order in SQL equals chronological order.
pub(crate) fn to_db_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Only four-digit years keep the fixed-width text format
pub(crate) fn is_storable_time(dt: &DateTime<Utc>) -> bool {
    (0..=9999).contains(&dt.year())
}

pub(crate) fn from_db_time(raw: &str, column: usize) -> SqliteResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// True for PRIMARY KEY / UNIQUE conflicts
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
