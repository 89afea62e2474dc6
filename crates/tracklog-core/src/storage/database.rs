//! SQLite-based session storage.
//!
//! Provides persistent storage for:
//! - Logged work sessions (the segment sink target)
//! - Session statistics (daily and all-time)
//! - Key-value store for engine snapshots

use std::rc::Rc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{CoreError, DatabaseError, StoreError};
use crate::events::WorkSegment;
use crate::store::SnapshotStore;
use crate::timer::SegmentSink;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub duration_min: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Stats {
    pub total_sessions: u64,
    pub total_min: u64,
    pub today_sessions: u64,
    pub today_min: u64,
}

/// SQLite database for work sessions and engine snapshots.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/tracklog/tracklog.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("tracklog.db");
        let conn = Connection::open(&path)
            .map_err(|source| DatabaseError::OpenFailed { path, source })?;
        let db = Self { conn };
        db.migrate()
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        let db = Self { conn };
        db.migrate()
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                duration_min INTEGER NOT NULL,
                started_at   TEXT NOT NULL,
                ended_at     TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_ended_at ON sessions(ended_at);",
        )?;
        Ok(())
    }

    /// Record a completed work segment.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_segment(&self, segment: &WorkSegment) -> Result<i64, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO sessions (duration_min, started_at, ended_at)
             VALUES (?1, ?2, ?3)",
            params![
                segment.duration_min,
                segment.started_at.to_rfc3339(),
                segment.ended_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// The most recent sessions, newest first.
    pub fn recent_sessions(&self, limit: u32) -> Result<Vec<SessionRecord>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, duration_min, started_at, ended_at
             FROM sessions
             ORDER BY ended_at DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(SessionRecord {
                id: row.get(0)?,
                duration_min: row.get(1)?,
                started_at: parse_instant(row.get::<_, String>(2)?, 2)?,
                ended_at: parse_instant(row.get::<_, String>(3)?, 3)?,
            })
        })?;
        rows.collect()
    }

    /// Today's and all-time session aggregates.
    pub fn stats(&self) -> Result<Stats, rusqlite::Error> {
        let (total_sessions, total_min) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_min), 0) FROM sessions",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let (today_sessions, today_min) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_min), 0)
             FROM sessions
             WHERE ended_at >= ?1",
            params![format!("{today}T00:00:00+00:00")],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(Stats {
            total_sessions,
            total_min,
            today_sessions,
            today_min,
        })
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Delete a key from the kv store.
    pub fn kv_del(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn parse_instant(raw: String, column: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

/// The kv table doubles as the engines' snapshot store.
impl SnapshotStore for Database {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.kv_get(key).map_err(StoreError::from)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.kv_set(key, value).map_err(StoreError::from)
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.kv_del(key).map_err(StoreError::from)
    }
}

/// The sessions table is the segment sink target.
impl SegmentSink for Database {
    fn log_segment(&mut self, segment: &WorkSegment) -> Result<(), CoreError> {
        self.record_segment(segment).map_err(DatabaseError::from)?;
        Ok(())
    }
}

/// Lets one shared database handle back both the snapshot store and the
/// segment sink of an engine.
impl SegmentSink for Rc<Database> {
    fn log_segment(&mut self, segment: &WorkSegment) -> Result<(), CoreError> {
        self.record_segment(segment).map_err(DatabaseError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(duration_min: u64) -> WorkSegment {
        let now = Utc::now();
        WorkSegment {
            duration_min,
            started_at: now - chrono::Duration::minutes(duration_min as i64),
            ended_at: now,
        }
    }

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        db.record_segment(&segment(25)).unwrap();
        db.record_segment(&segment(15)).unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.total_min, 40);
        assert_eq!(stats.today_sessions, 2);
        assert_eq!(stats.today_min, 40);
    }

    #[test]
    fn recent_sessions_roundtrip() {
        let db = Database::open_memory().unwrap();
        let seg = segment(25);
        db.record_segment(&seg).unwrap();
        let sessions = db.recent_sessions(10).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].duration_min, 25);
        assert_eq!(
            sessions[0].ended_at.timestamp_millis(),
            seg.ended_at.timestamp_millis()
        );
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_del("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn sink_writes_to_sessions_table() {
        let mut db = Database::open_memory().unwrap();
        db.log_segment(&segment(5)).unwrap();
        assert_eq!(db.stats().unwrap().total_sessions, 1);
    }
}
