//! `SQLite` database connection.
//!
//! The database is stored at `~/.studysync/studysync.db` and holds the keyed
//! blobs of the sync subsystem (queue, sync configuration, id mappings).

use rusqlite::{params, Connection, OptionalExtension};

use crate::config::Paths;
use crate::error::SyncError;

use super::migrations;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at the default location.
    ///
    /// Creates the database file and runs migrations if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open() -> Result<Self, SyncError> {
        let paths = Paths::new()?;
        paths.ensure_dirs()?;
        Self::open_at(&paths.database)
    }

    /// Open the database at a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_at(path: &std::path::Path) -> Result<Self, SyncError> {
        let conn = Connection::open(path).map_err(|e| {
            SyncError::Database(format!("Failed to open database {}: {e}", path.display()))
        })?;

        // Every blob write must be on disk before the call returns.
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = FULL;")
            .map_err(|e| SyncError::Database(format!("Failed to configure journal: {e}")))?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    /// Open an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_in_memory() -> Result<Self, SyncError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            SyncError::Database(format!("Failed to open in-memory database: {e}"))
        })?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    fn migrate(&self) -> Result<(), SyncError> {
        migrations::run(&self.conn)
    }

    /// Get the current schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be read.
    pub fn schema_version(&self) -> Result<i32, SyncError> {
        migrations::get_version(&self.conn)
    }

    /// Read the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_blob(&self, key: &str) -> Result<Option<String>, SyncError> {
        self.conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| SyncError::Database(format!("Failed to read {key}: {e}")))
    }

    /// Insert or replace the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn put_blob(&self, key: &str, value: &str) -> Result<(), SyncError> {
        self.conn
            .execute(
                r"INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                  ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                 updated_at = excluded.updated_at",
                params![key, value, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(|e| SyncError::Database(format!("Failed to write {key}: {e}")))?;
        Ok(())
    }

    /// Delete the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_blob(&self, key: &str) -> Result<bool, SyncError> {
        let rows = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?1", [key])
            .map_err(|e| SyncError::Database(format!("Failed to delete {key}: {e}")))?;
        Ok(rows > 0)
    }
}
