//! Relational store mapping record keys to document metadata.
//!
//! One SQLite file holds a single `documents` table keyed by `(id, segment)`. Writes are upserts,
//! so re-ingesting a folder overwrites rows instead of duplicating them.

mod types;

pub use types::{DocumentMetadata, RecordKey};

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Failures raised by the record store.
#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// Database file could not be opened or created.
    #[error("record store unavailable: {0}")]
    StorageUnavailable(String),
    /// Insert or update failed.
    #[error("failed to write record: {0}")]
    Write(#[source] rusqlite::Error),
    /// Select failed.
    #[error("failed to read records: {0}")]
    Read(#[source] rusqlite::Error),
    /// No row exists for the key.
    #[error("no record for {0}")]
    NotFound(RecordKey),
    /// Stored metadata could not be encoded or decoded.
    #[error("invalid record metadata: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Lookup capability the retrieval layer needs from a record store.
pub trait RecordLookup: Send + Sync {
    /// Fetch the metadata stored under `key`.
    fn get(&self, key: RecordKey) -> Result<DocumentMetadata, RecordStoreError>;

    /// Insert or overwrite the metadata stored under `key`.
    fn put(&self, key: RecordKey, metadata: &DocumentMetadata) -> Result<(), RecordStoreError>;
}

/// SQLite-backed record store. The connection is released on drop.
pub struct RecordStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore").finish_non_exhaustive()
    }
}

impl RecordStore {
    /// Open or create the store at `path`, creating parent directories and the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RecordStoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|error| {
                RecordStoreError::StorageUnavailable(format!(
                    "cannot create {}: {error}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .map_err(|error| {
            RecordStoreError::StorageUnavailable(format!("{}: {error}", path.display()))
        })?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;

        tracing::debug!(path = %path.display(), "Record store opened");
        Ok(store)
    }

    /// Create a store backed by an in-memory database.
    pub fn open_in_memory() -> Result<Self, RecordStoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|error| RecordStoreError::StorageUnavailable(error.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Create the `documents` table if it does not exist yet.
    pub fn ensure_schema(&self) -> Result<(), RecordStoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER NOT NULL,
                segment INTEGER NOT NULL DEFAULT 0,
                metadata TEXT NOT NULL,
                PRIMARY KEY (id, segment)
            );
            "#,
        )
        .map_err(|error| RecordStoreError::StorageUnavailable(error.to_string()))
    }

    /// Number of stored rows.
    pub fn count(&self) -> Result<u64, RecordStoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(RecordStoreError::Read)?;
        Ok(count as u64)
    }

    /// Distinct document ids, ascending.
    pub fn distinct_ids(&self) -> Result<Vec<u64>, RecordStoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT id FROM documents ORDER BY id")
            .map_err(RecordStoreError::Read)?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(RecordStoreError::Read)?
            .map(|id| id.map(|id| id as u64))
            .collect::<Result<Vec<_>, _>>()
            .map_err(RecordStoreError::Read)?;
        Ok(ids)
    }

    /// Segment indexes stored for `doc_id`, ascending.
    pub fn segments_for(&self, doc_id: u64) -> Result<Vec<u32>, RecordStoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT segment FROM documents WHERE id = ?1 ORDER BY segment")
            .map_err(RecordStoreError::Read)?;
        let segments = stmt
            .query_map(params![doc_id as i64], |row| row.get::<_, u32>(0))
            .map_err(RecordStoreError::Read)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(RecordStoreError::Read)?;
        Ok(segments)
    }

    /// Release the connection, surfacing any error SQLite reports while closing.
    pub fn close(self) -> Result<(), RecordStoreError> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| RecordStoreError::StorageUnavailable("connection lock poisoned".into()))?;
        conn.close()
            .map_err(|(_, error)| RecordStoreError::StorageUnavailable(error.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, RecordStoreError> {
        self.conn
            .lock()
            .map_err(|_| RecordStoreError::StorageUnavailable("connection lock poisoned".into()))
    }
}

impl RecordLookup for RecordStore {
    fn get(&self, key: RecordKey) -> Result<DocumentMetadata, RecordStoreError> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT metadata FROM documents WHERE id = ?1 AND segment = ?2",
                params![key.doc_id as i64, key.segment],
                |row| row.get(0),
            )
            .optional()
            .map_err(RecordStoreError::Read)?;

        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Err(RecordStoreError::NotFound(key)),
        }
    }

    fn put(&self, key: RecordKey, metadata: &DocumentMetadata) -> Result<(), RecordStoreError> {
        let json = serde_json::to_string(metadata)?;
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO documents (id, segment, metadata)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (id, segment) DO UPDATE SET metadata = excluded.metadata
            "#,
            params![key.doc_id as i64, key.segment, json],
        )
        .map_err(RecordStoreError::Write)?;

        tracing::info!(doc_id = key.doc_id, segment = key.segment, filename = %metadata.filename, "Record written");
        Ok(())
    }
}
