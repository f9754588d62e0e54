//! Blob repository for named binary objects

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;

use super::DbPool;
use crate::{Error, Result};

/// A stored binary object
#[derive(Debug, Clone)]
pub struct Blob {
    pub id: i64,
    pub filename: String,
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Blob repository
///
/// Replacement is delete-then-insert, not an atomic upsert: a retrieval
/// arriving between the delete and the insert sees not-found. The invariant
/// after every upload is at most one blob per filename.
#[derive(Clone)]
pub struct BlobRepo {
    pool: DbPool,
}

impl BlobRepo {
    /// Create a new blob repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find a blob by its logical filename
    ///
    /// Absence is `Ok(None)`; only `QueryReturnedNoRows` maps there, any
    /// other query failure propagates.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails
    pub fn find_by_name(&self, filename: &str) -> Result<Option<Blob>> {
        let conn = self.pool.get().map_err(|e| Error::Store(e.to_string()))?;

        let blob = conn
            .query_row(
                "SELECT id, filename, data, created_at FROM blobs WHERE filename = ?1",
                [filename],
                |row| {
                    Ok(Blob {
                        id: row.get(0)?,
                        filename: row.get(1)?,
                        data: row.get(2)?,
                        created_at: parse_datetime(&row.get::<_, String>(3)?),
                    })
                },
            )
            .optional()?;

        Ok(blob)
    }

    /// Insert a blob under a logical filename
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails
    pub fn put(&self, data: &[u8], filename: &str) -> Result<i64> {
        let conn = self.pool.get().map_err(|e| Error::Store(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO blobs (filename, data, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![filename, data, now],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Delete a blob by id
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails
    pub fn delete(&self, id: i64) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Store(e.to_string()))?;
        conn.execute("DELETE FROM blobs WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Replace any blob stored under `filename` with `data`
    ///
    /// Delete-then-insert; see the type docs for the visibility window.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails
    pub fn store_bytes(&self, data: &[u8], filename: &str) -> Result<i64> {
        if let Some(existing) = self.find_by_name(filename)? {
            self.delete(existing.id)?;
            tracing::debug!(filename, old_id = existing.id, "deleted previous blob");
        }

        let id = self.put(data, filename)?;
        tracing::info!(filename, id, bytes = data.len(), "blob stored");
        Ok(id)
    }

    /// Stream a local file into the store under a logical filename
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or the store operation fails
    pub fn upload(&self, local_path: &Path, filename: &str) -> Result<i64> {
        let data = std::fs::read(local_path)?;
        self.store_bytes(&data, filename)
    }

    /// Count blobs stored under a logical filename
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails
    pub fn count(&self, filename: &str) -> Result<i64> {
        let conn = self.pool.get().map_err(|e| Error::Store(e.to_string()))?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM blobs WHERE filename = ?1",
            [filename],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Parse an rfc3339 timestamp, falling back to now on malformed rows
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;

    #[test]
    fn put_and_find_roundtrip() {
        let pool = store::init_memory().unwrap();
        let repo = BlobRepo::new(pool);

        repo.put(b"mp3-bytes", "audio.mp3").unwrap();

        let blob = repo.find_by_name("audio.mp3").unwrap().unwrap();
        assert_eq!(blob.filename, "audio.mp3");
        assert_eq!(blob.data, b"mp3-bytes");
    }

    #[test]
    fn find_missing_returns_none() {
        let pool = store::init_memory().unwrap();
        let repo = BlobRepo::new(pool);

        assert!(repo.find_by_name("missing.mp3").unwrap().is_none());
    }

    #[test]
    fn store_bytes_replaces_existing() {
        let pool = store::init_memory().unwrap();
        let repo = BlobRepo::new(pool);

        repo.store_bytes(b"first", "audio.mp3").unwrap();
        repo.store_bytes(b"second", "audio.mp3").unwrap();

        assert_eq!(repo.count("audio.mp3").unwrap(), 1);
        let blob = repo.find_by_name("audio.mp3").unwrap().unwrap();
        assert_eq!(blob.data, b"second");
    }

    #[test]
    fn find_surfaces_query_errors() {
        let pool = store::init_memory().unwrap();
        let repo = BlobRepo::new(pool.clone());

        pool.get().unwrap().execute_batch("DROP TABLE blobs").unwrap();

        // A broken store is an error, not absence
        assert!(repo.find_by_name("audio.mp3").is_err());
    }

    #[test]
    fn delete_removes_blob() {
        let pool = store::init_memory().unwrap();
        let repo = BlobRepo::new(pool);

        let id = repo.put(b"bytes", "audio.mp3").unwrap();
        repo.delete(id).unwrap();

        assert!(repo.find_by_name("audio.mp3").unwrap().is_none());
    }
}
