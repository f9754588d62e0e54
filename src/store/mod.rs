//! Blob store for published reply audio
//!
//! Document-style binary storage keyed by logical filename, backed by
//! `SQLite`. The store is the only shared state between the session loop
//! and the HTTP serving boundary; last-write-wins is the only consistency
//! guarantee.

mod blob;
mod schema;

use std::path::Path;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::{Error, Result};

pub use blob::{Blob, BlobRepo};
pub use schema::SCHEMA_VERSION;

/// Store connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled store connection
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Initialize the blob store
///
/// # Errors
///
/// Returns error if the database cannot be opened or migrated
pub fn init<P: AsRef<Path>>(path: P) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| Error::Store(e.to_string()))?;

    let conn = pool.get().map_err(|e| Error::Store(e.to_string()))?;
    schema::init(&conn)?;

    tracing::info!(version = SCHEMA_VERSION, "blob store initialized");
    Ok(pool)
}

/// Initialize an in-memory blob store (for testing)
///
/// # Errors
///
/// Returns error if the database cannot be initialized
pub fn init_memory() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Error::Store(e.to_string()))?;

    let conn = pool.get().map_err(|e| Error::Store(e.to_string()))?;
    schema::init(&conn)?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_memory() {
        let pool = init_memory().unwrap();
        let _conn = pool.get().unwrap();
    }
}
