//! Database connection and pool management.

use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;

use crate::error::{ErrorKind, Result};
use crate::migrate;

// Writes are serialized by SQLite anyway; a handful of connections is
// plenty for concurrent request handlers doing mostly reads.
const MAX_CONNECTIONS: u32 = 5;

/// Handle to the cache database.
///
/// Owns the SQLite connection pool. Opening the database runs schema
/// migration to completion before the handle is returned, so a
/// [`Store`](crate::Store) built from it never observes a stale or
/// half-migrated schema.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn new(options: SqliteConnectOptions, max: Option<u32>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max.unwrap_or(MAX_CONNECTIONS))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        migrate::run(&pool).await?;
        Ok(Self { pool })
    }

    /// Open the cache database at the given path.
    ///
    /// Creates the file if it doesn't exist and migrates the schema to
    /// the version this build expects. A migration failure fails the
    /// open; there is no usable handle over a stale schema.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = Self::base_options().filename(path.as_ref()).create_if_missing(true);
        Self::new(options, None).await
    }

    /// Connect to an in-memory database (useful for testing).
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Limited to one connection, otherwise parallel connections see
    ///   separate empty databases.
    /// - Do NOT apply `#[cfg(test)]` so that other crates can also use
    ///   this in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        Self::new(options, Some(1)).await
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // WAL so concurrent request handlers can read while a probe
            // result is being written.
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // A burst of cache writes after a library scan can hit
            // SQLITE_BUSY on too small a timeout.
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    ///
    /// Waits for all connections to be returned to the pool and then
    /// closes them. After calling this, the handle should not be used.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
