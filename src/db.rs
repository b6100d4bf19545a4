//! Search usage persistence.
//!
//! Tracks how many metered search calls the tool has made against a local
//! SQLite file, so repeated runs can see how close they are to the daily
//! API ceiling. The counter is advisory: recording failures are logged by
//! callers and never interrupt resolution.
//!
//! # Example
//!
//! ```no_run
//! use songfetch_core::UsageCounter;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let usage = UsageCounter::new(Path::new("songfetch.db")).await?;
//! usage.record_search().await?;
//! println!("searches used: {}", usage.used().await?);
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::instrument;

/// Default maximum number of connections in the pool.
/// Kept low for SQLite since it uses file-level locking.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in milliseconds.
/// Connections will wait this long before returning SQLITE_BUSY.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// The counter saturates at this value rather than growing unbounded.
/// Matches the practical daily ceiling of metered search calls.
pub const SEARCH_CEILING: i64 = 250;

/// Database-related errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Failed to connect to the database or execute a query.
    #[error("failed to access usage database: {0}")]
    Connection(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Persistent, saturating counter of metered search calls.
#[derive(Debug, Clone)]
pub struct UsageCounter {
    pool: SqlitePool,
}

impl UsageCounter {
    /// Opens (or creates) the usage database at the specified path.
    ///
    /// Enables WAL mode, sets a busy timeout, and runs pending migrations.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn new(db_path: &Path) -> Result<Self, DbError> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(&db_url)
            .await?;

        // WAL mode for concurrent reads
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        sqlx::query(&format!("PRAGMA busy_timeout={BUSY_TIMEOUT_MS}"))
            .execute(&pool)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates an in-memory counter for testing.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Records one metered search call. Saturates at [`SEARCH_CEILING`].
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the update fails.
    pub async fn record_search(&self) -> Result<(), DbError> {
        sqlx::query("UPDATE search_usage SET used = MIN(used + 1, ?) WHERE id = 1")
            .bind(SEARCH_CEILING)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Returns the number of searches recorded so far.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the query fails.
    pub async fn used(&self) -> Result<i64, DbError> {
        let row: (i64,) = sqlx::query_as("SELECT used FROM search_usage WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Gracefully closes all connections in the pool.
    #[instrument(skip(self))]
    pub async fn close(self) {
        self.pool.close().await;
    }
}
