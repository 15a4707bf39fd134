use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;

use crate::domain::ports::errors::DatabaseError;

/// Database connection manager with connection pooling
pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Create a connection pool with WAL mode enabled
    ///
    /// # Arguments
    /// * `database_url` - `SQLite` URL, e.g. "sqlite:.silt/silt.db" or "sqlite::memory:"
    /// * `max_connections` - upper bound of the pool
    ///
    /// An in-memory database lives inside a single connection, so the pool is
    /// pinned to one connection that is never recycled.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, DatabaseError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DatabaseError::ConnectionPoolError(format!("Invalid database URL: {e}")))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let in_memory = database_url.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(max_connections.max(1))
                .idle_timeout(Duration::from_secs(30))
                .max_lifetime(Duration::from_secs(1800))
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| {
                DatabaseError::ConnectionPoolError(format!("Failed to create connection pool: {e}"))
            })?;

        Ok(Self { pool })
    }

    /// Open the database file at `path`, creating parent directories
    pub async fn open(path: &str, max_connections: u32) -> Result<Self, DatabaseError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::ConnectionPoolError(format!(
                        "Failed to create {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        Self::new(&format!("sqlite:{path}"), max_connections).await
    }

    /// Run migrations at startup
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::MigrationError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
