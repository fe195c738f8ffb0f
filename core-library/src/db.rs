//! # Database Connection Pool Module
//!
//! SQLite connection pooling for the tab catalog.
//!
//! ## Features
//!
//! - **WAL Mode**: Readers proceed while a sync writes
//! - **Foreign Keys**: Enforced, so deleting a tab or category cascades to
//!   `tab_categories`
//! - **Automatic Migrations**: Schema and full-text index are created on open
//! - **Health Checks**: Connection validation after migrations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_library::db::{DatabaseConfig, create_pool};
//!
//! let config = DatabaseConfig::new("/home/me/.local/share/tabshelf/library.db");
//! let pool = create_pool(config).await?;
//! ```
//!
//! Tests use [`create_test_pool`], a private in-memory database shared by the
//! pool's connections.

use crate::{LibraryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection settings for the catalog database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `sqlite:` URL, or `sqlite::memory:` for an in-memory database
    pub database_url: String,

    /// On-disk location, used to create the parent directory
    pub database_path: Option<PathBuf>,

    pub max_connections: u32,

    /// How long a writer waits on a locked database before failing
    pub busy_timeout: Duration,

    pub statement_cache_capacity: usize,

    /// Close connections idle for this long. `None` keeps them open, which an
    /// in-memory database needs to survive.
    idle_timeout: Option<Duration>,
}

impl DatabaseConfig {
    /// Create a configuration for the database file at `database_path`.
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();

        Self {
            database_url: format!("sqlite:{}", path.display()),
            database_path: Some(path),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
            statement_cache_capacity: 100,
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }

    /// Create a configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            database_path: None,
            idle_timeout: None,
            ..Self::new(PathBuf::new())
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Create a configured SQLite connection pool
///
/// 1. Creates the database directory if needed
/// 2. Configures connection options (WAL, foreign keys, pragmas)
/// 3. Opens the pool
/// 4. Runs migrations
/// 5. Performs a health check
///
/// # Errors
///
/// Returns an error if the file cannot be opened, migrations fail, or the
/// health check query fails.
pub async fn create_pool(config: DatabaseConfig) -> Result<Pool<Sqlite>> {
    info!(
        database_url = %config.database_url,
        max_connections = config.max_connections,
        "Creating database connection pool"
    );

    if let Some(parent) = config
        .database_path
        .as_ref()
        .and_then(|path| path.parent())
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(LibraryError::Database)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .create_if_missing(true)
        // 64MB page cache
        .pragma("cache_size", "-64000")
        .pragma("auto_vacuum", "INCREMENTAL")
        .busy_timeout(config.busy_timeout)
        .statement_cache_capacity(config.statement_cache_capacity);

    debug!("SQLite connection options configured");

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(config.max_connections)
        .max_lifetime(None)
        .idle_timeout(config.idle_timeout)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to create connection pool");
            LibraryError::Database(e)
        })?;

    info!(
        connections = pool.size(),
        "Database connection pool created successfully"
    );

    run_migrations(&pool).await?;
    health_check(&pool).await?;

    Ok(pool)
}

/// In-memory pool with migrations applied.
pub async fn create_test_pool() -> Result<Pool<Sqlite>> {
    create_pool(DatabaseConfig::in_memory()).await
}

/// Apply pending migrations embedded from `migrations/`.
async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    info!("Running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Migration failed");
            LibraryError::Migration(e.to_string())
        })?;

    info!("Database migrations completed successfully");
    Ok(())
}

async fn health_check(pool: &Pool<Sqlite>) -> Result<()> {
    debug!("Performing database health check");

    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| {
        warn!(error = %e, "Database health check failed");
        LibraryError::Database(e)
    })?;

    debug!("Database health check passed");
    Ok(())
}
