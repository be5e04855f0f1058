// crates/db/src/lib.rs
//! Durable storage for the developer intelligence pipeline.
//!
//! Wraps a `sqlx::SqlitePool` behind a [`Database`] handle and a
//! [`Persister`] trait the orchestrator depends on rather than the
//! concrete pool type, so tests can substitute an in-memory database
//! without touching disk. `sqlx::Postgres` remains a drop-in swap behind
//! the same trait if the embedding program points at a server store
//! instead.

mod migrations;
mod persister;
mod rows;

pub use persister::{Persister, SqlitePersister};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{ConnectOptions, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("failed to determine cache directory")]
    NoCacheDir,

    #[error("failed to create database directory: {0}")]
    CreateDir(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Handle wrapping a SQLite connection pool. Migrations are applied once at
/// construction, tracked in a `_migrations` table so re-opening an existing
/// database is a no-op.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl Database {
    /// Opens (or creates) the database at `path`, sized to `max_connections`
    /// (the orchestrator sizes this to `worker_concurrency`).
    pub async fn new(path: &Path, max_connections: u32) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30))
            .log_slow_statements(tracing::log::LevelFilter::Warn, std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;

        let db = Self { pool, db_path: path.to_owned() };
        db.run_migrations().await?;
        info!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// An in-memory database for tests. `shared_cache(true)` so every pool
    /// connection sees the same database — without it, each connection
    /// would get its own isolated in-memory store.
    pub async fn new_in_memory() -> DbResult<Self> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:")?.shared_cache(true).busy_timeout(std::time::Duration::from_secs(5));
        let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;
        let db = Self { pool, db_path: PathBuf::new() };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> DbResult<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS _migrations (version INTEGER PRIMARY KEY)").execute(&self.pool).await?;

        let row: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM _migrations").fetch_one(&self.pool).await?;
        let current_version = row.0 as usize;

        for (i, migration) in migrations::MIGRATIONS.iter().enumerate() {
            let version = i + 1;
            if version > current_version {
                sqlx::raw_sql(migration).execute(&self.pool).await?;
                sqlx::query("INSERT INTO _migrations (version) VALUES (?)").bind(version as i64).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}
