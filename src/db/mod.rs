use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::Config;

const SCHEMA: &str = include_str!("../../sql/schema.sql");

/// Shared handle to the durable store. Cloning is cheap; all clones share
/// the same pool and the same league-settlement guard.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    settlement_guard: Arc<Mutex<()>>,
}

impl Database {
    pub async fn from_env() -> Result<Self, DbInitError> {
        let config = Config::from_env();
        Self::connect(&config.database_url).await
    }

    pub async fn connect(url: &str) -> Result<Self, DbInitError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Single-connection in-memory database, used by the test suites.
    pub async fn in_memory() -> Result<Self, DbInitError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, DbInitError> {
        apply_schema(&pool).await?;
        Ok(Self {
            pool,
            settlement_guard: Arc::new(Mutex::new(())),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Serializes league settlement runs within this process. The settlement
    /// log row closes the race across processes.
    pub(crate) fn settlement_guard(&self) -> &Mutex<()> {
        &self.settlement_guard
    }
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in split_statements(SCHEMA) {
        sqlx::query(&statement).execute(pool).await?;
    }
    Ok(())
}

fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|stmt| {
            stmt.lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .map(|stmt| stmt.trim().to_string())
        .filter(|stmt| !stmt.is_empty())
        .collect()
}

#[derive(Debug, Error)]
pub enum DbInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
