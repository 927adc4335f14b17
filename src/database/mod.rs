pub mod models;
pub mod queries;
pub mod schema;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::PulseError;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the SQLite database at `database_url`, creating the file
    /// if it does not exist yet.
    pub async fn new(database_url: &str) -> Result<Self, PulseError> {
        if database_url.contains(":memory:") {
            return Self::new_in_memory().await;
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| PulseError::ConfigError(format!("Invalid database URL {}: {}", database_url, e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        info!("Connected to database {}", database_url);
        Ok(Database { pool })
    }

    /// Fresh private database. Pinned to one connection because every
    /// SQLite `:memory:` connection is its own database.
    pub async fn new_in_memory() -> Result<Self, PulseError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| PulseError::ConfigError(format!("Invalid in-memory database URL: {}", e)))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Database { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), PulseError> {
        sqlx::query(schema::SCHEMA_VERSION_DDL)
            .execute(&self.pool)
            .await?;

        let (version,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(&self.pool)
            .await?;

        if version < schema::SCHEMA_VERSION {
            let mut tx = self.pool.begin().await?;
            for statement in schema::SCHEMA_V1 {
                sqlx::query(statement).execute(&mut *tx).await?;
            }
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(schema::SCHEMA_VERSION)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            info!("Database migrated to schema version {}", schema::SCHEMA_VERSION);
        } else {
            debug!("Database schema is current (version {})", version);
        }

        Ok(())
    }

    /// Connect and migrate in one step.
    pub async fn open(database_url: &str) -> Result<Self, PulseError> {
        let database = Self::new(database_url).await?;
        database.run_migrations().await?;
        Ok(database)
    }
}
