//! `PostgreSQL` connection handling for the leaderboard tables.

use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};

use contest_core::config::DatabaseConfig;

/// Owns the connection pool and keeps the schema current.
///
/// Migrations are embedded in the binary and applied on connect, so a
/// fresh database needs no manual setup before the first sampling pass.
#[derive(Debug, Clone)]
pub struct DatabaseClient {
    pool: PgPool,
}

impl DatabaseClient {
    /// Connects to the database and applies any pending migrations.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established or a
    /// migration fails.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Clones a pool handle for a repository.
    #[must_use]
    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }
}
