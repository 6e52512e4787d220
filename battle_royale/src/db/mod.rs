//! Database module providing PostgreSQL connection pooling and the royale store.
//!
//! This module manages the database connection pool using sqlx, applies the
//! schema, and exposes the `RoyaleStore` trait with PostgreSQL and in-memory
//! implementations.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod config;
pub mod memory;
pub mod repository;
pub mod timeouts;

pub use config::DatabaseConfig;
pub use memory::MemoryRoyaleStore;
pub use repository::{PgRoyaleStore, RoyaleStore};

/// Initial schema
const SCHEMA: &str = include_str!("../../migrations/001_initial.sql");

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use battle_royale::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let config = DatabaseConfig::from_env();
    ///     let db = Database::new(&config).await?;
    ///     db.apply_schema().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables if they do not exist yet
    pub async fn apply_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Build a `PgRoyaleStore` over this pool
    pub fn royale_store(&self) -> PgRoyaleStore {
        PgRoyaleStore::new(self.pool.clone())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_declares_uniqueness() {
        assert!(SCHEMA.contains("code VARCHAR(8) NOT NULL UNIQUE"));
        assert!(SCHEMA.contains("UNIQUE (royale_id, user_id)"));
        assert!(SCHEMA.contains("UNIQUE (royale_id, round_number, match_index)"));
        assert!(SCHEMA.contains("UNIQUE (match_id, user_id)"));
        assert!(SCHEMA.contains("user_id TEXT PRIMARY KEY"));
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_database_connection() {
        let config = DatabaseConfig::from_env();
        let db = Database::new(&config)
            .await
            .expect("Failed to connect to database");
        db.apply_schema().await.expect("Failed to apply schema");
        db.royale_store()
            .health_check()
            .await
            .expect("Health check failed");
        db.close().await;
    }
}
