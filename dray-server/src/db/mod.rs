//! Database module
//!
//! Handles PostgreSQL connection pools and migrations. Writes always go to
//! the primary; reads may be served from a replica pool when one is
//! configured.

pub mod models;
pub mod repository;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::core::Config;
use shared::error::AppError;

/// Database service — owns the write and read connection pools.
#[derive(Clone)]
pub struct DbService {
    /// Primary pool; all writes and transactional reads
    pub write: PgPool,
    /// Read pool; equals `write` unless a replica URL is configured
    pub read: PgPool,
}

impl DbService {
    /// Connect both pools and apply migrations on the primary.
    pub async fn new(config: &Config) -> Result<Self, AppError> {
        let write = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect primary: {e}")))?;

        let read = match &config.read_database_url {
            Some(url) => PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(url)
                .await
                .map_err(|e| AppError::database(format!("Failed to connect replica: {e}")))?,
            None => write.clone(),
        };

        tracing::info!(
            replica = config.read_database_url.is_some(),
            "Database connections established"
        );

        sqlx::migrate!("./migrations")
            .run(&write)
            .await
            .map_err(|e| AppError::database(format!("Failed to apply migrations: {e}")))?;
        tracing::info!("Database migrations applied");

        Ok(Self { write, read })
    }
}
