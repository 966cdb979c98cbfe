//! PostgreSQL connection pool
//!
//! Uses sqlx PgPool with explicit connection limits. While no pooled
//! connection is available, operations fail after `acquire_timeout`
//! instead of queueing.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;

use super::cache::{ConnectionCache, ConnectionError, Connector};
use crate::config::DatabaseConfig;

/// Connection cache over a PostgreSQL pool
pub type PgCache = ConnectionCache<PgConnector>;

/// Create a PostgreSQL connection pool.
///
/// # Errors
///
/// Returns an error if the first connection cannot be established.
///
/// # Example
///
/// ```ignore
/// let config = DatabaseConfig::from_env()?;
/// let pool = create_pool(&config).await?;
/// ```
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections())
        .acquire_timeout(config.acquire_timeout())
        .connect(config.url())
        .await
}

/// Round-trip a trivial query.
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Opens the process pool for a [`ConnectionCache`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

#[async_trait]
impl Connector for PgConnector {
    type Handle = PgPool;

    async fn connect(&self, config: &DatabaseConfig) -> Result<PgPool, ConnectionError> {
        let pool = create_pool(config).await?;
        health_check(&pool).await?;
        debug!(
            max_connections = config.max_connections(),
            idle = pool.num_idle(),
            "postgres pool established"
        );
        Ok(pool)
    }
}
