//! PostgreSQL pool and schema setup

use chat_common::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Schema scripts compiled into the binary, applied in order
///
/// Every statement is idempotent so the set can run on each start.
const MIGRATIONS: &[(&str, &str)] = &[(
    "20250101000000_create_messages",
    include_str!("../../migrations/20250101000000_create_messages.sql"),
)];

/// Pool tuning on top of the configured connection bounds
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Longest wait for a free connection; an append that hits it fails
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl From<&DatabaseConfig> for PoolSettings {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections.min(config.max_connections),
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(300),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// Open the message store pool
pub async fn create_pool(settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
    tracing::debug!(
        max_connections = settings.max_connections,
        min_connections = settings.min_connections,
        "Opening PostgreSQL pool"
    );

    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .max_lifetime(settings.max_lifetime)
        .connect(&settings.url)
        .await
}

/// Apply the embedded schema scripts
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    for (name, sql) in MIGRATIONS {
        sqlx::raw_sql(sql).execute(pool).await?;
        tracing::debug!(migration = name, "Migration applied");
    }

    tracing::info!(count = MIGRATIONS.len(), "Database migrations applied");

    Ok(())
}
