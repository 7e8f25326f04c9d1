use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use tracing::info;

use crate::config::Config;

/// Create a Postgres connection pool from the service configuration.
///
/// Every connection carries a server-side `statement_timeout` so a stuck
/// statement aborts its transaction instead of holding product row locks.
pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    let timeout_ms = config.statement_timeout.as_millis().to_string();
    let options = PgConnectOptions::from_str(&config.database_url)?
        .options([("statement_timeout", timeout_ms.as_str())]);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await?;

    info!(
        max_connections = config.max_connections,
        statement_timeout_ms = %timeout_ms,
        "PostgreSQL connection pool established"
    );
    Ok(pool)
}

/// Apply the bundled schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}
