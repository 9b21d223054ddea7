pub mod functions;

use anyhow::{Context, Result, anyhow};
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

use crate::config::AppConfig;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/");

/// Build the r2d2 connection pool described by `config`.
///
/// Creating the database itself and retrying an unreachable server are left
/// to the deployment; a failure here is returned to the caller.
pub fn create_pool(config: &AppConfig) -> Result<PgPool> {
    info!(
        "Connecting to database {} (max {} connections)",
        config.redacted_database_url(),
        config.max_connections
    );

    let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
    let pool = Pool::builder()
        .max_size(config.max_connections)
        .connection_timeout(config.query_timeout)
        .build(manager)
        .context("Failed to create database connection pool")?;

    info!("Database connection pool created");
    Ok(pool)
}

/// Apply any pending embedded migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool.get().context("Failed to get connection for migrations")?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow!("Failed to run migrations: {}", e))?;
        if applied.is_empty() {
            info!("Database schema is up to date");
        } else {
            info!("Applied {} migration(s)", applied.len());
        }
        Ok(())
    })
    .await?
}
