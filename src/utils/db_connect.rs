// src/utils/db_connect.rs - Pooled PostgreSQL connections for the queue and reference stores
use anyhow::{Context, Result};
use bb8::{Pool, PooledConnection};
use bb8_postgres::PostgresConnectionManager;
use log::info;
use std::str::FromStr;
use std::time::Duration;
use tokio_postgres::{Config, NoTls};

use crate::utils::constants::{APPLICATION_NAME, DEFAULT_DATABASE_NAME};

pub type PgPool = Pool<PostgresConnectionManager<NoTls>>;
pub type PgConn<'a> = PooledConnection<'a, PostgresConnectionManager<NoTls>>;

/// Parses a `postgres://` URL or key=value connection string.
fn config_from_url(url: &str) -> Result<Config> {
    Config::from_str(url).context("DATABASE_URL is not a valid PostgreSQL connection string")
}

/// Builds the PostgreSQL config from `DATABASE_URL` when set, otherwise from
/// the individual `POSTGRES_*` variables.
fn build_pg_config() -> Result<Config> {
    let mut config = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => {
            info!("DB Config: using DATABASE_URL");
            config_from_url(url.trim())?
        }
        _ => {
            let mut config = Config::new();
            let host = std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
            let port = std::env::var("POSTGRES_PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(5432);
            let dbname =
                std::env::var("POSTGRES_DB").unwrap_or_else(|_| DEFAULT_DATABASE_NAME.to_string());
            let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string());
            let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_default();
            info!(
                "DB Config: Host={}, Port={}, DB={}, User={}",
                host, port, dbname, user
            );
            config
                .host(&host)
                .port(port)
                .dbname(&dbname)
                .user(&user)
                .password(&password);
            config
        }
    };
    if config.get_application_name().is_none() {
        config.application_name(APPLICATION_NAME);
    }
    if config.get_connect_timeout().is_none() {
        config.connect_timeout(Duration::from_secs(10));
    }
    Ok(config)
}

/// Initializes the database connection pool. Sized for `worker_count`
/// concurrent items plus the service loop's own queries.
pub async fn connect(worker_count: usize) -> Result<PgPool> {
    let config = build_pg_config()?;
    info!("Connecting to PostgreSQL database...");
    let manager = PostgresConnectionManager::new(config, NoTls);

    let max_size = (worker_count as u32).saturating_mul(2).clamp(4, 60);
    let pool = Pool::builder()
        .max_size(max_size)
        .min_idle(Some(2))
        .idle_timeout(Some(Duration::from_secs(180)))
        .connection_timeout(Duration::from_secs(15))
        .build(manager)
        .await
        .context("Failed to build database connection pool")?;

    // Test connection
    let conn = pool
        .get()
        .await
        .context("Failed to get test connection from pool")?;
    conn.query_one("SELECT 1", &[])
        .await
        .context("Test query 'SELECT 1' failed")?;
    info!("Database connection pool initialized successfully (max {} connections).", max_size);
    Ok(pool.clone())
}

/// `(total, idle, in_use)` connections in the pool.
pub fn get_pool_status(pool: &PgPool) -> (u32, u32, u32) {
    let state = pool.state();
    (
        state.connections,
        state.idle_connections,
        state.connections.saturating_sub(state.idle_connections),
    )
}
