pub mod batches;
pub mod models;
pub mod recipes;
pub mod tags;

use crate::config::DatabaseConfig;
use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub type DbPool = Pool<Sqlite>;

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

async fn ensure_parent_dir(database_url: &str) -> Result<()> {
    if is_memory_url(database_url) {
        return Ok(());
    }
    if let Some(path) = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
    {
        let path = path.split('?').next().unwrap_or(path);
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }
    Ok(())
}

fn connect_options(database_url: &str, busy_timeout: Duration) -> Result<SqliteConnectOptions> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(busy_timeout);

    // WAL lets status polls and searches read while an import is writing
    if is_memory_url(database_url) {
        Ok(options)
    } else {
        Ok(options.journal_mode(SqliteJournalMode::Wal))
    }
}

/// Initialize database connection pool
pub async fn init_pool(database_url: &str) -> Result<DbPool> {
    ensure_parent_dir(database_url).await?;

    let options = connect_options(database_url, Duration::from_secs(5))?;

    // Every connection to `:memory:` opens its own empty database, so a
    // memory pool is pinned to a single connection that never expires.
    let pool = if is_memory_url(database_url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new().connect_with(options).await?
    };

    Ok(pool)
}

/// Initialize database connection pool with custom configuration
pub async fn init_pool_with_config(config: &DatabaseConfig) -> Result<DbPool> {
    if is_memory_url(&config.url) {
        return init_pool(&config.url).await;
    }

    ensure_parent_dir(&config.url).await?;

    let options = connect_options(&config.url, Duration::from_millis(config.busy_timeout_ms))?;

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Run database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
