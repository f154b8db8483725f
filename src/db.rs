//! SQLite connection management.
//!
//! WAL mode lets a scheduled run and a manual run overlap without blocking
//! readers, and the busy timeout makes a second writer wait for the first
//! instead of failing immediately.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Create a connection pool to the configured SQLite database.
///
/// The database file and its parent directory are created if missing.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    connect_url(&config.db.url).await
}

pub async fn connect_url(url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("Invalid database URL: {}", url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    // Ensure parent directory exists
    if let Some(parent) = options.get_filename().parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database {}", url))?;

    Ok(pool)
}
