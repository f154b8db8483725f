//! Schema migrations for the report store.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// CLI entry point for `hf-daily init`.
pub async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    run_migrations(&pool).await?;
    pool.close().await;
    println!("Database initialized successfully.");
    Ok(())
}

/// Create the schema. Idempotent.
///
/// The UNIQUE constraint on `external_id` is the authoritative guard against
/// featuring an artifact twice; overlapping runs rely on it.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('model', 'dataset')),
            title TEXT NOT NULL,
            summary_markdown TEXT NOT NULL,
            project_ideas TEXT NOT NULL,
            source_url TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER)),
            UNIQUE(external_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reports_created_at ON reports(created_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
