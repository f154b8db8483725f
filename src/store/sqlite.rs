//! SQLite-backed [`ReportStore`].

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::error::{PipelineError, Result};
use crate::models::{ArtifactKind, NewReport, Report};

use super::ReportStore;

const SELECT_REPORT: &str = "SELECT id, external_id, kind, title, summary_markdown, project_ideas, \
     source_url, metadata_json, created_at FROM reports";

pub struct SqliteReportStore {
    pool: SqlitePool,
}

impl SqliteReportStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_report(row: &SqliteRow) -> Result<Report> {
    let kind: String = row.get("kind");
    let kind = kind
        .parse::<ArtifactKind>()
        .map_err(|message| PipelineError::Persistence {
            message,
            source: None,
        })?;

    let ideas_json: String = row.get("project_ideas");
    let project_ideas: Vec<String> =
        serde_json::from_str(&ideas_json).map_err(|e| PipelineError::Persistence {
            message: format!("corrupt project_ideas column: {}", e),
            source: None,
        })?;

    let created_at: i64 = row.get("created_at");
    let created_at = DateTime::<Utc>::from_timestamp(created_at, 0).unwrap_or_default();

    Ok(Report {
        id: row.get("id"),
        external_id: row.get("external_id"),
        kind,
        title: row.get("title"),
        summary_markdown: row.get("summary_markdown"),
        project_ideas,
        source_url: row.get("source_url"),
        metadata_json: row.get("metadata_json"),
        created_at,
    })
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn already_featured(&self, external_ids: &HashSet<String>) -> Result<HashSet<String>> {
        if external_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT external_id FROM reports WHERE external_id IN (");
        let mut ids = qb.separated(", ");
        for id in external_ids {
            ids.push_bind(id.clone());
        }
        ids.push_unseparated(")");

        let featured: Vec<String> = qb
            .build_query_scalar::<String>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PipelineError::persistence("failed to read report history", e))?;

        Ok(featured.into_iter().collect())
    }

    async fn insert_report(&self, report: &NewReport) -> Result<Report> {
        let ideas_json = serde_json::to_string(&report.project_ideas).map_err(|e| {
            PipelineError::Persistence {
                message: format!("failed to encode project ideas: {}", e),
                source: None,
            }
        })?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PipelineError::persistence("failed to begin transaction", e))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO reports (external_id, kind, title, summary_markdown, project_ideas, source_url, metadata_json)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&report.external_id)
        .bind(report.kind.as_str())
        .bind(&report.title)
        .bind(&report.summary_markdown)
        .bind(&ideas_json)
        .bind(&report.source_url)
        .bind(&report.metadata_json)
        .execute(&mut *tx)
        .await;

        // Dropping `tx` on an early return rolls the transaction back.
        let id = match inserted {
            Ok(done) => done.last_insert_rowid(),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(PipelineError::DuplicateReport {
                    external_id: report.external_id.clone(),
                });
            }
            Err(e) => return Err(PipelineError::persistence("failed to insert report", e)),
        };

        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_REPORT))
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| PipelineError::persistence("failed to read back inserted report", e))?;
        let stored = row_to_report(&row)?;

        tx.commit()
            .await
            .map_err(|e| PipelineError::persistence("failed to commit report", e))?;

        Ok(stored)
    }

    async fn get_report(&self, id: i64) -> Result<Option<Report>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_REPORT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PipelineError::persistence("failed to load report", e))?;

        row.as_ref().map(row_to_report).transpose()
    }

    async fn list_reports(&self, limit: i64) -> Result<Vec<Report>> {
        let rows = sqlx::query(&format!(
            "{} ORDER BY created_at DESC, id DESC LIMIT ?",
            SELECT_REPORT
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PipelineError::persistence("failed to list reports", e))?;

        rows.iter().map(row_to_report).collect()
    }
}
