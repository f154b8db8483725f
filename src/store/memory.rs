//! In-memory [`ReportStore`] used by tests.
//!
//! Mirrors the SQLite store's uniqueness rule on `external_id`.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{PipelineError, Result};
use crate::models::{NewReport, Report};

use super::ReportStore;

#[derive(Default)]
pub struct InMemoryReportStore {
    reports: Mutex<Vec<Report>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn already_featured(&self, external_ids: &HashSet<String>) -> Result<HashSet<String>> {
        let reports = self.reports.lock().unwrap_or_else(|e| e.into_inner());
        Ok(reports
            .iter()
            .filter(|r| external_ids.contains(&r.external_id))
            .map(|r| r.external_id.clone())
            .collect())
    }

    async fn insert_report(&self, report: &NewReport) -> Result<Report> {
        let mut reports = self.reports.lock().unwrap_or_else(|e| e.into_inner());
        if reports.iter().any(|r| r.external_id == report.external_id) {
            return Err(PipelineError::DuplicateReport {
                external_id: report.external_id.clone(),
            });
        }

        let stored = Report {
            id: reports.len() as i64 + 1,
            external_id: report.external_id.clone(),
            kind: report.kind,
            title: report.title.clone(),
            summary_markdown: report.summary_markdown.clone(),
            project_ideas: report.project_ideas.to_vec(),
            source_url: report.source_url.clone(),
            metadata_json: report.metadata_json.clone(),
            created_at: Utc::now(),
        };
        reports.push(stored.clone());
        Ok(stored)
    }

    async fn get_report(&self, id: i64) -> Result<Option<Report>> {
        let reports = self.reports.lock().unwrap_or_else(|e| e.into_inner());
        Ok(reports.iter().find(|r| r.id == id).cloned())
    }

    async fn list_reports(&self, limit: i64) -> Result<Vec<Report>> {
        let reports = self.reports.lock().unwrap_or_else(|e| e.into_inner());
        Ok(reports
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
