//! Report writer: turns a validated generation into a persisted [`Report`].

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::models::{Candidate, GenerationRequest, GenerationResult, NewReport, Report};
use crate::store::ReportStore;

pub struct ReportWriter {
    store: Arc<dyn ReportStore>,
    site_base: String,
}

impl ReportWriter {
    pub fn new(store: Arc<dyn ReportStore>, site_base: impl Into<String>) -> Self {
        Self {
            store,
            site_base: site_base.into(),
        }
    }

    /// Insert the report in a single uniqueness-guarded write.
    ///
    /// A concurrent run that already featured the same artifact surfaces as
    /// [`DuplicateReport`](crate::error::PipelineError::DuplicateReport); the
    /// caller decides how to treat it.
    pub async fn write(
        &self,
        candidate: &Candidate,
        request: &GenerationRequest,
        result: &GenerationResult,
    ) -> Result<Report> {
        write_report(self.store.as_ref(), candidate, request, result, &self.site_base).await
    }
}

pub async fn write_report(
    store: &dyn ReportStore,
    candidate: &Candidate,
    request: &GenerationRequest,
    result: &GenerationResult,
    site_base: &str,
) -> Result<Report> {
    let new_report = build_report(candidate, request, result, site_base);
    let report = store.insert_report(&new_report).await?;
    info!(id = report.id, "saved report '{}' for {}", report.title, report.external_id);
    Ok(report)
}

pub fn build_report(
    candidate: &Candidate,
    request: &GenerationRequest,
    result: &GenerationResult,
    site_base: &str,
) -> NewReport {
    NewReport {
        external_id: candidate.external_id.clone(),
        kind: candidate.kind,
        title: result.title.clone(),
        summary_markdown: result.summary.clone(),
        project_ideas: result.ideas.clone(),
        source_url: candidate.source_url(site_base),
        metadata_json: request.snapshot_json(),
    }
}
