//! Report persistence abstraction.
//!
//! The [`ReportStore`] trait is the only shared mutable resource a run
//! touches. It covers the history lookup used for deduplication, the single
//! insert performed by the report writer, and the reads behind `list` and
//! `get`.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`already_featured`](ReportStore::already_featured) | Subset of ids that already have a report |
//! | [`insert_report`](ReportStore::insert_report) | Atomic, uniqueness-guarded insert |
//! | [`get_report`](ReportStore::get_report) | One report by id |
//! | [`list_reports`](ReportStore::list_reports) | Newest reports first |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NewReport, Report};

pub use memory::InMemoryReportStore;
pub use sqlite::SqliteReportStore;

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Return the subset of `external_ids` that already have a report.
    ///
    /// Always reads committed state; implementations must not cache.
    async fn already_featured(&self, external_ids: &HashSet<String>) -> Result<HashSet<String>>;

    /// Insert a report and return it with its store-assigned `id` and
    /// `created_at`.
    ///
    /// Fails with [`DuplicateReport`](crate::error::PipelineError::DuplicateReport)
    /// when a report for the same `external_id` exists. Either the full row is
    /// written or nothing is.
    async fn insert_report(&self, report: &NewReport) -> Result<Report>;

    async fn get_report(&self, id: i64) -> Result<Option<Report>>;

    async fn list_reports(&self, limit: i64) -> Result<Vec<Report>>;
}
