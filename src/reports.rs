//! Reading stored reports back out.
//!
//! Backs the `hf-daily list` and `hf-daily get` commands. Both read through
//! [`ReportStore`] so the same formatting works against any store.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::models::Report;
use crate::store::{ReportStore, SqliteReportStore};

/// CLI entry point for `hf-daily list`.
pub async fn run_list(config: &Config, limit: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteReportStore::new(pool.clone());
    let reports = store.list_reports(limit).await;
    pool.close().await;
    let reports = reports?;

    if reports.is_empty() {
        println!("No reports yet.");
        return Ok(());
    }

    for report in &reports {
        println!("{}", format_list_line(report));
    }
    Ok(())
}

/// CLI entry point for `hf-daily get`.
pub async fn run_get(config: &Config, id: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteReportStore::new(pool.clone());
    let report = store.get_report(id).await;
    pool.close().await;

    let report = match report? {
        Some(r) => r,
        None => bail!("report not found: {}", id),
    };

    print!("{}", format_report(&report));
    Ok(())
}

pub fn format_list_line(report: &Report) -> String {
    format!(
        "{:>5}  {}  {:<7}  {}  ({})",
        report.id,
        format_ts_iso(report),
        report.kind,
        report.title,
        report.external_id
    )
}

/// Full plain-text rendering of one report.
pub fn format_report(report: &Report) -> String {
    let mut out = String::new();
    out.push_str("--- Report ---\n");
    out.push_str(&format!("id:           {}\n", report.id));
    out.push_str(&format!("title:        {}\n", report.title));
    out.push_str(&format!("artifact:     {} ({})\n", report.external_id, report.kind));
    out.push_str(&format!("source_url:   {}\n", report.source_url));
    out.push_str(&format!("created_at:   {}\n", format_ts_iso(report)));
    out.push_str("\n--- Summary ---\n");
    out.push_str(&report.summary_markdown);
    out.push_str("\n\n--- Project ideas ---\n");
    for (i, idea) in report.project_ideas.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, idea));
    }
    out
}

fn format_ts_iso(report: &Report) -> String {
    report.created_at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArtifactKind;
    use chrono::{TimeZone, Utc};

    fn report() -> Report {
        Report {
            id: 7,
            external_id: "acme/tiny-llm".to_string(),
            kind: ArtifactKind::Model,
            title: "Tiny LLM".to_string(),
            summary_markdown: "A **small** model.".to_string(),
            project_ideas: ["a", "b", "c", "d", "e"].map(String::from).to_vec(),
            source_url: "https://huggingface.co/acme/tiny-llm".to_string(),
            metadata_json: "{}".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_list_line() {
        let line = format_list_line(&report());
        assert!(line.contains("2026-03-01T06:00:00Z"));
        assert!(line.contains("model"));
        assert!(line.ends_with("Tiny LLM  (acme/tiny-llm)"));
    }

    #[test]
    fn test_full_report_lists_ideas_in_order() {
        let text = format_report(&report());
        assert!(text.contains("title:        Tiny LLM"));
        assert!(text.contains("A **small** model."));
        let a = text.find("1. a").unwrap();
        let e = text.find("5. e").unwrap();
        assert!(a < e);
    }
}
