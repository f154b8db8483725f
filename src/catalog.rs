//! Hugging Face Hub catalog client.
//!
//! Lists trending models and datasets and normalizes each record into a
//! [`Candidate`]. A single bad record is dropped with a warning; only a body
//! that is not a JSON array fails the whole fetch.
//!
//! # Endpoints
//!
//! | Call | Request |
//! |------|---------|
//! | trending | `GET {api_base}/{models,datasets}?sort=trendingScore&direction=-1&limit=N&full=true` |
//! | README | `GET {site_base}/[datasets/]{id}/raw/main/README.md` |

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::CatalogConfig;
use crate::error::{excerpt, PipelineError, Result, Upstream};
use crate::models::{ArtifactKind, Candidate};

/// Card data travels into the prompt even without a README, so it is bounded.
const MAX_CARD_DATA_CHARS: usize = 2_000;

/// Source of trending artifacts.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Trending artifacts for each kind, merged in `kinds` order, each list in
    /// catalog rank order.
    async fn fetch_trending(&self, kinds: &[ArtifactKind], limit: usize) -> Result<Vec<Candidate>>;

    /// README of a selected artifact. `Ok(None)` when unavailable.
    async fn fetch_readme(&self, _candidate: &Candidate) -> Result<Option<String>> {
        Ok(None)
    }
}

/// [`CatalogSource`] backed by the public Hub REST API.
pub struct HubCatalogClient {
    client: reqwest::Client,
    api_base: String,
    site_base: String,
    token: Option<String>,
    timeout: Duration,
    max_readme_chars: usize,
}

impl HubCatalogClient {
    pub fn new(config: &CatalogConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("hf-daily/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build catalog HTTP client")?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            site_base: config.site_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            timeout: config.timeout(),
            max_readme_chars: config.max_readme_chars,
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch_kind(&self, kind: ArtifactKind, limit: usize) -> Result<Vec<Candidate>> {
        let url = format!("{}/{}", self.api_base, kind.api_collection());
        debug!(%kind, limit, "fetching trending list from {}", url);

        let response = self
            .get(&url)
            .query(&[
                ("sort", "trendingScore".to_string()),
                ("direction", "-1".to_string()),
                ("limit", limit.to_string()),
                ("full", "true".to_string()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::from_transport(Upstream::Catalog, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::UpstreamUnavailable {
                upstream: Upstream::Catalog,
                message: format!("GET {} returned {}", url, status),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::from_transport(Upstream::Catalog, self.timeout, e))?;

        parse_trending_payload(kind, &body)
    }
}

#[async_trait]
impl CatalogSource for HubCatalogClient {
    async fn fetch_trending(&self, kinds: &[ArtifactKind], limit: usize) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();
        for &kind in kinds {
            let batch = self.fetch_kind(kind, limit).await?;
            info!(%kind, count = batch.len(), "fetched trending {}s", kind);
            candidates.extend(batch);
        }
        Ok(candidates)
    }

    async fn fetch_readme(&self, candidate: &Candidate) -> Result<Option<String>> {
        let url = format!(
            "{}/{}{}/raw/main/README.md",
            self.site_base,
            candidate.kind.page_prefix(),
            candidate.external_id
        );

        let response = match self.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("could not fetch README for {}: {}", candidate.external_id, e);
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            warn!(
                "README for {} not available ({})",
                candidate.external_id,
                response.status()
            );
            return Ok(None);
        }

        match response.text().await {
            Ok(content) => {
                let content = truncate_readme(content, self.max_readme_chars);
                info!(
                    "fetched README for {} ({} chars)",
                    candidate.external_id,
                    content.chars().count()
                );
                Ok(Some(content))
            }
            Err(e) => {
                warn!("could not read README for {}: {}", candidate.external_id, e);
                Ok(None)
            }
        }
    }
}

/// A trending record as the Hub returns it. Everything is optional so one
/// bad field never fails deserialization of the record as a whole.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    id: Option<String>,
    author: Option<String>,
    #[serde(default)]
    tags: Vec<serde_json::Value>,
    downloads: Option<u64>,
    likes: Option<u64>,
    last_modified: Option<String>,
    created_at: Option<String>,
    description: Option<String>,
    #[serde(rename = "pipeline_tag")]
    pipeline_tag: Option<String>,
    #[serde(rename = "library_name")]
    library_name: Option<String>,
    trending_score: Option<f64>,
    card_data: Option<serde_json::Value>,
}

/// Parse one trending response body into candidates of `kind`.
pub fn parse_trending_payload(kind: ArtifactKind, body: &str) -> Result<Vec<Candidate>> {
    let malformed = |message: String| {
        warn!(%kind, payload = %excerpt(body), "unparsable catalog response: {}", message);
        PipelineError::UpstreamMalformed {
            upstream: Upstream::Catalog,
            message,
            payload: body.to_string(),
        }
    };

    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;
    let entries = value
        .as_array()
        .ok_or_else(|| malformed("expected a JSON array of records".to_string()))?;

    let mut candidates = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match normalize_entry(kind, entry) {
            Ok(candidate) => candidates.push(candidate),
            Err(reason) => {
                warn!(%kind, index, record = %excerpt(&entry.to_string()), "dropping catalog record: {}", reason);
            }
        }
    }
    Ok(candidates)
}

fn normalize_entry(kind: ArtifactKind, entry: &serde_json::Value) -> std::result::Result<Candidate, String> {
    if !entry.is_object() {
        return Err("record is not a JSON object".to_string());
    }
    let raw: RawEntry = serde_json::from_value(entry.clone()).map_err(|e| e.to_string())?;

    let external_id = raw
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| "record has no id".to_string())?;

    let (owner, name) = match external_id.rsplit_once('/') {
        Some((owner, name)) => (owner.to_string(), name.to_string()),
        None => (String::new(), external_id.clone()),
    };
    if name.is_empty() {
        return Err(format!("record {} has no name", external_id));
    }

    let author = raw
        .author
        .filter(|a| !a.trim().is_empty())
        .unwrap_or(owner);

    let tags = dedup_preserving_order(
        raw.tags
            .into_iter()
            .filter_map(|t| t.as_str().map(str::to_string)),
    );

    let description = raw
        .description
        .or_else(|| {
            raw.card_data
                .as_ref()
                .and_then(|c| c.get("description"))
                .and_then(|d| d.as_str())
                .map(str::to_string)
        })
        .unwrap_or_default();

    Ok(Candidate {
        external_id,
        kind,
        name,
        author,
        tags,
        downloads: raw.downloads.unwrap_or(0),
        likes: raw.likes.unwrap_or(0),
        last_modified: raw.last_modified.as_deref().and_then(parse_timestamp),
        description,
        pipeline_tag: raw.pipeline_tag,
        library_name: raw.library_name,
        trending_score: raw.trending_score,
        created_at: raw.created_at.as_deref().and_then(parse_timestamp),
        card_data: raw.card_data.as_ref().and_then(card_data_excerpt),
    })
}

/// Compact JSON of the card front matter, capped at [`MAX_CARD_DATA_CHARS`].
fn card_data_excerpt(card: &serde_json::Value) -> Option<String> {
    match card {
        serde_json::Value::Object(map) if !map.is_empty() => {}
        _ => return None,
    }
    let text = card.to_string();
    if text.chars().count() <= MAX_CARD_DATA_CHARS {
        return Some(text);
    }
    Some(text.chars().take(MAX_CARD_DATA_CHARS).collect())
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Drop repeated tags, keeping the first occurrence of each.
pub fn dedup_preserving_order<I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    tags.into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Cap README length, marking the cut.
pub fn truncate_readme(content: String, max_chars: usize) -> String {
    let total = content.chars().count();
    if total <= max_chars {
        return content;
    }
    info!("README is {} chars, truncating to {}", total, max_chars);
    let mut cut: String = content.chars().take(max_chars).collect();
    cut.push_str("\n\n[... truncated ...]");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_id_is_dropped() {
        let body = r#"[
            {"id": "acme/llm-7b", "author": "acme", "downloads": 1200, "likes": 40, "tags": ["text-generation"]},
            {"author": "ghost", "downloads": 5},
            {"id": "acme/", "downloads": 1},
            "not an object",
            {"id": "solo-model", "likes": 3}
        ]"#;

        let candidates = parse_trending_payload(ArtifactKind::Model, body).unwrap();
        let ids: Vec<&str> = candidates.iter().map(|c| c.external_id.as_str()).collect();
        assert_eq!(ids, vec!["acme/llm-7b", "solo-model"]);
        assert_eq!(candidates[0].name, "llm-7b");
        assert_eq!(candidates[1].name, "solo-model");
    }

    #[test]
    fn test_normalization_fills_defaults() {
        let body = r#"[{
            "id": "org/corpus",
            "tags": ["nlp", "en", "nlp", "license:mit", "en"],
            "lastModified": "2024-05-01T12:30:00.000Z",
            "trendingScore": 17.5
        }]"#;

        let candidates = parse_trending_payload(ArtifactKind::Dataset, body).unwrap();
        let c = &candidates[0];
        assert_eq!(c.kind, ArtifactKind::Dataset);
        assert_eq!(c.author, "org");
        assert_eq!(c.description, "");
        assert_eq!(c.downloads, 0);
        assert_eq!(c.likes, 0);
        assert_eq!(c.tags, vec!["nlp", "en", "license:mit"]);
        assert_eq!(c.trending_score, Some(17.5));
        assert_eq!(
            c.last_modified.unwrap().to_rfc3339(),
            "2024-05-01T12:30:00+00:00"
        );
    }

    #[test]
    fn test_model_fields_carried() {
        let body = r#"[{
            "id": "acme/vision",
            "pipeline_tag": "image-classification",
            "library_name": "transformers",
            "cardData": {"description": "Classifies images."},
            "lastModified": "not a date"
        }]"#;
        let c = &parse_trending_payload(ArtifactKind::Model, body).unwrap()[0];
        assert_eq!(c.pipeline_tag.as_deref(), Some("image-classification"));
        assert_eq!(c.library_name.as_deref(), Some("transformers"));
        assert_eq!(c.description, "Classifies images.");
        assert!(c.last_modified.is_none());
    }

    #[test]
    fn test_card_data_is_carried_and_capped() {
        let body = r#"[
            {"id": "acme/vision", "cardData": {"license": "apache-2.0", "language": ["en"]}},
            {"id": "acme/empty", "cardData": {}},
            {"id": "acme/none"}
        ]"#;
        let candidates = parse_trending_payload(ArtifactKind::Model, body).unwrap();
        let card: serde_json::Value =
            serde_json::from_str(candidates[0].card_data.as_deref().unwrap()).unwrap();
        assert_eq!(card["license"], "apache-2.0");
        assert!(candidates[1].card_data.is_none());
        assert!(candidates[2].card_data.is_none());

        let long = serde_json::json!([{"id": "acme/long", "cardData": {"notes": "x".repeat(5000)}}]);
        let c = &parse_trending_payload(ArtifactKind::Model, &long.to_string()).unwrap()[0];
        assert_eq!(c.card_data.as_ref().unwrap().chars().count(), MAX_CARD_DATA_CHARS);
    }

    #[test]
    fn test_non_array_body_is_malformed() {
        let err = parse_trending_payload(ArtifactKind::Model, r#"{"error": "nope"}"#).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UpstreamMalformed { upstream: Upstream::Catalog, .. }
        ));
        assert_eq!(err.payload(), Some(r#"{"error": "nope"}"#));

        let err = parse_trending_payload(ArtifactKind::Model, "<html>").unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamMalformed { .. }));
    }

    #[test]
    fn test_empty_array_is_not_an_error() {
        assert!(parse_trending_payload(ArtifactKind::Model, "[]")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_readme_truncation_marks_cut() {
        let short = truncate_readme("hello".to_string(), 10);
        assert_eq!(short, "hello");

        let long = truncate_readme("ü".repeat(30), 10);
        assert!(long.starts_with(&"ü".repeat(10)));
        assert!(long.ends_with("[... truncated ...]"));
    }
}
