//! Core data models used throughout hf-daily.
//!
//! These types represent the artifacts, generation payloads, and reports that
//! flow through the generation pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of project ideas every report carries.
pub const IDEA_COUNT: usize = 5;

/// The two artifact kinds the Hub lists as trending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Model,
    Dataset,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Model, ArtifactKind::Dataset];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Model => "model",
            ArtifactKind::Dataset => "dataset",
        }
    }

    /// Collection segment in Hub API paths (`/api/models`, `/api/datasets`).
    pub(crate) fn api_collection(&self) -> &'static str {
        match self {
            ArtifactKind::Model => "models",
            ArtifactKind::Dataset => "datasets",
        }
    }

    /// Prefix of the repo's public page path. Models live at the site root.
    pub(crate) fn page_prefix(&self) -> &'static str {
        match self {
            ArtifactKind::Model => "",
            ArtifactKind::Dataset => "datasets/",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" => Ok(ArtifactKind::Model),
            "dataset" => Ok(ArtifactKind::Dataset),
            other => Err(format!("unknown artifact kind: '{}'", other)),
        }
    }
}

/// A normalized trending artifact. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Hub repo id (`owner/name`), unique per kind.
    pub external_id: String,
    pub kind: ArtifactKind,
    pub name: String,
    pub author: String,
    /// Deduplicated, first-seen order.
    pub tags: Vec<String>,
    pub downloads: u64,
    pub likes: u64,
    pub last_modified: Option<DateTime<Utc>>,
    /// Empty when the catalog has none.
    pub description: String,
    pub pipeline_tag: Option<String>,
    pub library_name: Option<String>,
    pub trending_score: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    /// Model or dataset card front matter as compact JSON, length-capped.
    pub card_data: Option<String>,
}

impl Candidate {
    /// Public page of the artifact on the Hub.
    pub fn source_url(&self, site_base: &str) -> String {
        format!(
            "{}/{}{}",
            site_base.trim_end_matches('/'),
            self.kind.page_prefix(),
            self.external_id
        )
    }
}

/// The metadata handed to the model. Serialized verbatim into the prompt and
/// stored on the report as a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub name: String,
    pub author: String,
    pub tags: Vec<String>,
    pub downloads: u64,
    pub likes: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trending_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
}

impl GenerationRequest {
    pub fn from_candidate(candidate: &Candidate, readme: Option<String>) -> Self {
        Self {
            id: candidate.external_id.clone(),
            kind: candidate.kind,
            name: candidate.name.clone(),
            author: candidate.author.clone(),
            tags: candidate.tags.clone(),
            downloads: candidate.downloads,
            likes: candidate.likes,
            description: candidate.description.clone(),
            pipeline_tag: candidate.pipeline_tag.clone(),
            library_name: candidate.library_name.clone(),
            trending_score: candidate.trending_score,
            created_at: candidate.created_at.map(|t| t.to_rfc3339()),
            last_modified: candidate.last_modified.map(|t| t.to_rfc3339()),
            card_data: candidate.card_data.clone(),
            readme,
        }
    }

    /// Metadata snapshot without the README body, for storage.
    pub fn snapshot_json(&self) -> String {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}));
        if let Some(obj) = value.as_object_mut() {
            if let Some(readme) = obj.remove("readme") {
                let chars = readme.as_str().map(|s| s.chars().count()).unwrap_or(0);
                obj.insert("readme_chars".to_string(), serde_json::json!(chars));
            }
        }
        value.to_string()
    }
}

/// Validated model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub title: String,
    pub summary: String,
    pub ideas: [String; IDEA_COUNT],
}

/// A report ready to be inserted. `id` and `created_at` come from the store.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub external_id: String,
    pub kind: ArtifactKind,
    pub title: String,
    pub summary_markdown: String,
    pub project_ideas: [String; IDEA_COUNT],
    pub source_url: String,
    pub metadata_json: String,
}

/// A persisted report.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub id: i64,
    pub external_id: String,
    pub kind: ArtifactKind,
    pub title: String,
    pub summary_markdown: String,
    pub project_ideas: Vec<String>,
    pub source_url: String,
    pub metadata_json: String,
    pub created_at: DateTime<Utc>,
}
