//! Grounded report generation.
//!
//! Builds a prompt that confines the model to the artifact's own metadata,
//! sends it through a [`CompletionClient`], and turns the raw answer into a
//! validated [`GenerationResult`].
//!
//! # Output convention
//!
//! The model is asked for a JSON object with `title`, `summary` and `ideas`.
//! Models do not always comply, so [`parse_generation`] accepts:
//!
//! 1. the JSON object, optionally wrapped in a Markdown code fence or
//!    surrounded by prose;
//! 2. labeled sections, also tried when the JSON object is incomplete:
//!
//! ```text
//! Title: <one line>
//! Summary:
//! <one or more paragraphs>
//! Ideas:
//! 1. <idea>
//! 2. <idea>
//! ...
//! ```
//!
//! Either way the result must have a non-empty title and summary and at
//! least five ideas; extra ideas beyond the fifth are discarded.
//!
//! Grounding is enforced by instruction only. Nothing checks afterwards that
//! the ideas stick to the supplied facts.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::completion::{ChatMessage, CompletionClient, CompletionRequest};
use crate::config::LlmConfig;
use crate::error::{excerpt, PipelineError, Result};
use crate::models::{GenerationRequest, GenerationResult, IDEA_COUNT};

pub const SYSTEM_PROMPT: &str = r#"You write the daily digest entry for one trending Hugging Face model or dataset.

You receive the artifact's metadata as JSON: its id, type (model or dataset), name, author, tags, download and like counts, and, when available, its description, pipeline tag, library, dates, card data and README.

Use ONLY that metadata. Do not invent capabilities, benchmarks, sizes, licenses or authors that the metadata does not state. When a README is present it is the most authoritative source. When the metadata is sparse, say so plainly instead of guessing.

Produce:
- "title": a concise, specific headline, under 100 characters.
- "summary": two to four short paragraphs of Markdown describing what the artifact is, who published it, what it is for, and why it may be trending, as far as the metadata supports.
- "ideas": exactly 5 concrete project ideas, each one or two sentences, each explicitly building on at least one stated metadata fact (a tag, the pipeline tag, the library, the description or the README).

Answer with a single JSON object with the keys "title", "summary" and "ideas", where "ideas" is an array of 5 plain strings. No text outside the JSON object."#;

/// Model settings applied to every generation call.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&LlmConfig> for GenerationSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

pub struct GroundingGenerator {
    client: Arc<dyn CompletionClient>,
    settings: GenerationSettings,
}

impl GroundingGenerator {
    pub fn new(client: Arc<dyn CompletionClient>, settings: GenerationSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Generate a title, summary and five ideas for `request`.
    ///
    /// Exactly one completion call is made; failures are returned as-is.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let messages = build_messages(request);
        let prompt_chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
        info!(
            model = %self.settings.model,
            readme = request.readme.is_some(),
            "generating report for {} ({} prompt chars)",
            request.id,
            prompt_chars
        );

        let completion = CompletionRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };
        let raw = self.client.complete(&completion).await?;
        debug!(raw = %excerpt(&raw), "raw model output");

        match parse_generation(&raw) {
            Ok(result) => {
                info!("model produced report '{}'", result.title);
                Ok(result)
            }
            Err(e) => {
                warn!(payload = %excerpt(&raw), "rejected model output: {}", e);
                Err(e)
            }
        }
    }
}

/// System and user messages for one artifact.
pub fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    let metadata = serde_json::to_string_pretty(request).unwrap_or_else(|_| "{}".to_string());
    let user = format!(
        "Metadata for today's trending Hugging Face {}:\n\n```json\n{}\n```\n\n\
         Write the report as a JSON object with the keys \"title\", \"summary\" and \"ideas\". \
         \"ideas\" must be an array of exactly {} plain strings.",
        request.kind, metadata, IDEA_COUNT
    );
    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}

/// Parse raw model text into a validated [`GenerationResult`].
pub fn parse_generation(raw: &str) -> Result<GenerationResult> {
    let text = strip_code_fence(raw.trim());

    // Labeled answers may quote JSON; only objects with report keys count.
    let from_json = find_json_object(text)
        .filter(has_report_keys)
        .map(|obj| {
            let (title, summary, ideas) = fields_from_json(&obj);
            finalize(title, summary, ideas, raw)
        });

    let (title, summary, ideas) = fields_from_sections(text);
    match from_json {
        Some(Ok(result)) => Ok(result),
        Some(Err(json_err)) => finalize(title, summary, ideas, raw).map_err(|_| json_err),
        None => finalize(title, summary, ideas, raw),
    }
}

fn has_report_keys(obj: &serde_json::Map<String, serde_json::Value>) -> bool {
    ["title", "summary", "ideas"].iter().any(|key| obj.contains_key(*key))
}

fn malformed(message: impl Into<String>, raw: &str) -> PipelineError {
    PipelineError::GenerationMalformed {
        message: message.into(),
        raw: raw.to_string(),
    }
}

fn finalize(
    title: String,
    summary: String,
    mut ideas: Vec<String>,
    raw: &str,
) -> Result<GenerationResult> {
    if title.is_empty() {
        return Err(malformed("missing title", raw));
    }
    if summary.is_empty() {
        return Err(malformed("missing summary", raw));
    }
    if ideas.len() < IDEA_COUNT {
        return Err(malformed(
            format!("expected {} project ideas, found {}", IDEA_COUNT, ideas.len()),
            raw,
        ));
    }
    if ideas.len() > IDEA_COUNT {
        warn!("model returned {} ideas, keeping the first {}", ideas.len(), IDEA_COUNT);
        ideas.truncate(IDEA_COUNT);
    }

    let ideas: [String; IDEA_COUNT] = ideas
        .try_into()
        .map_err(|_| malformed("could not collect project ideas", raw))?;

    Ok(GenerationResult {
        title,
        summary,
        ideas,
    })
}

fn strip_code_fence(text: &str) -> &str {
    if !text.starts_with("```") {
        return text;
    }
    // Drop the opening fence line (which may carry a language tag).
    let body = match text.split_once('\n') {
        Some((_, rest)) => rest,
        None => return text,
    };
    match body.rsplit_once("```") {
        Some((inner, _)) => inner.trim(),
        None => body.trim(),
    }
}

fn find_json_object(text: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    let parse = |s: &str| match serde_json::from_str::<serde_json::Value>(s) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    };

    if let Some(map) = parse(text) {
        return Some(map);
    }
    // Tolerate prose around the object.
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    parse(&text[start..=end])
}

fn fields_from_json(obj: &serde_json::Map<String, serde_json::Value>) -> (String, String, Vec<String>) {
    let text_field = |key: &str| {
        obj.get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    let ideas = obj
        .get("ideas")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(idea_text).collect())
        .unwrap_or_default();

    (text_field("title"), text_field("summary"), ideas)
}

/// Text of one idea. Objects are reduced to their most descriptive field.
fn idea_text(value: &serde_json::Value) -> Option<String> {
    let text = match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(map) => ["description", "name", "idea", "title"]
            .iter()
            .find_map(|key| map.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string),
        _ => None,
    }?;
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Title,
    Summary,
    Ideas,
}

/// Recognize a `Title:` / `Summary:` / `Ideas:` label, tolerating Markdown
/// decoration such as `## Title:` or `**Title:**`.
fn section_label(line: &str) -> Option<(Section, &str)> {
    let stripped = line
        .trim()
        .trim_start_matches(|c| c == '#' || c == '*')
        .trim_start();
    let (label, rest) = stripped.split_once(':')?;
    let section = match label.trim().trim_end_matches('*').to_ascii_lowercase().as_str() {
        "title" => Section::Title,
        "summary" => Section::Summary,
        "ideas" | "project ideas" => Section::Ideas,
        _ => return None,
    };
    Some((section, rest.trim().trim_matches('*').trim()))
}

fn strip_list_marker(line: &str) -> Option<&str> {
    let t = line.trim_start();
    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = t.strip_prefix(bullet) {
            return Some(rest.trim());
        }
    }
    let digits = t.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &t[digits..];
    rest.strip_prefix('.')
        .or_else(|| rest.strip_prefix(')'))
        .map(str::trim)
}

fn fields_from_sections(text: &str) -> (String, String, Vec<String>) {
    let mut title = String::new();
    let mut summary_lines: Vec<&str> = Vec::new();
    let mut ideas: Vec<String> = Vec::new();
    let mut current: Option<Section> = None;

    for line in text.lines() {
        if let Some((section, inline)) = section_label(line) {
            current = Some(section);
            match section {
                Section::Title => title = inline.to_string(),
                Section::Summary if !inline.is_empty() => summary_lines.push(inline),
                Section::Ideas if !inline.is_empty() => ideas.push(inline.to_string()),
                _ => {}
            }
            continue;
        }

        match current {
            Some(Section::Title) => {
                if title.is_empty() && !line.trim().is_empty() {
                    title = line.trim().trim_start_matches('#').trim().to_string();
                }
            }
            Some(Section::Summary) => summary_lines.push(line),
            Some(Section::Ideas) => {
                if let Some(item) = strip_list_marker(line) {
                    if !item.is_empty() {
                        ideas.push(item.to_string());
                    }
                } else if !line.trim().is_empty() {
                    // Continuation of a wrapped idea.
                    if let Some(last) = ideas.last_mut() {
                        last.push(' ');
                        last.push_str(line.trim());
                    }
                }
            }
            None => {}
        }
    }

    let summary = summary_lines.join("\n").trim().to_string();
    (title.trim().to_string(), summary, ideas)
}
