//! Configuration parsing and validation.
//!
//! hf-daily reads an optional TOML file, applies environment overrides on
//! top, and validates the result once at startup. The resulting [`Config`] is
//! immutable and handed by reference to each component constructor.
//!
//! ```toml
//! [db]
//! url = "sqlite://data/hf_daily.db"
//!
//! [catalog]
//! limits = [20, 50]
//! fetch_readme = true
//!
//! [llm]
//! base_url = "http://localhost:11434/v1"
//! model = "llama3"
//! temperature = 0.3
//! ```
//!
//! | Env var | Field |
//! |---------|-------|
//! | `DATABASE_URL` | `db.url` |
//! | `HUGGINGFACE_TOKEN` | `catalog.token` |
//! | `HF_API_BASE` | `catalog.api_base` |
//! | `LLM_BASE_URL` | `llm.base_url` |
//! | `LLM_API_KEY` | `llm.api_key` |
//! | `LLM_MODEL` | `llm.model` |
//! | `LLM_TEMPERATURE` | `llm.temperature` |
//! | `LLM_MAX_TOKENS` | `llm.max_tokens` |

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::models::ArtifactKind;

/// Config file read when `--config` is not given. Its absence is not an error.
pub const DEFAULT_CONFIG_PATH: &str = "./config/hf-daily.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_url")]
    pub url: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
        }
    }
}

fn default_db_url() -> String {
    "sqlite://data/hf_daily.db".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_site_base")]
    pub site_base: String,
    /// Optional bearer token; anonymous access works for public listings.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_kinds")]
    pub kinds: Vec<ArtifactKind>,
    /// Trending windows tried in order until one has an unfeatured item.
    #[serde(default = "default_limits")]
    pub limits: Vec<usize>,
    #[serde(default = "default_fetch_readme")]
    pub fetch_readme: bool,
    #[serde(default = "default_max_readme_chars")]
    pub max_readme_chars: usize,
    #[serde(default = "default_catalog_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            site_base: default_site_base(),
            token: None,
            kinds: default_kinds(),
            limits: default_limits(),
            fetch_readme: default_fetch_readme(),
            max_readme_chars: default_max_readme_chars(),
            timeout_secs: default_catalog_timeout_secs(),
        }
    }
}

impl CatalogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_api_base() -> String {
    "https://huggingface.co/api".to_string()
}
fn default_site_base() -> String {
    "https://huggingface.co".to_string()
}
fn default_kinds() -> Vec<ArtifactKind> {
    ArtifactKind::ALL.to_vec()
}
fn default_limits() -> Vec<usize> {
    vec![20, 50]
}
fn default_fetch_readme() -> bool {
    true
}
fn default_max_readme_chars() -> usize {
    20_000
}
fn default_catalog_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_api_key")]
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: default_llm_api_key(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_llm_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}
fn default_llm_api_key() -> String {
    "ollama".to_string()
}
fn default_llm_model() -> String {
    "llama3".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_llm_timeout_secs() -> u64 {
    120
}

/// Load the configuration.
///
/// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_PATH`] is
/// read if present and defaults are used otherwise. Environment overrides
/// are applied last, then the result is validated.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(p) => read_config_file(p)?,
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                read_config_file(&default_path)?
            } else {
                tracing::debug!("no config file at {}, using defaults", DEFAULT_CONFIG_PATH);
                Config::default()
            }
        }
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| "Failed to parse config file")
}

/// Overlay environment variables onto `config`. `lookup` is injected so
/// tests never touch the process environment.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("DATABASE_URL") {
        config.db.url = v;
    }
    if let Some(v) = get("HUGGINGFACE_TOKEN") {
        config.catalog.token = Some(v);
    }
    if let Some(v) = get("HF_API_BASE") {
        config.catalog.api_base = v;
    }
    if let Some(v) = get("LLM_BASE_URL") {
        config.llm.base_url = v;
    }
    if let Some(v) = get("LLM_API_KEY") {
        config.llm.api_key = v;
    }
    if let Some(v) = get("LLM_MODEL") {
        config.llm.model = v;
    }
    if let Some(v) = get("LLM_TEMPERATURE") {
        config.llm.temperature = parse_env("LLM_TEMPERATURE", &v)?;
    }
    if let Some(v) = get("LLM_MAX_TOKENS") {
        config.llm.max_tokens = parse_env("LLM_MAX_TOKENS", &v)?;
    }
    Ok(())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", key, value))
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate db
    if !config.db.url.starts_with("sqlite:") {
        bail!(
            "db.url must be a sqlite: connection string, got '{}'",
            config.db.url
        );
    }

    // Validate catalog
    if config.catalog.kinds.is_empty() {
        bail!("catalog.kinds must list at least one artifact kind");
    }
    if config.catalog.limits.is_empty() {
        bail!("catalog.limits must contain at least one window size");
    }
    if config.catalog.limits.contains(&0) {
        bail!("catalog.limits entries must be > 0");
    }
    if config.catalog.timeout_secs == 0 {
        bail!("catalog.timeout_secs must be > 0");
    }

    // Validate llm
    if config.llm.base_url.trim().is_empty() {
        bail!("llm.base_url must not be empty");
    }
    if config.llm.model.trim().is_empty() {
        bail!("llm.model must not be empty");
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.llm.max_tokens == 0 {
        bail!("llm.max_tokens must be > 0");
    }
    if config.llm.timeout_secs == 0 {
        bail!("llm.timeout_secs must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        validate(&config).unwrap();
        assert_eq!(config.catalog.limits, vec![20, 50]);
        assert_eq!(config.llm.model, "llama3");
        assert!(config.llm.temperature < 0.5);
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let config: Config = toml::from_str(include_str!("../config/hf-daily.example.toml")).unwrap();
        validate(&config).unwrap();
        let defaults = Config::default();
        assert_eq!(config.db.url, defaults.db.url);
        assert_eq!(config.catalog.kinds, defaults.catalog.kinds);
        assert_eq!(config.catalog.limits, defaults.catalog.limits);
        assert_eq!(config.catalog.max_readme_chars, defaults.catalog.max_readme_chars);
        assert_eq!(config.llm.model, defaults.llm.model);
        assert_eq!(config.llm.max_tokens, defaults.llm.max_tokens);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [llm]
            model = "qwen2.5"

            [catalog]
            kinds = ["dataset"]
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.model, "qwen2.5");
        assert_eq!(config.llm.max_tokens, 2000);
        assert_eq!(config.catalog.kinds, vec![ArtifactKind::Dataset]);
        assert_eq!(config.db.url, "sqlite://data/hf_daily.db");
    }

    #[test]
    fn test_env_overrides_win() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("DATABASE_URL", "sqlite::memory:"),
                ("HUGGINGFACE_TOKEN", "hf_abc"),
                ("LLM_MODEL", "mistral"),
                ("LLM_TEMPERATURE", "0.1"),
                ("LLM_MAX_TOKENS", "512"),
                ("LLM_API_KEY", ""),
            ]),
        )
        .unwrap();
        assert_eq!(config.db.url, "sqlite::memory:");
        assert_eq!(config.catalog.token.as_deref(), Some("hf_abc"));
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.max_tokens, 512);
        assert!((config.llm.temperature - 0.1).abs() < f32::EPSILON);
        // Empty values are ignored.
        assert_eq!(config.llm.api_key, "ollama");
    }

    #[test]
    fn test_bad_numeric_env_is_rejected() {
        let mut config = Config::default();
        let err = apply_env_overrides(&mut config, env(&[("LLM_MAX_TOKENS", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("LLM_MAX_TOKENS"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.db.url = "postgres://localhost/db".into();
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.catalog.limits = vec![20, 0];
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.llm.temperature = 3.5;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.catalog.kinds.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/hf-daily.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
