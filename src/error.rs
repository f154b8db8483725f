//! Error taxonomy for the report pipeline.
//!
//! Every component returns [`PipelineError`]. The variants map one-to-one to
//! the ways a run can end badly, and the CLI decides which of them are fatal:
//! [`PipelineError::DuplicateReport`] is a lost race and counts as success,
//! [`PipelineError::NoCandidateAvailable`] is a skipped day, everything else
//! exits non-zero.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Convenience alias used across the library.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Longest payload excerpt kept in logs for malformed responses.
const PAYLOAD_EXCERPT_CHARS: usize = 2_000;

/// The external HTTP services a run talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    /// The Hugging Face Hub API.
    Catalog,
    /// The chat-completion endpoint.
    Completion,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upstream::Catalog => f.write_str("catalog"),
            Upstream::Completion => f.write_str("completion endpoint"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{upstream} unavailable: {message}")]
    UpstreamUnavailable { upstream: Upstream, message: String },

    #[error("{upstream} did not respond within {timeout:?}")]
    UpstreamTimeout {
        upstream: Upstream,
        timeout: Duration,
    },

    #[error("malformed {upstream} response: {message}")]
    UpstreamMalformed {
        upstream: Upstream,
        message: String,
        /// Raw body, kept for diagnosis.
        payload: String,
    },

    #[error("malformed generation output: {message}")]
    GenerationMalformed {
        message: String,
        /// Raw model text, kept for diagnosis.
        raw: String,
    },

    #[error("no candidate available: all {considered} trending items are already featured")]
    NoCandidateAvailable { considered: usize },

    #[error("a report for {external_id} already exists")]
    DuplicateReport { external_id: String },

    #[error("persistence error: {message}")]
    Persistence {
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },
}

impl PipelineError {
    /// Map a reqwest transport error to the taxonomy.
    pub(crate) fn from_transport(upstream: Upstream, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PipelineError::UpstreamTimeout { upstream, timeout }
        } else {
            PipelineError::UpstreamUnavailable {
                upstream,
                message: err.to_string(),
            }
        }
    }

    pub(crate) fn persistence(message: impl Into<String>, source: sqlx::Error) -> Self {
        PipelineError::Persistence {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Transient failures are expected to clear up by the next scheduled run.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::UpstreamUnavailable { .. } | PipelineError::UpstreamTimeout { .. }
        )
    }

    /// The raw payload attached to malformed-response errors, if any.
    pub fn payload(&self) -> Option<&str> {
        match self {
            PipelineError::UpstreamMalformed { payload, .. } => Some(payload),
            PipelineError::GenerationMalformed { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Shorten a payload for logging without splitting a UTF-8 character.
pub(crate) fn excerpt(payload: &str) -> String {
    if payload.chars().count() <= PAYLOAD_EXCERPT_CHARS {
        return payload.to_string();
    }
    let head: String = payload.chars().take(PAYLOAD_EXCERPT_CHARS).collect();
    format!("{}... [truncated]", head)
}
