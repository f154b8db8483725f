//! # hf-daily
//!
//! Publishes one report per day about a trending Hugging Face model or
//! dataset: a title, a markdown summary and five project ideas, generated by
//! an OpenAI-compatible language model and stored in SQLite.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌──────────┐
//! │ Catalog  │──▶│  Select  │──▶│ Generate  │──▶│  Writer  │
//! │ (HF Hub) │   │ (random) │   │ (LLM API) │   │ (SQLite) │
//! └──────────┘   └────┬─────┘   └───────────┘   └────┬─────┘
//!                     │         history lookup       │
//!                     └──────────── reports ◀────────┘
//! ```
//!
//! Each run fetches the trending lists, removes artifacts that already have
//! a report, picks one of the rest uniformly at random, grounds the model on
//! the artifact's metadata and README, validates the output and inserts it.
//! The table's unique index on `external_id` keeps an artifact from ever
//! being featured twice, even when runs overlap.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with environment overrides |
//! | [`models`] | Core data types |
//! | [`error`] | Pipeline error taxonomy |
//! | [`catalog`] | Hugging Face Hub client |
//! | [`completion`] | OpenAI-compatible chat client |
//! | [`select`] | Deduplicated random selection |
//! | [`generate`] | Prompt construction and output validation |
//! | [`writer`] | Report assembly and insert |
//! | [`store`] | Report persistence |
//! | [`pipeline`] | Run orchestration |
//! | [`reports`] | `list` / `get` rendering |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod catalog;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod generate;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod reports;
pub mod select;
pub mod store;
pub mod writer;
