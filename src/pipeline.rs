//! Report pipeline orchestration.
//!
//! One run moves through `Fetching → Selecting → Generating → Writing` and
//! ends either `Done` (`Ok(RunOutcome)`) or `Failed` (`Err(RunFailure)`,
//! tagged with the stage it failed in). Nothing is retried inside a run.
//!
//! Nothing is written before the final insert, so aborting a run at any
//! await point leaves no trace. Two overlapping runs may pick the same
//! artifact; the store's unique index lets exactly one of them win and the
//! other ends as [`RunOutcome::AlreadyPublished`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::catalog::{CatalogSource, HubCatalogClient};
use crate::completion::OpenAiChatClient;
use crate::config::Config;
use crate::db;
use crate::error::PipelineError;
use crate::generate::{GenerationSettings, GroundingGenerator};
use crate::migrate;
use crate::models::{ArtifactKind, Candidate, GenerationRequest, GenerationResult, Report};
use crate::select::select_candidate;
use crate::store::{ReportStore, SqliteReportStore};
use crate::writer::ReportWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Selecting,
    Generating,
    Writing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetching => "fetching",
            Stage::Selecting => "selecting",
            Stage::Generating => "generating",
            Stage::Writing => "writing",
        })
    }
}

/// How a successful run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Published(Report),
    /// Another run inserted a report for the same artifact first.
    AlreadyPublished { external_id: String },
    /// `dry_run` was set; generation succeeded and nothing was written.
    DryRun {
        candidate: Candidate,
        result: GenerationResult,
    },
}

#[derive(Debug, Error)]
#[error("{stage} failed: {error}")]
pub struct RunFailure {
    pub stage: Stage,
    #[source]
    pub error: PipelineError,
}

impl RunFailure {
    /// The run was skipped because every trending item is already featured.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.error, PipelineError::NoCandidateAvailable { .. })
    }
}

fn failed(stage: Stage) -> impl FnOnce(PipelineError) -> RunFailure {
    move |error| RunFailure { stage, error }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub kinds: Vec<ArtifactKind>,
    /// Trending windows, tried in order until one has an unfeatured item.
    pub limits: Vec<usize>,
    pub fetch_readme: bool,
    pub site_base: String,
    pub dry_run: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            kinds: config.catalog.kinds.clone(),
            limits: config.catalog.limits.clone(),
            fetch_readme: config.catalog.fetch_readme,
            site_base: config.catalog.site_base.clone(),
            dry_run: false,
        }
    }
}

pub struct Pipeline {
    catalog: Arc<dyn CatalogSource>,
    store: Arc<dyn ReportStore>,
    generator: GroundingGenerator,
    writer: ReportWriter,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        store: Arc<dyn ReportStore>,
        generator: GroundingGenerator,
        options: PipelineOptions,
    ) -> Self {
        let writer = ReportWriter::new(store.clone(), options.site_base.clone());
        Self {
            catalog,
            store,
            generator,
            writer,
            options,
        }
    }

    /// Wire the Hub catalog and OpenAI-compatible clients from `config`.
    pub fn from_config(config: &Config, store: Arc<dyn ReportStore>) -> anyhow::Result<Self> {
        let catalog = Arc::new(HubCatalogClient::new(&config.catalog)?);
        let completion = Arc::new(OpenAiChatClient::new(&config.llm)?);
        let generator = GroundingGenerator::new(completion, GenerationSettings::from(&config.llm));
        Ok(Self::new(
            catalog,
            store,
            generator,
            PipelineOptions::from_config(config),
        ))
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.options.dry_run = dry_run;
        self
    }

    /// Execute one run.
    pub async fn run<R>(&self, rng: &mut R) -> Result<RunOutcome, RunFailure>
    where
        R: Rng + ?Sized + Send,
    {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id);
        self.run_inner(rng).instrument(span).await
    }

    async fn run_inner<R>(&self, rng: &mut R) -> Result<RunOutcome, RunFailure>
    where
        R: Rng + ?Sized + Send,
    {
        let candidate = self.select(rng).await?;
        info!(
            stage = %Stage::Generating,
            "selected {} ({})",
            candidate.external_id,
            candidate.kind
        );

        let readme = if self.options.fetch_readme {
            match self.catalog.fetch_readme(&candidate).await {
                Ok(readme) => readme,
                Err(e) => {
                    warn!("continuing without README for {}: {}", candidate.external_id, e);
                    None
                }
            }
        } else {
            None
        };

        let request = GenerationRequest::from_candidate(&candidate, readme);
        let result = self
            .generator
            .generate(&request)
            .await
            .map_err(failed(Stage::Generating))?;

        if self.options.dry_run {
            info!("dry run, skipping write");
            return Ok(RunOutcome::DryRun { candidate, result });
        }

        info!(stage = %Stage::Writing, "writing report for {}", candidate.external_id);
        match self.writer.write(&candidate, &request, &result).await {
            Ok(report) => Ok(RunOutcome::Published(report)),
            Err(PipelineError::DuplicateReport { external_id }) => {
                warn!("{} was featured by a concurrent run, nothing to do", external_id);
                Ok(RunOutcome::AlreadyPublished { external_id })
            }
            Err(e) => Err(failed(Stage::Writing)(e)),
        }
    }

    /// Fetch and select, widening the trending window while every candidate
    /// in the current one is already featured.
    async fn select<R>(&self, rng: &mut R) -> Result<Candidate, RunFailure>
    where
        R: Rng + ?Sized + Send,
    {
        let mut considered = 0;

        for &limit in &self.options.limits {
            info!(stage = %Stage::Fetching, limit, "fetching trending candidates");
            let candidates = self
                .catalog
                .fetch_trending(&self.options.kinds, limit)
                .await
                .map_err(failed(Stage::Fetching))?;

            let ids: HashSet<String> = candidates.iter().map(|c| c.external_id.clone()).collect();
            let featured = self
                .store
                .already_featured(&ids)
                .await
                .map_err(failed(Stage::Selecting))?;
            info!(
                stage = %Stage::Selecting,
                candidates = candidates.len(),
                featured = featured.len(),
                "filtered against history"
            );

            match select_candidate(&candidates, &featured, rng) {
                Ok(candidate) => return Ok(candidate),
                Err(PipelineError::NoCandidateAvailable { considered: n }) => {
                    considered = n;
                    info!(limit, "every trending item in this window is already featured");
                }
                Err(e) => return Err(failed(Stage::Selecting)(e)),
            }
        }

        Err(failed(Stage::Selecting)(PipelineError::NoCandidateAvailable {
            considered,
        }))
    }
}

/// CLI entry point for `hf-daily generate`.
///
/// Exhaustion is reported and treated as success; every other failure is
/// returned so the process exits non-zero.
pub async fn run_generate(config: &Config, dry_run: bool) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool)
        .await
        .context("Failed to prepare database schema")?;
    let store = Arc::new(SqliteReportStore::new(pool.clone()));

    let pipeline = Pipeline::from_config(config, store)?.with_dry_run(dry_run);
    let mut rng = StdRng::from_os_rng();
    let outcome = pipeline.run(&mut rng).await;
    pool.close().await;

    match outcome {
        Ok(RunOutcome::Published(report)) => {
            println!("generate");
            println!("  selected: {} ({})", report.external_id, report.kind);
            println!("  report id: {}", report.id);
            println!("  title: {}", report.title);
            println!("  source: {}", report.source_url);
            println!("ok");
        }
        Ok(RunOutcome::AlreadyPublished { external_id }) => {
            println!("generate");
            println!("  selected: {}", external_id);
            println!("  already published by a concurrent run");
            println!("ok");
        }
        Ok(RunOutcome::DryRun { candidate, result }) => {
            println!("generate (dry-run)");
            println!("  selected: {} ({})", candidate.external_id, candidate.kind);
            println!("  title: {}", result.title);
            println!("  summary: {}", result.summary);
            println!("  ideas:");
            for (i, idea) in result.ideas.iter().enumerate() {
                println!("    {}. {}", i + 1, idea);
            }
        }
        Err(failure) if failure.is_exhausted() => {
            warn!("{}", failure.error);
            println!("generate");
            println!("  skipped: {}", failure.error);
            println!("ok");
        }
        Err(failure) => {
            if let Some(payload) = failure.error.payload() {
                tracing::error!(payload = %crate::error::excerpt(payload), "offending payload");
            }
            return Err(anyhow::Error::new(failure));
        }
    }

    Ok(())
}
