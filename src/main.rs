//! # hf-daily CLI
//!
//! The `hf-daily` binary runs the daily trending report pipeline and reads
//! the stored reports back.
//!
//! ## Usage
//!
//! ```bash
//! hf-daily --config ./config/hf-daily.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `hf-daily init` | Create the SQLite database and run schema migrations |
//! | `hf-daily generate` | Pick one trending artifact and publish a report |
//! | `hf-daily generate --dry-run` | Generate and print without writing |
//! | `hf-daily list` | Show the newest reports |
//! | `hf-daily get <id>` | Print one report in full |
//!
//! `generate` is meant to be triggered once a day by cron or a systemd timer.
//! It exits 0 when a report was published, when another run published the
//! same artifact first, and when every trending item is already featured.
//!
//! Logs go to stderr. Set `LOG_FORMAT=json` for JSON lines and `RUST_LOG`
//! to change the filter (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use hf_daily::{config, migrate, pipeline, reports};

/// hf-daily: a daily digest of one trending Hugging Face model or dataset.
#[derive(Parser)]
#[command(
    name = "hf-daily",
    about = "Publish a daily report on one trending Hugging Face model or dataset",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/hf-daily.toml` when that file exists. Environment
    /// variables override file values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Run the pipeline once.
    ///
    /// Fetches trending artifacts, skips ones already featured, picks one at
    /// random, asks the language model for a title, summary and five project
    /// ideas, and stores the report.
    Generate {
        /// Generate and print the report without storing it.
        #[arg(long)]
        dry_run: bool,
    },

    /// List stored reports, newest first.
    List {
        /// Maximum number of reports to show.
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Print one report in full.
    Get {
        /// Report id as shown by `list`.
        id: i64,
    },
}

fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => {
            migrate::run_init(&cfg).await?;
        }
        Commands::Generate { dry_run } => {
            pipeline::run_generate(&cfg, dry_run).await?;
        }
        Commands::List { limit } => {
            reports::run_list(&cfg, limit).await?;
        }
        Commands::Get { id } => {
            reports::run_get(&cfg, id).await?;
        }
    }

    Ok(())
}
