//! Chainwatch CLI
//!
//! Terminal dashboards for the chain-reaction backend:
//! - Ingest GitHub repositories and browse their processed files
//! - Generate Q&A batches, run evaluations and inspect their metrics
//! - Ask questions about a repository (RAG) and translate text
//!
//! Every list and detail view accepts `--watch` to stay open and refresh
//! on a short (1 min) or long (5 min) cadence until the terminal goes idle.
//!
//! Usage:
//! ```bash
//! # With config file
//! chainwatch --config chainwatch.yaml files <repo_id>
//!
//! # Or with environment variables
//! CHAINWATCH_BASE_URL=http://backend:8000 chainwatch batches <repo_id> --watch
//! ```

mod ask;
mod commands;
mod config;
mod logging;
mod render;
mod watch;

use anyhow::Context;
use chainwatch_client::ChainClient;
use chainwatch_client::listing::{EvalJobListing, EvalMetricListing, QaBatchListing, QaPairListing};
use clap::{Parser, Subcommand};
use commands::{App, DetailArgs, ViewArgs};
use config::ChainwatchConfig;
use tracing::{debug, info};

/// Chainwatch - dashboards for the chain-reaction backend
#[derive(Parser)]
#[command(name = "chainwatch")]
#[command(about = "Browse and drive the chain-reaction backend from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (YAML or TOML)
    #[arg(short, long, value_name = "FILE", env = "CHAINWATCH_CONFIG", global = true)]
    config: Option<String>,

    /// Backend base URL (overrides config and environment)
    #[arg(long, value_name = "URL", global = true)]
    base_url: Option<String>,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a GitHub repository, or list popular ones
    Ingest {
        /// Repository URL, e.g. https://github.com/owner/repo
        repo_url: Option<String>,

        /// Also print the popular repositories
        #[arg(long)]
        list_popular: bool,
    },
    /// List the files of a repository
    Files {
        repo_id: String,

        #[command(flatten)]
        view: ViewArgs,
    },
    /// Show one file with its summary and content
    File {
        file_id: String,

        #[command(flatten)]
        detail: DetailArgs,
    },
    /// List the Q&A batches of a repository
    Batches {
        repo_id: String,

        #[command(flatten)]
        view: ViewArgs,
    },
    /// Start generating a Q&A batch for a repository
    CreateBatch { repo_id: String },
    /// List the Q&A pairs of a batch
    Pairs {
        batch_id: String,

        #[command(flatten)]
        view: ViewArgs,
    },
    /// Archive a Q&A pair
    ArchivePair { qa_id: String },
    /// List the evaluation jobs of a repository
    Evals {
        repo_id: String,

        #[command(flatten)]
        view: ViewArgs,
    },
    /// Evaluate a running or completed Q&A batch
    CreateEval {
        repo_id: String,

        /// Q&A batch to evaluate
        #[arg(long)]
        batch_id: Option<String>,
    },
    /// List per-question metrics of an evaluation job
    Metrics {
        eval_job_id: String,

        #[command(flatten)]
        view: ViewArgs,
    },
    /// Show aggregated metrics of an evaluation job
    Overall {
        eval_job_id: String,

        #[command(flatten)]
        detail: DetailArgs,
    },
    /// Ask questions about a repository
    Ask {
        repo_id: String,

        /// Ask a single question and exit
        #[arg(short, long)]
        question: Option<String>,
    },
    /// Translate text into one language
    Translate {
        text: String,

        /// Target language
        #[arg(short, long)]
        language: String,
    },
    /// Translate text through a chain of languages
    TranslateChain {
        text: String,

        /// Target languages, in order (comma separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        languages: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => ChainwatchConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => ChainwatchConfig::default(),
    };

    // Merge environment variables (they override config file)
    config.merge_env();

    // CLI flags have the highest precedence
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    config.validate()?;
    logging::init(&config.logging)?;

    match &cli.config {
        Some(path) => info!("Loaded configuration from {}", path),
        None => debug!("Using default configuration"),
    }
    debug!(base_url = %config.base_url, "Connecting to backend");

    let client = ChainClient::new(config.client_config())?;
    let app = App { client, config };

    match cli.command {
        Commands::Ingest { repo_url, list_popular } => commands::ingest(&app, repo_url, list_popular).await,
        Commands::Files { repo_id, view } => commands::files(&app, repo_id, &view).await,
        Commands::File { file_id, detail } => commands::file(&app, file_id, &detail).await,
        Commands::Batches { repo_id, view } => {
            commands::list::<QaBatchListing>(&app, repo_id, &view, "batches", render::batches_table).await
        }
        Commands::CreateBatch { repo_id } => commands::create_batch(&app, repo_id).await,
        Commands::Pairs { batch_id, view } => {
            commands::list::<QaPairListing>(&app, batch_id, &view, "Q&A pairs", render::pairs_table).await
        }
        Commands::ArchivePair { qa_id } => commands::archive_pair(&app, qa_id).await,
        Commands::Evals { repo_id, view } => {
            commands::list::<EvalJobListing>(&app, repo_id, &view, "eval jobs", render::jobs_table).await
        }
        Commands::CreateEval { repo_id, batch_id } => commands::create_eval(&app, repo_id, batch_id).await,
        Commands::Metrics { eval_job_id, view } => {
            commands::list::<EvalMetricListing>(&app, eval_job_id, &view, "metrics", render::metrics_table).await
        }
        Commands::Overall { eval_job_id, detail } => commands::overall(&app, eval_job_id, &detail).await,
        Commands::Ask { repo_id, question } => ask::run(&app, repo_id, question).await,
        Commands::Translate { text, language } => commands::translate(&app, text, language).await,
        Commands::TranslateChain { text, languages } => commands::translate_chain(&app, text, languages).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_watch_list() {
        let cli = Cli::try_parse_from([
            "chainwatch", "files", "repo-1", "--watch", "--interval", "long", "--page", "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Files { repo_id, view } => {
                assert_eq!(repo_id, "repo-1");
                assert!(view.watch);
                assert_eq!(view.interval, Some(chainwatch_poll::RefreshInterval::Long));
                assert_eq!(view.page, 2);
            }
            _ => panic!("expected files command"),
        }
    }

    #[test]
    fn test_parse_translate_chain_languages() {
        let cli = Cli::try_parse_from(["chainwatch", "translate-chain", "hello", "-l", "fr,de,ja"]).unwrap();
        match cli.command {
            Commands::TranslateChain { text, languages } => {
                assert_eq!(text, "hello");
                assert_eq!(languages, vec!["fr", "de", "ja"]);
            }
            _ => panic!("expected translate-chain command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["chainwatch", "overall", "job-1", "--base-url", "http://x:1"]).unwrap();
        assert_eq!(cli.base_url.as_deref(), Some("http://x:1"));
    }
}
