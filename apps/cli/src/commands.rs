//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use newsloom_enrich::{Scheduler, SchedulerConfig};
use newsloom_provider::{Inference, Provider};
use newsloom_shared::{AppConfig, Article, expand_home, init_config, load_config};
use newsloom_storage::Storage;
use serde::Deserialize;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Newsloom — enrich a local news archive with AI summaries and embeddings.
#[derive(Parser)]
#[command(
    name = "newsloom",
    version,
    about = "Summarize, score, categorize, and embed news articles in a local archive.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the background enrichment worker until interrupted.
    Enrich,

    /// Load articles from a JSON file into the archive.
    Ingest {
        /// Path to a JSON array of articles.
        file: PathBuf,
    },

    /// Show archive counts and pending work.
    Status,

    /// Semantic search over enriched articles.
    Search {
        /// Free-text query.
        query: String,

        /// Maximum number of results.
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "newsloom=info",
        1 => "newsloom=debug",
        _ => "newsloom=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Enrich => cmd_enrich().await,
        Command::Ingest { file } => cmd_ingest(&file).await,
        Command::Status => cmd_status().await,
        Command::Search { query, limit } => cmd_search(&query, limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

async fn open_storage(config: &AppConfig) -> Result<Storage> {
    let path = expand_home(&config.database.path);
    Ok(Storage::open(&path).await?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_enrich() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let provider = Provider::from_config(&config)?;

    info!(provider = provider.name(), "starting enrichment worker");

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing current record");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let mut scheduler = Scheduler::new(
        provider,
        storage,
        SchedulerConfig::from(&config.worker),
        stop,
    );
    scheduler.run().await?;
    Ok(())
}

/// One record in an ingest file.
#[derive(Debug, Deserialize)]
struct IngestRecord {
    source: String,
    url: String,
    title: Option<String>,
    content_text: String,
}

async fn cmd_ingest(file: &Path) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;

    let raw = std::fs::read_to_string(file)
        .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;
    let records: Vec<IngestRecord> =
        serde_json::from_str(&raw).map_err(|e| eyre!("invalid ingest file: {e}"))?;

    let mut inserted = 0usize;
    let mut skipped = 0usize;
    for record in records {
        let article = Article::new(record.source, record.url, record.title, record.content_text);
        if storage.insert_article(&article).await? {
            inserted += 1;
        } else {
            skipped += 1;
        }
    }

    info!(inserted, skipped, "ingest complete");
    println!("Ingested {inserted} article(s), skipped {skipped} duplicate(s).");
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;

    let total = storage.count_articles().await?;
    let pending = storage.count_incomplete().await?;

    println!("  Articles:  {total}");
    println!("  Enriched:  {}", total.saturating_sub(pending));
    println!("  Pending:   {pending}");
    Ok(())
}

async fn cmd_search(query: &str, limit: usize) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let mut provider = Provider::from_config(&config)?;

    let embedding = provider.embed(query).await?;
    if embedding.is_empty() {
        return Err(eyre!("could not embed query, provider unavailable"));
    }

    let results = storage.search_similar(&embedding, limit).await?;
    if results.is_empty() {
        println!("No enriched articles to search yet.");
        return Ok(());
    }

    for (article, score) in results {
        let title = article.title.as_deref().unwrap_or("(untitled)");
        let category = article.category.as_deref().unwrap_or("-");
        println!("  {score:.3}  [{category}] {title}");
        println!("         {}", article.url);
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
