use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use feedindex::config::{Config, FeedUrls};
use feedindex::feed::FeedSource;
use feedindex::index::JsonLinesIndex;
use feedindex::pipeline::{drain, InMemoryQueue, JsonLinesQueue, Resolver, Scheduler};
use feedindex::storage::EntryStore;

#[derive(Parser, Debug)]
#[command(name = "feedindex", about = "Feed ingestion pipeline for search indexing")]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE", default_value = "feedindex.toml")]
    config: PathBuf,

    /// Feed URL; repeat for several feeds (overrides the config file)
    #[arg(long = "url", value_name = "URL")]
    urls: Vec<String>,

    /// Entries per pass, 0 for no limit
    #[arg(long)]
    limit: Option<usize>,

    /// Fetch timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Shared entry store (SQLite file)
    #[arg(long, value_name = "FILE")]
    store: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Schedule and build in this process; documents are written to stdout
    Run,
    /// Fetch and schedule only; messages are written to stdout
    Schedule,
    /// Build documents for messages read from stdin; documents go to stdout
    Index,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if !args.urls.is_empty() {
        config.url = FeedUrls::Many(args.urls.clone());
    }
    if let Some(limit) = args.limit {
        config.limit = limit;
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }
    if let Some(store) = &args.store {
        config.store_path = Some(store.clone());
    }
    Ok(config)
}

fn build_scheduler(config: &Config) -> Result<Scheduler> {
    if config.url.is_empty() {
        anyhow::bail!("No feed URL configured: pass --url or set `url` in the config file");
    }

    let mut source =
        FeedSource::new(config.fetch_settings()).context("Failed to create HTTP client")?;
    source.configure(config.url.to_vec());
    Ok(Scheduler::new(source, config.pipeline()))
}

async fn open_store(config: &Config) -> Result<Option<EntryStore>> {
    match &config.store_path {
        Some(path) => {
            let store = EntryStore::open(path)
                .await
                .with_context(|| format!("Failed to open entry store at {}", path))?;
            Ok(Some(store))
        }
        None => Ok(None),
    }
}

async fn run(config: &Config) -> Result<()> {
    let mut scheduler = build_scheduler(config)?;
    let queue = InMemoryQueue::new();

    let report = scheduler
        .schedule_all(&queue)
        .await
        .context("Scheduling pass failed")?;

    let resolver = Resolver::Local(Arc::new(scheduler.into_cache()));
    let index = JsonLinesIndex::new(tokio::io::stdout());
    let drained = drain(&queue, &resolver, &index, config.consumers)
        .await
        .context("Failed to drain queue")?;

    tracing::info!(
        scheduled = report.scheduled,
        rejected = report.rejected.len(),
        built = drained.built,
        unresolvable = drained.unresolvable.len(),
        "Run complete"
    );
    Ok(())
}

async fn schedule(config: &Config) -> Result<()> {
    let mut scheduler = build_scheduler(config)?;
    if let Some(store) = open_store(config).await? {
        scheduler = scheduler.with_store(store);
    } else {
        tracing::warn!("No entry store configured; consumers in other processes will not resolve these messages");
    }

    let queue = JsonLinesQueue::writer(tokio::io::stdout());
    let report = scheduler
        .schedule_all(&queue)
        .await
        .context("Scheduling pass failed")?;

    tracing::info!(
        scheduled = report.scheduled,
        rejected = report.rejected.len(),
        "Schedule complete"
    );
    Ok(())
}

async fn index_messages(config: &Config) -> Result<()> {
    let resolver = match open_store(config).await? {
        Some(store) => Resolver::Shared(store),
        None => {
            tracing::warn!("No entry store configured; every message will be unresolvable");
            Resolver::empty()
        }
    };

    let queue = JsonLinesQueue::reader(tokio::io::stdin());
    let index = JsonLinesIndex::new(tokio::io::stdout());
    let report = drain(&queue, &resolver, &index, config.consumers)
        .await
        .context("Failed to drain queue")?;

    for id in &report.unresolvable {
        tracing::info!(id = %id, "Unresolvable message");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries messages and documents, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    match args.command {
        Command::Run => run(&config).await,
        Command::Schedule => schedule(&config).await,
        Command::Index => index_messages(&config).await,
    }
}
