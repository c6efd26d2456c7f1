// Batch crawl of a source list into the document index.
//
// Usage: newsdesk <sources.json> [config.json] [--force]

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use log::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, fmt};

use newsdesk::crawl_engine::ChromiumRenderer;
use newsdesk::{
    Crawler, HttpSummarizer, KeyValueStore, MemoryStore, MultiIndexStore, PipelineConfig,
    SqliteStore, load_sources,
};

fn init_logging() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer());
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let force_update = args.iter().any(|a| a == "--force");
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();
    let Some(sources_path) = positional.first() else {
        bail!("usage: newsdesk <sources.json> [config.json] [--force]");
    };

    let config = match positional.get(1) {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::builder().build()?,
    };

    let store: Arc<dyn KeyValueStore> = match config.storage_path() {
        Some(path) => {
            info!("Using SQLite store at {}", path.display());
            Arc::new(SqliteStore::open(path).await?)
        }
        None => {
            warn!("No storage_path configured, documents are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };
    let index = Arc::new(MultiIndexStore::with_limits(store, config.index_limits()));

    let mut crawler = Crawler::from_config(config.clone(), index)?;
    if let Some(endpoint) = config.summarizer_endpoint() {
        crawler = crawler.with_summarizer(Arc::new(HttpSummarizer::new(
            endpoint,
            config.request_timeout(),
        )?));
    }

    let renderer = if config.render_with_browser() || !config.render_domains().is_empty() {
        let renderer = Arc::new(
            ChromiumRenderer::launch(
                config.chrome_executable().map(|p| p.to_path_buf()),
                config.request_timeout(),
            )
            .await?,
        );
        crawler = crawler.with_renderer(renderer.clone());
        Some(renderer)
    } else {
        None
    };

    let sources = load_sources(sources_path.as_str())?;
    let report = crawler.crawl_batch(sources, None, force_update).await;

    for (url, outcome) in &report.outcomes {
        if let Some(reason) = &outcome.reason {
            println!("FAILED {url}: {reason}");
        }
    }
    println!("{}", serde_json::to_string_pretty(&report.summary)?);

    drop(crawler);
    if let Some(renderer) = renderer {
        match Arc::try_unwrap(renderer) {
            Ok(renderer) => renderer.shutdown().await?,
            Err(_) => warn!("Browser still referenced at exit, leaving it to drop"),
        }
    }
    Ok(())
}
