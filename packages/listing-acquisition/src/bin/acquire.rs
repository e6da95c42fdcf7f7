//! Listing acquisition runner
//!
//! Reads a discovery feed, runs one batch and prints the batch output as
//! JSON on stdout. Store statistics are logged once the batch is done.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use listing_acquisition::{
    AppConfig, Candidate, DirectFetcher, FreshnessStore, ListingRepository, ManagedCrawlFetcher,
    MemoryRepository, Orchestrator,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "listing_acquisition=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let acquisition = config.to_acquisition_config();
    let host_timeout = acquisition.default_host.timeout;

    let feed = std::fs::read_to_string(&config.discovery_feed).with_context(|| {
        format!(
            "Failed to read discovery feed {}",
            config.discovery_feed.display()
        )
    })?;
    let candidates: Vec<Candidate> =
        serde_json::from_str(&feed).context("Discovery feed must be a JSON array of candidates")?;

    tracing::info!(
        candidates = candidates.len(),
        feed = %config.discovery_feed.display(),
        window_secs = acquisition.freshness_window.as_secs(),
        "Starting acquisition"
    );

    let repository = open_repository(&config).await?;
    let store = Arc::new(FreshnessStore::new(repository));

    let direct = DirectFetcher::new(host_timeout).context("Failed to build direct fetcher")?;
    let managed = ManagedCrawlFetcher::new(config.firecrawl_api_key.clone(), host_timeout)
        .context("Failed to build managed crawl fetcher")?;

    let orchestrator = Orchestrator::new(acquisition, Arc::clone(&store))
        .with_fetcher(Arc::new(direct))
        .with_fetcher(Arc::new(managed));

    let output = orchestrator.run_batch(candidates).await;

    let json = serde_json::to_string_pretty(&output).context("Failed to serialize batch output")?;
    println!("{}", json);

    let stats = store
        .statistics(Duration::from_secs(24 * 3600))
        .await
        .context("Failed to read store statistics")?;
    for source in &stats.sources {
        tracing::info!(
            source = %source.source,
            total = source.total,
            active = source.active,
            with_price = source.with_price,
            average_price = ?source.average_price,
            "Source statistics"
        );
    }
    tracing::info!(
        total = stats.total(),
        recently_scraped = stats.recently_scraped,
        price_changes = stats.price_changes,
        prices = ?stats.prices,
        "Store statistics"
    );

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn open_repository(config: &AppConfig) -> Result<Arc<dyn ListingRepository>> {
    use listing_acquisition::SqliteRepository;

    match &config.database_url {
        Some(url) => {
            tracing::info!("Using SQLite repository");
            let repo = SqliteRepository::new(url)
                .await
                .context("Failed to open SQLite repository")?;
            Ok(Arc::new(repo))
        }
        None => Ok(Arc::new(MemoryRepository::new())),
    }
}

#[cfg(not(feature = "sqlite"))]
async fn open_repository(config: &AppConfig) -> Result<Arc<dyn ListingRepository>> {
    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL set but the sqlite feature is disabled; using memory");
    }
    Ok(Arc::new(MemoryRepository::new()))
}
