use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::watch;
use tracing::{info, warn};

use pechincha::alert::AlertDispatcher;
use pechincha::cache::{ListingCache, MemoryCache};
use pechincha::config::AppConfig;
use pechincha::linker::ChannelLinker;
use pechincha::monitor::PriceMonitor;
use pechincha::notify::{Notifier, TelegramNotifier};
use pechincha::repository::ProductRepository;
use pechincha::scraper::PageExtractor;
use pechincha::sites::SiteRegistry;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real deployments use the environment directly.
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pechincha=info".parse()?),
        )
        .init();

    info!("Starting Pechincha...");

    let config = AppConfig::from_env()?;

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout))
        .connect(&config.database.url)
        .await?;

    let cache = ListingCache::new(Arc::new(MemoryCache::new()), config.cache.ttl());
    let repository = Arc::new(ProductRepository::new(pool, cache));
    repository.migrate().await?;

    let extractor = Arc::new(PageExtractor::new(
        &config.scraper,
        SiteRegistry::brazilian_marketplaces(),
    )?);

    let token = config.telegram.token().to_string();
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::with_api_base(
        token.clone(),
        config.telegram.api_base.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = AlertDispatcher::new(
        Arc::clone(&repository),
        Arc::clone(&notifier),
        config.monitor.alert_cooldown(),
    );
    let monitor = PriceMonitor::new(
        Arc::clone(&repository),
        extractor,
        dispatcher,
        config.monitor.clone(),
    );
    let monitor_handle = tokio::spawn(monitor.run(shutdown_rx.clone()));

    let linker_handle = if token.is_empty() {
        warn!("no Telegram bot token configured, channel linking disabled");
        None
    } else {
        let linker = ChannelLinker::new(
            Arc::clone(&repository),
            Arc::clone(&notifier),
            token,
            config.telegram.api_base.clone(),
            config.telegram.poll_timeout_secs,
        );
        Some(tokio::spawn(linker.run(shutdown_rx.clone())))
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    let _ = shutdown_tx.send(true);

    let _ = tokio::time::timeout(SHUTDOWN_GRACE, monitor_handle).await;
    if let Some(handle) = linker_handle {
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
    }

    Ok(())
}
