//! The periodic sweep over every tracked product.
//!
//! A single serial loop: one bulk listing per cycle, a fixed pacing delay
//! before each outbound scrape (the same third-party site may appear many
//! times in one sweep), and a long backoff when the listing itself fails.
//! Nothing in a sweep is process-fatal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::alert::AlertDispatcher;
use crate::config::MonitorConfig;
use crate::models::TrackedProduct;
use crate::repository::ProductRepository;
use crate::scraper::PageExtractor;

/// Sleep that loses a race against the shutdown signal. Returns true when
/// the caller should stop.
pub(crate) async fn sleep_or_shutdown(
    shutdown: &mut watch::Receiver<bool>,
    duration: Duration,
) -> bool {
    tokio::select! {
        _ = shutdown.changed() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

pub struct PriceMonitor {
    repository: Arc<ProductRepository>,
    extractor: Arc<PageExtractor>,
    dispatcher: AlertDispatcher,
    config: MonitorConfig,
}

impl PriceMonitor {
    pub fn new(
        repository: Arc<ProductRepository>,
        extractor: Arc<PageExtractor>,
        dispatcher: AlertDispatcher,
        config: MonitorConfig,
    ) -> Self {
        Self {
            repository,
            extractor,
            dispatcher,
            config,
        }
    }

    /// Run for the process lifetime, checking the shutdown signal at
    /// every suspension point.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("price monitor started");
        loop {
            match self.sweep(&mut shutdown).await {
                Ok(true) => break,
                Ok(false) => {
                    debug!("sweep finished, sleeping until next cycle");
                    if sleep_or_shutdown(&mut shutdown, self.config.sweep_interval()).await {
                        break;
                    }
                }
                Err(e) => {
                    // A listing failure is cycle-fatal but not
                    // process-fatal: no item is processed this cycle.
                    error!(error = %e, "listing tracked products failed, backing off");
                    if sleep_or_shutdown(&mut shutdown, self.config.list_retry_backoff()).await {
                        break;
                    }
                }
            }
        }
        info!("price monitor stopped");
    }

    /// One full pass over the tracked set. Returns true when interrupted
    /// by shutdown mid-sweep.
    pub async fn sweep(&self, shutdown: &mut watch::Receiver<bool>) -> crate::Result<bool> {
        let products = self.repository.list_tracked().await?;
        debug!(count = products.len(), "sweep started");

        for product in &products {
            if sleep_or_shutdown(shutdown, self.config.item_delay()).await {
                return Ok(true);
            }
            self.check_product(product).await;
        }
        Ok(false)
    }

    async fn check_product(&self, product: &TrackedProduct) {
        let scraped = match self.extractor.extract(&product.url).await {
            Ok(scraped) => scraped,
            Err(e) => {
                // Stale data over wrong data: the stored price stays as is
                // and the next sweep retries naturally.
                warn!(product_id = product.id, url = %product.url, error = %e,
                      "scrape failed, keeping stored price");
                return;
            }
        };

        // A zero price is ambiguous between "the site really shows 0" and
        // "extraction found nothing"; treated as no observation, so
        // neither the current price nor the history moves this cycle.
        if scraped.price <= 0.0 {
            debug!(product_id = product.id, "no price resolved, skipping write");
            return;
        }

        if let Err(e) = self.repository.update_price(product.id, scraped.price).await {
            warn!(product_id = product.id, error = %e, "price write failed, continuing sweep");
        }

        if let Err(e) = self.dispatcher.evaluate(product, scraped.price).await {
            warn!(product_id = product.id, error = %e, "alert evaluation failed");
        }
    }
}
