//! Decides when a price observation is notification-worthy.
//!
//! An alert fires when the target is armed, the observed price is at or
//! below it, and the cooldown since the last *successful* send has
//! elapsed. The cooldown anchor is only persisted after delivery, so a
//! failed send stays eligible and retries on the next cycle.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::models::TrackedProduct;
use crate::notify::Notifier;
use crate::repository::ProductRepository;

pub struct AlertDispatcher {
    repository: Arc<ProductRepository>,
    notifier: Arc<dyn Notifier>,
    cooldown: Duration,
}

impl AlertDispatcher {
    pub fn new(
        repository: Arc<ProductRepository>,
        notifier: Arc<dyn Notifier>,
        cooldown: Duration,
    ) -> Self {
        Self {
            repository,
            notifier,
            cooldown,
        }
    }

    /// Evaluate one observation. Returns true when an alert was delivered.
    pub async fn evaluate(&self, product: &TrackedProduct, observed: f64) -> crate::Result<bool> {
        if !product.alerting_enabled() || observed > product.target_price {
            return Ok(false);
        }

        if !product.alert_ready(self.cooldown, Utc::now()) {
            debug!(product_id = product.id, "price drop within cooldown, suppressed");
            return Ok(false);
        }

        let Some(chat_id) = product.chat_id.as_deref().filter(|c| !c.is_empty()) else {
            // No bound channel yet: neither send nor mark, so the drop is
            // delivered on the first qualifying cycle after linking.
            debug!(product_id = product.id, "price drop but no bound channel, deferred");
            return Ok(false);
        };

        let message = drop_message(product, observed);
        match self.notifier.send(chat_id, &message).await {
            Ok(()) => {
                self.repository.mark_alerted(product.id).await?;
                info!(product_id = product.id, observed, "price drop alert delivered");
                Ok(true)
            }
            Err(e) => {
                warn!(product_id = product.id, error = %e, "alert send failed, will retry next cycle");
                Ok(false)
            }
        }
    }
}

fn drop_message(product: &TrackedProduct, observed: f64) -> String {
    format!(
        "🚨 *PREÇO CAIU!*\n\n📦 *{}*\n💰 Preço Atual: R$ {:.2}\n🎯 Sua Meta: R$ {:.2}\n\n[Ver Produto]({})",
        product.name, observed, product.target_price, product.url
    )
}
