use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A product URL under watch, owned by one account.
///
/// `current_price` always reflects the most recent successful price
/// observation; zero observations are never written. `target_price` of 0
/// means alerting is disabled for this product.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct TrackedProduct {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
    pub url: String,
    pub image_url: String,
    pub current_price: f64,
    pub target_price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_alert_at: Option<DateTime<Utc>>,

    // Owner's bound chat id, populated only by the monitor's joined listing.
    #[serde(skip)]
    #[sqlx(default)]
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub account_id: i64,
    pub name: String,
    pub url: String,
    pub image_url: String,
    pub current_price: f64,
}

impl TrackedProduct {
    pub fn alerting_enabled(&self) -> bool {
        self.target_price > 0.0
    }

    /// Whether the alert cooldown has elapsed. Never-alerted products are
    /// always ready; `last_alert_at` is only set after a successful send.
    pub fn alert_ready(&self, cooldown: Duration, now: DateTime<Utc>) -> bool {
        match self.last_alert_at {
            Some(last) => now - last > cooldown,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(target: f64, last_alert_at: Option<DateTime<Utc>>) -> TrackedProduct {
        let now = Utc::now();
        TrackedProduct {
            id: 1,
            account_id: 1,
            name: "Teclado Mecânico".to_string(),
            url: "https://www.kabum.com.br/produto/1".to_string(),
            image_url: String::new(),
            current_price: 250.0,
            target_price: target,
            created_at: now,
            updated_at: now,
            last_alert_at,
            chat_id: None,
        }
    }

    #[test]
    fn test_alerting_disabled_at_zero_target() {
        assert!(!product(0.0, None).alerting_enabled());
        assert!(product(199.9, None).alerting_enabled());
    }

    #[test]
    fn test_never_alerted_is_ready() {
        let p = product(200.0, None);
        assert!(p.alert_ready(Duration::hours(24), Utc::now()));
    }

    #[test]
    fn test_recent_alert_blocks() {
        let now = Utc::now();
        let p = product(200.0, Some(now - Duration::hours(2)));
        assert!(!p.alert_ready(Duration::hours(24), now));
    }

    #[test]
    fn test_cooldown_elapsed_is_ready_again() {
        let now = Utc::now();
        let p = product(200.0, Some(now - Duration::hours(25)));
        assert!(p.alert_ready(Duration::hours(24), now));
    }
}
