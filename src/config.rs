use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub scraper: ScraperConfig,
    pub monitor: MonitorConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub request_timeout: u64,
    pub user_agent: String,
    pub accept_language: String,
    pub referer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub sweep_interval_secs: u64,
    pub item_delay_secs: u64,
    pub list_retry_backoff_secs: u64,
    pub alert_cooldown_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub api_base: String,
    pub poll_timeout_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl MonitorConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_secs(self.item_delay_secs)
    }

    pub fn list_retry_backoff(&self) -> Duration {
        Duration::from_secs(self.list_retry_backoff_secs)
    }

    pub fn alert_cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(self.alert_cooldown_hours)
    }
}

impl TelegramConfig {
    pub fn token(&self) -> &str {
        self.bot_token.as_deref().unwrap_or("")
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "PECHINCHA_"
            .add_source(Environment::with_prefix("PECHINCHA").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Message("Database url must be set".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message(
                "Scraper request_timeout must be greater than 0".into(),
            ));
        }

        if self.monitor.sweep_interval_secs == 0 {
            return Err(ConfigError::Message(
                "Monitor sweep_interval_secs must be greater than 0".into(),
            ));
        }

        if self.monitor.alert_cooldown_hours <= 0 {
            return Err(ConfigError::Message(
                "Monitor alert_cooldown_hours must be greater than 0".into(),
            ));
        }

        if self.telegram.api_base.is_empty() {
            return Err(ConfigError::Message("Telegram api_base must be set".into()));
        }

        Ok(())
    }
}
