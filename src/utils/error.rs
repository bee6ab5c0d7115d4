use thiserror::Error;

use crate::cache::CacheError;
use crate::notify::NotifyError;
use crate::scraper::ScrapeError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }

    #[test]
    fn test_scrape_error_display() {
        let err: AppError = ScrapeError::BadStatus(503).into();
        assert_eq!(err.to_string(), "Scrape error: site returned status 503");
    }

    #[test]
    fn test_not_found_error() {
        let err = AppError::NotFound {
            resource: "product 42".to_string(),
        };
        assert_eq!(err.to_string(), "Not found: product 42");
    }
}
