pub mod alert;
pub mod cache;
pub mod config;
pub mod linker;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod repository;
pub mod scraper;
pub mod sites;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
