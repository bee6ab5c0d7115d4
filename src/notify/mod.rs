pub mod telegram;

pub use telegram::TelegramNotifier;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification channel not configured")]
    Unconfigured,

    #[error("send failed: {0}")]
    Send(#[from] reqwest::Error),

    #[error("channel returned status {0}")]
    BadStatus(u16),
}

/// Outbound notification channel. The dispatcher and linker only ever see
/// this seam, so tests substitute a recording implementation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotifyError>;
}
