use async_trait::async_trait;
use reqwest::Client;

use super::{Notifier, NotifyError};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Sends Markdown messages through the Telegram Bot API.
pub struct TelegramNotifier {
    client: Client,
    token: String,
    api_base: String,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    pub fn with_api_base(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            api_base: api_base.into(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        if self.token.is_empty() || chat_id.is_empty() {
            return Err(NotifyError::Unconfigured);
        }

        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("chat_id", chat_id),
                ("text", text),
                ("parse_mode", "Markdown"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::BadStatus(status.as_u16()));
        }
        Ok(())
    }
}
