//! Binds Telegram chats to accounts by long-polling the bot's update
//! feed for `/start connect_<account_id>` deep links.
//!
//! Offsets are advanced per update before processing, so a crash skips
//! at most the update it was handling. Binding itself is idempotent,
//! which makes a reprocessed update harmless.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::monitor::sleep_or_shutdown;
use crate::notify::Notifier;
use crate::repository::ProductRepository;

const LINK_PREFIX: &str = "/start connect_";
const POLL_FAILURE_BACKOFF: Duration = Duration::from_secs(10);
const IDLE_DELAY: Duration = Duration::from_secs(1);

const LINKED_OK: &str =
    "✅ *Pronto!* Seu Telegram foi vinculado com sucesso.\n\nVocê receberá alertas aqui.";
const LINKED_ERR: &str = "❌ Erro ao vincular conta. Tente novamente.";

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    text: Option<String>,
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Extract the account id from a deep-link start command, if any.
pub fn parse_link_command(text: &str) -> Option<i64> {
    text.trim()
        .strip_prefix(LINK_PREFIX)?
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
}

pub struct ChannelLinker {
    repository: Arc<ProductRepository>,
    notifier: Arc<dyn Notifier>,
    client: Client,
    token: String,
    api_base: String,
    poll_timeout: u64,
}

impl ChannelLinker {
    pub fn new(
        repository: Arc<ProductRepository>,
        notifier: Arc<dyn Notifier>,
        token: impl Into<String>,
        api_base: impl Into<String>,
        poll_timeout: u64,
    ) -> Self {
        Self {
            repository,
            notifier,
            client: Client::new(),
            token: token.into(),
            api_base: api_base.into(),
            poll_timeout,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if self.token.is_empty() {
            warn!("no bot token configured, channel linking disabled");
            return;
        }
        info!("channel linker started");

        let mut offset: i64 = 0;
        loop {
            let updates = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.poll(offset) => result,
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = update.update_id + 1;
                        self.process(update).await;
                    }
                    if sleep_or_shutdown(&mut shutdown, IDLE_DELAY).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "polling updates failed, backing off");
                    if sleep_or_shutdown(&mut shutdown, POLL_FAILURE_BACKOFF).await {
                        break;
                    }
                }
            }
        }
        info!("channel linker stopped");
    }

    async fn poll(&self, offset: i64) -> Result<Vec<Update>, reqwest::Error> {
        let url = format!("{}/bot{}/getUpdates", self.api_base, self.token);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.poll_timeout.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<UpdateResponse>()
            .await?;

        if !response.ok {
            debug!("update feed answered ok=false");
            return Ok(Vec::new());
        }
        Ok(response.result)
    }

    async fn process(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let chat_id = message.chat.id.to_string();
        let Some(account_id) = message.text.as_deref().and_then(parse_link_command) else {
            return;
        };

        let reply = match self.repository.bind_channel(account_id, &chat_id).await {
            Ok(true) => {
                info!(account_id, chat_id = %chat_id, "telegram chat linked");
                LINKED_OK
            }
            Ok(false) => {
                warn!(account_id, "link command for unknown account");
                LINKED_ERR
            }
            Err(e) => {
                warn!(account_id, error = %e, "binding channel failed");
                LINKED_ERR
            }
        };

        if let Err(e) = self.notifier.send(&chat_id, reply).await {
            warn!(chat_id = %chat_id, error = %e, "link confirmation send failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotifyError;
    use crate::repository::tests::{test_account, test_repository};
    use async_trait::async_trait;
    use rstest::rstest;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .await
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn linker(
        repository: Arc<ProductRepository>,
        notifier: Arc<RecordingNotifier>,
    ) -> ChannelLinker {
        ChannelLinker::new(
            repository,
            notifier as Arc<dyn Notifier>,
            "token",
            "http://localhost:1",
            1,
        )
    }

    fn link_update(update_id: i64, chat_id: i64, text: &str) -> Update {
        Update {
            update_id,
            message: Some(Message {
                text: Some(text.to_string()),
                chat: Chat { id: chat_id },
            }),
        }
    }

    #[rstest]
    #[case("/start connect_42", Some(42))]
    #[case("  /start connect_7  ", Some(7))]
    #[case("/start connect_0", None)]
    #[case("/start connect_-3", None)]
    #[case("/start connect_abc", None)]
    #[case("/start", None)]
    #[case("oi", None)]
    fn test_parse_link_command(#[case] text: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_link_command(text), expected);
    }

    #[tokio::test]
    async fn test_valid_link_binds_and_confirms() {
        let repository = Arc::new(test_repository().await);
        let account = test_account(&repository).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let linker = linker(Arc::clone(&repository), notifier.clone());

        linker
            .process(link_update(1, 555001, &format!("/start connect_{}", account.id)))
            .await;

        let stored = repository.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(stored.chat_id.as_deref(), Some("555001"));

        let sent = notifier.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "555001");
        assert!(sent[0].1.contains("vinculado com sucesso"));
    }

    #[tokio::test]
    async fn test_unknown_account_gets_error_reply() {
        let repository = Arc::new(test_repository().await);
        let notifier = Arc::new(RecordingNotifier::default());
        let linker = linker(repository, notifier.clone());

        linker.process(link_update(1, 555002, "/start connect_9999")).await;

        let sent = notifier.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("Erro ao vincular"));
    }

    #[tokio::test]
    async fn test_unrelated_message_is_ignored() {
        let repository = Arc::new(test_repository().await);
        let notifier = Arc::new(RecordingNotifier::default());
        let linker = linker(repository, notifier.clone());

        linker.process(link_update(1, 555003, "bom dia")).await;
        linker
            .process(Update {
                update_id: 2,
                message: None,
            })
            .await;

        assert!(notifier.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_rebinding_is_idempotent() {
        let repository = Arc::new(test_repository().await);
        let account = test_account(&repository).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let linker = linker(Arc::clone(&repository), notifier.clone());

        let text = format!("/start connect_{}", account.id);
        linker.process(link_update(1, 555004, &text)).await;
        linker.process(link_update(1, 555004, &text)).await;

        let stored = repository.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(stored.chat_id.as_deref(), Some("555004"));
        assert_eq!(notifier.sent.lock().await.len(), 2);
    }

    #[test]
    fn test_update_feed_decoding() {
        let body = r#"{
            "ok": true,
            "result": [
                {"update_id": 10, "message": {"text": "/start connect_3", "chat": {"id": 99}}},
                {"update_id": 11, "message": {"chat": {"id": 100}}},
                {"update_id": 12}
            ]
        }"#;
        let decoded: UpdateResponse = serde_json::from_str(body).unwrap();
        assert!(decoded.ok);
        assert_eq!(decoded.result.len(), 3);
        assert_eq!(decoded.result[0].update_id, 10);
        assert_eq!(
            decoded.result[0].message.as_ref().unwrap().text.as_deref(),
            Some("/start connect_3")
        );
        assert!(decoded.result[2].message.is_none());

        let empty: UpdateResponse = serde_json::from_str(r#"{"ok": true}"#).unwrap();
        assert!(empty.result.is_empty());
    }
}
