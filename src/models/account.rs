use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered owner. `chat_id` is the bound notification channel; it is
/// None until a linking command arrives and may be overwritten by a newer
/// link.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Account {
    pub id: i64,
    pub external_id: String,
    pub email: String,
    pub name: String,
    pub avatar_url: String,
    pub chat_id: Option<String>,
}

/// Profile fields delivered by the external login flow, upserted on the
/// external id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountProfile {
    pub external_id: String,
    pub email: String,
    pub name: String,
    pub avatar_url: String,
}
