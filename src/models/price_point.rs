use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One successful price observation. Append-only: rows are never updated
/// or deleted, including observations equal to the previous price.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PricePoint {
    pub id: i64,
    pub product_id: i64,
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}
