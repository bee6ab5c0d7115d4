//! Persistent storage for accounts, tracked products and price history,
//! plus the cache-invalidation discipline: every mutation drops exactly
//! the mutated owner's cached listing.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::Result;
use crate::cache::ListingCache;
use crate::models::{Account, AccountProfile, NewProduct, PricePoint, TrackedProduct};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS accounts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL DEFAULT '',
        name TEXT NOT NULL DEFAULT '',
        avatar_url TEXT NOT NULL DEFAULT '',
        chat_id TEXT
    )",
    "CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        url TEXT NOT NULL,
        image_url TEXT NOT NULL DEFAULT '',
        current_price REAL NOT NULL DEFAULT 0,
        target_price REAL NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        last_alert_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS price_points (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        price REAL NOT NULL,
        observed_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_price_points_product
        ON price_points(product_id, observed_at)",
];

const PRODUCT_COLUMNS: &str = "id, account_id, name, url, image_url, current_price, \
     target_price, created_at, updated_at, last_alert_at";

pub struct ProductRepository {
    pool: SqlitePool,
    cache: ListingCache,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool, cache: ListingCache) -> Self {
        Self { pool, cache }
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Idempotent schema creation, run once at startup.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ---- products ----

    /// Bulk read for the monitor: every product across all owners, with
    /// the owner's bound chat id joined in.
    pub async fn list_tracked(&self) -> Result<Vec<TrackedProduct>> {
        let products = sqlx::query_as::<_, TrackedProduct>(
            "SELECT p.id, p.account_id, p.name, p.url, p.image_url, p.current_price,
                    p.target_price, p.created_at, p.updated_at, p.last_alert_at,
                    a.chat_id
             FROM products p
             JOIN accounts a ON a.id = p.account_id
             ORDER BY p.created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    /// Read-through listing for one owner: cache hit wins, miss falls
    /// through to the database and repopulates the cache.
    pub async fn get_by_owner(&self, owner_id: i64) -> Result<Vec<TrackedProduct>> {
        if let Some(cached) = self.cache.get(owner_id).await {
            debug!(owner_id, "listing served from cache");
            return Ok(cached);
        }

        let products = sqlx::query_as::<_, TrackedProduct>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE account_id = ? ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        if !products.is_empty() {
            self.cache.put(owner_id, &products).await;
        }
        Ok(products)
    }

    pub async fn get_product(&self, id: i64, owner_id: i64) -> Result<Option<TrackedProduct>> {
        let product = sqlx::query_as::<_, TrackedProduct>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ? AND account_id = ?"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    pub async fn create(&self, new: NewProduct) -> Result<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO products
                (account_id, name, url, image_url, current_price, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new.account_id)
        .bind(&new.name)
        .bind(&new.url)
        .bind(&new.image_url)
        .bind(new.current_price)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.cache.invalidate(new.account_id).await;
        Ok(result.last_insert_rowid())
    }

    /// Record one successful price observation: append a history row and
    /// set the current price in a single transaction. Called for every
    /// positive observation, including unchanged prices (the history is
    /// the audit trail). A product deleted under our feet is a no-op.
    pub async fn update_price(&self, id: i64, price: f64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let owner_id: Option<i64> =
            sqlx::query_scalar("SELECT account_id FROM products WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(owner_id) = owner_id else {
            // Lost a race with a delete; nothing to record.
            return Ok(());
        };

        let now = Utc::now();
        sqlx::query("INSERT INTO price_points (product_id, price, observed_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(price)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE products SET current_price = ?, updated_at = ? WHERE id = ?")
            .bind(price)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.cache.invalidate(owner_id).await;
        Ok(())
    }

    /// Owner-initiated target change. Clears `last_alert_at`: a changed
    /// target is a new condition the owner has not been notified about.
    pub async fn update_target(&self, id: i64, owner_id: i64, target_price: f64) -> Result<()> {
        sqlx::query(
            "UPDATE products SET target_price = ?, last_alert_at = NULL, updated_at = ?
             WHERE id = ? AND account_id = ?",
        )
        .bind(target_price)
        .bind(Utc::now())
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        self.cache.invalidate(owner_id).await;
        Ok(())
    }

    /// Persist the cooldown anchor. Only called after a successful send.
    pub async fn mark_alerted(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE products SET last_alert_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64, owner_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM products WHERE id = ? AND account_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        self.cache.invalidate(owner_id).await;
        Ok(())
    }

    pub async fn get_history(&self, id: i64, owner_id: i64) -> Result<Vec<PricePoint>> {
        let history = sqlx::query_as::<_, PricePoint>(
            "SELECT pp.id, pp.product_id, pp.price, pp.observed_at
             FROM price_points pp
             JOIN products p ON p.id = pp.product_id
             WHERE pp.product_id = ? AND p.account_id = ?
             ORDER BY pp.observed_at ASC",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(history)
    }

    // ---- accounts ----

    /// Upsert on the external login id, refreshing profile fields. The
    /// bound chat id survives re-login.
    pub async fn get_or_create_account(&self, profile: AccountProfile) -> Result<Account> {
        let account = sqlx::query_as::<_, Account>(
            "INSERT INTO accounts (external_id, email, name, avatar_url)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(external_id) DO UPDATE SET
                email = excluded.email,
                name = excluded.name,
                avatar_url = excluded.avatar_url
             RETURNING id, external_id, email, name, avatar_url, chat_id",
        )
        .bind(&profile.external_id)
        .bind(&profile.email)
        .bind(&profile.name)
        .bind(&profile.avatar_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(account)
    }

    pub async fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, external_id, email, name, avatar_url, chat_id
             FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    /// Bind (or re-bind) a notification channel to an account. Returns
    /// false when no such account exists. Re-binding the same chat id is
    /// idempotent, which makes at-least-once link delivery safe.
    pub async fn bind_channel(&self, account_id: i64, chat_id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE accounts SET chat_id = ? WHERE id = ?")
            .bind(chat_id)
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
