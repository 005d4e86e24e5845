//! SQLite による永続化
//!
//! すべての更新は「未登録なら挿入」か明示的なトランザクションで行い、
//! 定期スイープと購読直後の処理が重なっても結果が変わらないようにする。

use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, Transaction};
use tracing::{debug, error, info};

use crate::error::StoreError;
use crate::traits::ListingStore;

use super::listing::{Listing, SubscribeOutcome, Subscriber};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS listings (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        location TEXT NOT NULL,
        link TEXT NOT NULL,
        first_seen_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_listings_location ON listings(location)",
    r#"
    CREATE TABLE IF NOT EXISTS subscribers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS subscriber_locations (
        subscriber_id INTEGER NOT NULL REFERENCES subscribers(id) ON DELETE CASCADE,
        location TEXT NOT NULL,
        PRIMARY KEY (subscriber_id, location)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_subscriber_locations_location ON subscriber_locations(location)",
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subscriber_id INTEGER NOT NULL REFERENCES subscribers(id) ON DELETE CASCADE,
        listing_id TEXT NOT NULL REFERENCES listings(id),
        sent_at TEXT NOT NULL,
        UNIQUE (subscriber_id, listing_id)
    )
    "#,
];

/// SQLite ストア
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// 接続してマイグレーションを実行する
    ///
    /// # URL の例
    /// - `sqlite://jobs.db?mode=rwc` - ファイル（なければ作成）
    /// - `sqlite::memory:` - インメモリ（[`SqliteStore::in_memory`] を推奨）
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store ready: {}", database_url);
        Ok(store)
    }

    /// インメモリストア（テスト用）
    ///
    /// 接続ごとに別DBになるため、接続は1本に固定して使い回す。
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 購読者の通知済み件数
    pub async fn notification_count(&self, subscriber_id: i64) -> Result<usize, StoreError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE subscriber_id = ?")
                .bind(subscriber_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 as usize)
    }

    async fn locations_of(&self, subscriber_id: i64) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT location FROM subscriber_locations WHERE subscriber_id = ? ORDER BY location",
        )
        .bind(subscriber_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(location,)| location).collect())
    }

    async fn hydrate(&self, row: SubscriberRow) -> Result<Subscriber, StoreError> {
        let locations = self.locations_of(row.id).await?;
        Ok(Subscriber {
            id: row.id,
            email: row.email,
            locations,
        })
    }
}

#[derive(Debug, FromRow)]
struct ListingRow {
    id: String,
    title: String,
    location: String,
    link: String,
    first_seen_at: String,
}

impl ListingRow {
    fn into_listing(self) -> Result<Listing, StoreError> {
        let first_seen_at = DateTime::parse_from_rfc3339(&self.first_seen_at)
            .map_err(|e| StoreError::InvalidRow(format!("first_seen_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(Listing {
            id: self.id,
            title: self.title,
            location: self.location,
            link: self.link,
            first_seen_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SubscriberRow {
    id: i64,
    email: String,
}

async fn insert_listings(
    tx: &mut Transaction<'_, Sqlite>,
    listings: &[Listing],
) -> Result<usize, StoreError> {
    let mut inserted = 0;
    for listing in listings {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO listings (id, title, location, link, first_seen_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&listing.id)
        .bind(&listing.title)
        .bind(&listing.location)
        .bind(&listing.link)
        .bind(listing.first_seen_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;
        inserted += result.rows_affected() as usize;
    }
    Ok(inserted)
}

async fn replace_subscription(
    tx: &mut Transaction<'_, Sqlite>,
    email: &str,
    locations: &BTreeSet<String>,
) -> Result<(i64, bool), StoreError> {
    let created = sqlx::query("INSERT OR IGNORE INTO subscribers (email, created_at) VALUES (?, ?)")
        .bind(email)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut **tx)
        .await?
        .rows_affected()
        > 0;

    let (id,): (i64,) = sqlx::query_as("SELECT id FROM subscribers WHERE email = ?")
        .bind(email)
        .fetch_one(&mut **tx)
        .await?;

    // 追加ではなく置き換え
    sqlx::query("DELETE FROM subscriber_locations WHERE subscriber_id = ?")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    for location in locations {
        sqlx::query("INSERT INTO subscriber_locations (subscriber_id, location) VALUES (?, ?)")
            .bind(id)
            .bind(location)
            .execute(&mut **tx)
            .await?;
    }

    Ok((id, created))
}

async fn insert_notifications(
    tx: &mut Transaction<'_, Sqlite>,
    subscriber_id: i64,
    listing_ids: &[String],
) -> Result<usize, StoreError> {
    let sent_at = Utc::now().to_rfc3339();
    let mut inserted = 0;
    for listing_id in listing_ids {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO notifications (subscriber_id, listing_id, sent_at) VALUES (?, ?, ?)",
        )
        .bind(subscriber_id)
        .bind(listing_id)
        .bind(&sent_at)
        .execute(&mut **tx)
        .await?;
        inserted += result.rows_affected() as usize;
    }
    Ok(inserted)
}

/// ロールバックの失敗はログのみ（元のエラーを優先して返すため）
async fn rollback(tx: Transaction<'_, Sqlite>, operation: &str) {
    if let Err(e) = tx.rollback().await {
        error!("Rollback failed during {}: {}", operation, e);
    }
}

#[async_trait]
impl ListingStore for SqliteStore {
    async fn persist_new(&self, listings: &[Listing]) -> Result<usize, StoreError> {
        if listings.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        match insert_listings(&mut tx, listings).await {
            Ok(inserted) => {
                tx.commit().await?;
                debug!("Persisted {} new of {} listings", inserted, listings.len());
                Ok(inserted)
            }
            Err(e) => {
                error!("Error saving listings: {}", e);
                rollback(tx, "persist_new").await;
                Err(e)
            }
        }
    }

    async fn upsert_subscriber(
        &self,
        email: &str,
        locations: &[String],
    ) -> Result<SubscribeOutcome, StoreError> {
        let locations: BTreeSet<String> = locations.iter().cloned().collect();

        let mut tx = self.pool.begin().await?;
        let (id, created) = match replace_subscription(&mut tx, email, &locations).await {
            Ok(result) => {
                tx.commit().await?;
                result
            }
            Err(e) => {
                error!("Error saving subscription for {}: {}", email, e);
                rollback(tx, "upsert_subscriber").await;
                return Err(e);
            }
        };

        Ok(SubscribeOutcome {
            subscriber: Subscriber {
                id,
                email: email.to_string(),
                locations: locations.into_iter().collect(),
            },
            created,
        })
    }

    async fn subscriber(&self, email: &str) -> Result<Option<Subscriber>, StoreError> {
        let row = sqlx::query_as::<_, SubscriberRow>(
            "SELECT id, email FROM subscribers WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(self.hydrate(r).await?)),
            None => Ok(None),
        }
    }

    async fn subscribers_for_location(
        &self,
        location: &str,
    ) -> Result<Vec<Subscriber>, StoreError> {
        let rows = sqlx::query_as::<_, SubscriberRow>(
            r#"
            SELECT s.id, s.email FROM subscribers s
            JOIN subscriber_locations sl ON sl.subscriber_id = s.id
            WHERE sl.location = ?
            ORDER BY s.id
            "#,
        )
        .bind(location)
        .fetch_all(&self.pool)
        .await?;

        let mut subscribers = Vec::with_capacity(rows.len());
        for row in rows {
            subscribers.push(self.hydrate(row).await?);
        }
        Ok(subscribers)
    }

    async fn subscribed_locations(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT location FROM subscriber_locations ORDER BY location",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(location,)| location).collect())
    }

    async fn unseen_listings(
        &self,
        subscriber_id: i64,
        location: &str,
    ) -> Result<Vec<Listing>, StoreError> {
        let rows = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT l.id, l.title, l.location, l.link, l.first_seen_at FROM listings l
            WHERE l.location = ?
            AND NOT EXISTS (
                SELECT 1 FROM notifications n
                WHERE n.listing_id = l.id AND n.subscriber_id = ?
            )
            ORDER BY l.first_seen_at, l.id
            "#,
        )
        .bind(location)
        .bind(subscriber_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_listing()).collect()
    }

    async fn record_notifications(
        &self,
        subscriber_id: i64,
        listing_ids: &[String],
    ) -> Result<usize, StoreError> {
        if listing_ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        match insert_notifications(&mut tx, subscriber_id, listing_ids).await {
            Ok(inserted) => {
                tx.commit().await?;
                Ok(inserted)
            }
            Err(e) => {
                error!(
                    "Error recording notifications for subscriber {}: {}",
                    subscriber_id, e
                );
                rollback(tx, "record_notifications").await;
                Err(e)
            }
        }
    }

    async fn listing_count(&self) -> Result<usize, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM listings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 as usize)
    }
}
