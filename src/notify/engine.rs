//! 勤務地単位の スクレイプ → 保存 → 通知
//!
//! 通知済み記録は配信成功後にのみ書き込む。配信に失敗した求人は記録が残らないため、
//! 次回のスイープで未通知として再び選ばれる（明示的なリトライ回数は持たない）。

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::error::PipelineError;
use crate::store::{Listing, Subscriber};
use crate::traits::{ListingFetcher, ListingStore, Mailer};

/// 1勤務地分の処理結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationReport {
    pub location: String,
    /// フェッチした件数
    pub fetched: usize,
    /// 新規保存した件数
    pub new_listings: usize,
    /// 勤務地の購読者数
    pub subscribers: usize,
    /// メールを送った購読者数
    pub notified: usize,
    /// 通知済みとして記録した件数
    pub recorded: usize,
    /// 配信または記録に失敗した購読者数
    pub failed: usize,
}

/// 購読者1人分の結果
enum Delivery {
    NothingNew,
    Delivered { recorded: usize },
    Failed,
}

/// 通知エンジン
#[derive(Clone)]
pub struct NotificationEngine {
    fetcher: Arc<dyn ListingFetcher>,
    store: Arc<dyn ListingStore>,
    mailer: Arc<dyn Mailer>,
}

impl NotificationEngine {
    pub fn new(
        fetcher: Arc<dyn ListingFetcher>,
        store: Arc<dyn ListingStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            fetcher,
            store,
            mailer,
        }
    }

    pub fn store(&self) -> &Arc<dyn ListingStore> {
        &self.store
    }

    /// 勤務地の求人を取得・保存し、購読者ごとに未通知分を配信する
    ///
    /// フェッチャーの起動失敗と保存・購読者読み込みの失敗は呼び出し元に返す。
    /// 購読者単位の失敗はログに残して次の購読者へ進む。
    pub async fn process_location(&self, location: &str) -> Result<LocationReport, PipelineError> {
        info!(location, "Processing location");

        let scraped = self.fetcher.fetch_listings(location).await?;
        let fetched = scraped.len();

        let now = Utc::now();
        let listings: Vec<Listing> = scraped
            .into_iter()
            .map(|s| Listing::from_scraped(s, now))
            .collect();
        let new_listings = self.store.persist_new(&listings).await?;
        info!(location, fetched, new_listings, "Listings persisted");

        let subscribers = self.store.subscribers_for_location(location).await?;
        let mut report = LocationReport {
            location: location.to_string(),
            fetched,
            new_listings,
            subscribers: subscribers.len(),
            ..Default::default()
        };

        if subscribers.is_empty() {
            debug!(location, "No subscribers");
            return Ok(report);
        }

        for subscriber in &subscribers {
            match self.notify_subscriber(subscriber, location).await {
                Delivery::NothingNew => {}
                Delivery::Delivered { recorded } => {
                    report.notified += 1;
                    report.recorded += recorded;
                }
                Delivery::Failed => report.failed += 1,
            }
        }

        info!(
            location,
            notified = report.notified,
            subscribers = report.subscribers,
            failed = report.failed,
            "Location processed"
        );
        Ok(report)
    }

    async fn notify_subscriber(&self, subscriber: &Subscriber, location: &str) -> Delivery {
        let unseen = match self.store.unseen_listings(subscriber.id, location).await {
            Ok(unseen) => unseen,
            Err(e) => {
                error!(
                    email = %subscriber.email,
                    location,
                    error = %e,
                    "Failed to load unseen listings"
                );
                return Delivery::Failed;
            }
        };

        if unseen.is_empty() {
            return Delivery::NothingNew;
        }

        info!(email = %subscriber.email, count = unseen.len(), "Sending listings");
        if let Err(e) = self.mailer.send_listings(&subscriber.email, &unseen).await {
            error!(email = %subscriber.email, error = %e, "Error sending email");
            return Delivery::Failed;
        }

        let ids: Vec<String> = unseen.into_iter().map(|l| l.id).collect();
        match self.store.record_notifications(subscriber.id, &ids).await {
            Ok(recorded) => Delivery::Delivered { recorded },
            Err(e) => {
                // メールは届いているので、次回は重複して送られる
                warn!(
                    email = %subscriber.email,
                    error = %e,
                    "Delivered but failed to record notifications"
                );
                Delivery::Failed
            }
        }
    }
}
