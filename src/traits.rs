use async_trait::async_trait;

use crate::error::{FetchError, MailError, StoreError};
use crate::fetcher::{ListingPage, ScrapedListing};
use crate::store::{Listing, SubscribeOutcome, Subscriber};

/// 勤務地ごとの求人一覧取得
#[async_trait]
pub trait ListingFetcher: Send + Sync {
    /// 全ページを巡回して求人を返す
    ///
    /// ページ途中のエラーはそこまでの結果で打ち切る。
    /// Err になるのはブラウザ自体が起動できない場合のみ。
    async fn fetch_listings(&self, location: &str) -> Result<Vec<ScrapedListing>, FetchError>;
}

/// 1勤務地分のページ巡回セッション
#[async_trait]
pub trait ListingPages: Send {
    /// 指定ページを読み込み、求人リンクと次ページの有無を返す
    async fn load(&mut self, location: &str, page: u32) -> Result<ListingPage, FetchError>;
}

/// 求人・購読者・通知記録の永続化
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// 未登録の求人だけを1トランザクションで保存し、新規件数を返す
    async fn persist_new(&self, listings: &[Listing]) -> Result<usize, StoreError>;

    /// 購読者を作成、または勤務地セットを丸ごと置き換える
    async fn upsert_subscriber(
        &self,
        email: &str,
        locations: &[String],
    ) -> Result<SubscribeOutcome, StoreError>;

    async fn subscriber(&self, email: &str) -> Result<Option<Subscriber>, StoreError>;

    async fn subscribers_for_location(&self, location: &str)
        -> Result<Vec<Subscriber>, StoreError>;

    /// 全購読者の勤務地（重複なし）
    async fn subscribed_locations(&self) -> Result<Vec<String>, StoreError>;

    /// 購読者にまだ通知していない、勤務地の求人
    async fn unseen_listings(
        &self,
        subscriber_id: i64,
        location: &str,
    ) -> Result<Vec<Listing>, StoreError>;

    /// 通知済み記録を1トランザクションで追加し、新規件数を返す
    async fn record_notifications(
        &self,
        subscriber_id: i64,
        listing_ids: &[String],
    ) -> Result<usize, StoreError>;

    async fn listing_count(&self) -> Result<usize, StoreError>;
}

/// 新着求人のメール配信
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_listings(&self, to: &str, listings: &[Listing]) -> Result<(), MailError>;
}
