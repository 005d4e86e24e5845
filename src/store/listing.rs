//! 求人・購読者の型定義と求人IDの導出

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fetcher::ScrapedListing;

/// タイトルとページ上の href から求人IDを導出する（MD5 の16進表現）
///
/// href はオリジンを付ける前の値を渡す。勤務地は含めないため、
/// 別の勤務地で同じタイトル・リンクの求人は同じIDになる。
pub fn identify(title: &str, link: &str) -> String {
    let mut input = String::with_capacity(title.len() + link.len());
    input.push_str(title);
    input.push_str(link);
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// 保存済みの求人
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub location: String,
    /// 絶対URL
    pub link: String,
    pub first_seen_at: DateTime<Utc>,
}

impl Listing {
    pub fn from_scraped(scraped: ScrapedListing, first_seen_at: DateTime<Utc>) -> Self {
        Self {
            id: identify(&scraped.title, &scraped.href),
            title: scraped.title,
            location: scraped.location,
            link: scraped.link,
            first_seen_at,
        }
    }
}

/// 購読者
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: i64,
    pub email: String,
    /// 購読中の勤務地（ソート済み）
    pub locations: Vec<String>,
}

/// 購読登録の結果
#[derive(Debug, Clone)]
pub struct SubscribeOutcome {
    pub subscriber: Subscriber,
    /// 新規作成なら true、既存の更新なら false
    pub created: bool,
}
