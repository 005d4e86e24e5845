//! 求人一覧フェッチャー
//!
//! JavaScriptで描画される一覧ページをブラウザで巡回し、(タイトル, リンク) を抽出する

mod browser;
mod pages;
mod types;

pub use browser::{BrowserSession, ChromeFetcher};
pub use pages::walk_pages;
pub use types::{absolutize, ListingPage, RawAnchor, ScrapedListing};
