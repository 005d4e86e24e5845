//! 求人アラートライブラリ
//!
//! - 勤務地ごとに求人一覧ページをブラウザで巡回して求人を取得
//! - タイトルとリンクから求人IDを導出し、新しい求人だけを保存
//! - 購読者ごとに未通知の求人をまとめてメール送信し、通知済みとして記録
//!
//! # フェッチャー使用例
//!
//! ```rust,ignore
//! use job_alert::{ChromeFetcher, FetcherConfig, ListingFetcher};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = FetcherConfig::new()
//!         .with_max_pages(3)
//!         .with_headless(false);
//!
//!     let fetcher = ChromeFetcher::new(config);
//!     let listings = fetcher.fetch_listings("יהוד").await.unwrap();
//!     println!("Found {} listings", listings.len());
//! }
//! ```
//!
//! # パイプライン使用例
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use job_alert::{
//!     ChromeFetcher, FetcherConfig, MailConfig, NotificationEngine, SmtpMailer, SqliteStore,
//!     Sweeper,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(SqliteStore::new("sqlite://jobs.db?mode=rwc").await.unwrap());
//!     let engine = NotificationEngine::new(
//!         Arc::new(ChromeFetcher::new(FetcherConfig::default())),
//!         store,
//!         Arc::new(SmtpMailer::new(MailConfig::default()).unwrap()),
//!     );
//!
//!     let report = Sweeper::new(engine).run_sweep().await.unwrap();
//!     println!("Processed {} locations", report.locations());
//! }
//! ```

pub mod config;
pub mod error;
pub mod fetcher;
pub mod notify;
pub mod scheduler;
pub mod server;
pub mod store;
pub mod traits;

// 主要な型をリエクスポート
pub use config::{AppConfig, FetcherConfig, MailConfig, SettleConfig};
pub use error::{FetchError, MailError, PipelineError, StoreError};
pub use fetcher::{walk_pages, BrowserSession, ChromeFetcher, ListingPage, RawAnchor, ScrapedListing};
pub use notify::{LocationReport, NotificationEngine, SmtpMailer};
pub use scheduler::{spawn_worker, start_scheduler, SweepReport, Sweeper, Task, WorkQueue};
pub use server::{build_app, AppState};
pub use store::{identify, Listing, SqliteStore, SubscribeOutcome, Subscriber};
pub use traits::{ListingFetcher, ListingPages, ListingStore, Mailer};
