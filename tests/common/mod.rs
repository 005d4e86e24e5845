//! 統合テスト共通のフェイク実装

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use job_alert::{
    walk_pages, FetchError, Listing, ListingFetcher, ListingPage, ListingPages, MailError, Mailer,
    NotificationEngine, RawAnchor, ScrapedListing, SqliteStore,
};

pub const ORIGIN: &str = "https://jobs.iai.co.il";

pub fn scraped(title: &str, location: &str) -> ScrapedListing {
    ScrapedListing::new(title, format!("{}/job/{}/", ORIGIN, title), location)
}

/// 勤務地ごとに決まった求人を返すフェッチャー
#[derive(Default)]
pub struct ScriptedFetcher {
    listings: Mutex<HashMap<String, Vec<ScrapedListing>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn set(&self, location: &str, listings: Vec<ScrapedListing>) {
        self.listings
            .lock()
            .unwrap()
            .insert(location.to_string(), listings);
    }

    pub fn fail_on(&self, location: &str) {
        self.failing.lock().unwrap().insert(location.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingFetcher for ScriptedFetcher {
    async fn fetch_listings(&self, location: &str) -> Result<Vec<ScrapedListing>, FetchError> {
        self.calls.lock().unwrap().push(location.to_string());
        if self.failing.lock().unwrap().contains(location) {
            return Err(FetchError::BrowserInit("chrome not found".into()));
        }
        Ok(self
            .listings
            .lock()
            .unwrap()
            .get(location)
            .cloned()
            .unwrap_or_default())
    }
}

/// 台本どおりのページを walk_pages で巡回するフェッチャー
pub struct PagedFetcher {
    pages: Mutex<VecDeque<ListingPage>>,
}

impl PagedFetcher {
    pub fn new(pages: Vec<ListingPage>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
        }
    }
}

struct QueuedPages<'a> {
    pages: &'a Mutex<VecDeque<ListingPage>>,
}

#[async_trait]
impl ListingPages for QueuedPages<'_> {
    async fn load(&mut self, _location: &str, _page: u32) -> Result<ListingPage, FetchError> {
        Ok(self.pages.lock().unwrap().pop_front().unwrap_or_default())
    }
}

#[async_trait]
impl ListingFetcher for PagedFetcher {
    async fn fetch_listings(&self, location: &str) -> Result<Vec<ScrapedListing>, FetchError> {
        let mut session = QueuedPages { pages: &self.pages };
        Ok(walk_pages(&mut session, location, ORIGIN, 10).await)
    }
}

pub fn page(hrefs: &[(&str, &str)], has_next: bool) -> ListingPage {
    ListingPage {
        anchors: hrefs
            .iter()
            .map(|(title, href)| RawAnchor::new(*title, *href))
            .collect(),
        has_next,
    }
}

/// 送信内容を記録するメーラー
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, Vec<String>)>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingMailer {
    pub fn fail_for(&self, email: &str) {
        self.failing.lock().unwrap().insert(email.to_string());
    }

    pub fn recover(&self, email: &str) {
        self.failing.lock().unwrap().remove(email);
    }

    /// (宛先, 求人タイトル) の送信履歴
    pub fn sent(&self) -> Vec<(String, Vec<String>)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, email: &str) -> Vec<Vec<String>> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| to == email)
            .map(|(_, titles)| titles)
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_listings(&self, to: &str, listings: &[Listing]) -> Result<(), MailError> {
        if self.failing.lock().unwrap().contains(to) {
            return Err(MailError::Transport("connection refused".into()));
        }
        self.sent.lock().unwrap().push((
            to.to_string(),
            listings.iter().map(|l| l.title.clone()).collect(),
        ));
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub mailer: Arc<RecordingMailer>,
    pub engine: NotificationEngine,
}

pub async fn harness() -> Harness {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let fetcher = Arc::new(ScriptedFetcher::default());
    let mailer = Arc::new(RecordingMailer::default());
    let engine = NotificationEngine::new(fetcher.clone(), store.clone(), mailer.clone());
    Harness {
        store,
        fetcher,
        mailer,
        engine,
    }
}
