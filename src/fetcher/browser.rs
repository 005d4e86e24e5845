//! chromiumoxide による求人一覧の取得
//!
//! 勤務地ごとにブラウザを1つ起動し、巡回が終わったら必ず閉じる。

use std::time::Instant;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::FetcherConfig;
use crate::error::FetchError;
use crate::traits::{ListingFetcher, ListingPages};

use super::pages::walk_pages;
use super::types::{ListingPage, RawAnchor, ScrapedListing};

/// h3 直下の求人詳細リンク
const EXTRACT_LISTINGS_JS: &str = r#"
(() => {
    const links = document.querySelectorAll('h3 > a[href^="/job/"]');
    return Array.from(links)
        .map(a => ({
            title: (a.innerText || '').trim(),
            href: a.getAttribute('href') || ''
        }))
        .filter(j => j.title && j.href);
})()
"#;

/// 「次へ」ボタン（無効化されていないもの）またはテキストリンク
const HAS_NEXT_PAGE_JS: &str = r#"
(() => {
    const nextBtn = document.querySelector('.pagination .next');
    if (nextBtn && !nextBtn.classList.contains('disabled')) return true;
    const links = Array.from(document.querySelectorAll('a'));
    return links.some(a => (a.innerText || '').includes('Next') || (a.innerText || '').includes('›'));
})()
"#;

/// Performance API でリクエストが落ち着いたか判定する
const NETWORK_IDLE_JS: &str = r#"
(() => {
    const entries = performance.getEntriesByType('resource');
    const now = performance.now();
    const recentRequests = entries.filter(e => (now - e.startTime) < 500 && e.duration === 0);
    const hasPending = window.__pendingRequests > 0;
    return recentRequests.length === 0 && !hasPending;
})()
"#;

/// 1勤務地分のブラウザセッション
pub struct BrowserSession {
    config: FetcherConfig,
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    /// ブラウザを起動して空のページを開く
    pub async fn launch(config: &FetcherConfig) -> Result<Self, FetchError> {
        info!("Launching browser...");

        let mut builder = BrowserConfig::builder();
        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .no_sandbox()
            .request_timeout(config.request_timeout)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder.build().map_err(FetchError::BrowserInit)?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| FetchError::BrowserInit(e.to_string()))?;

        // ハンドラータスクを起動
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                shutdown_browser(&mut browser, handler).await;
                return Err(FetchError::BrowserInit(e.to_string()));
            }
        };

        info!("Browser launched");
        Ok(Self {
            config: config.clone(),
            browser,
            page,
            handler,
        })
    }

    /// ページとブラウザを閉じる
    pub async fn close(self) {
        let Self {
            mut browser,
            page,
            handler,
            ..
        } = self;

        if let Err(e) = page.close().await {
            debug!("Failed to close page: {}", e);
        }
        shutdown_browser(&mut browser, handler).await;
        info!("Browser closed");
    }

    /// ネットワークリクエストがアイドル状態になるまで待機
    ///
    /// タイムアウトしてもエラーにはせず続行する。
    async fn wait_request_idle(&self) {
        let settle = &self.config.settle;
        let start = Instant::now();
        let mut idle_count = 0;

        while start.elapsed() < settle.idle_timeout {
            match self.page.evaluate(NETWORK_IDLE_JS).await {
                Ok(val) => {
                    if val.into_value::<bool>().unwrap_or(false) {
                        idle_count += 1;
                        if idle_count >= settle.required_idle_checks {
                            debug!(
                                "Network idle after {:?} ({} consecutive checks)",
                                start.elapsed(),
                                idle_count
                            );
                            return;
                        }
                    } else {
                        idle_count = 0;
                    }
                }
                Err(e) => {
                    debug!("Network idle check error: {}", e);
                    idle_count = 0;
                }
            }

            sleep(settle.check_interval).await;
        }

        warn!(
            "Network idle timeout after {:?}, proceeding anyway",
            start.elapsed()
        );
    }

    async fn extract_anchors(&self) -> Result<Vec<RawAnchor>, FetchError> {
        let result = self
            .page
            .evaluate(EXTRACT_LISTINGS_JS)
            .await
            .map_err(|e| FetchError::JavaScript(e.to_string()))?;

        result
            .into_value::<Vec<RawAnchor>>()
            .map_err(|e| FetchError::ElementNotFound(format!("listing anchors: {}", e)))
    }

    async fn has_next_page(&self) -> Result<bool, FetchError> {
        let result = self
            .page
            .evaluate(HAS_NEXT_PAGE_JS)
            .await
            .map_err(|e| FetchError::JavaScript(e.to_string()))?;

        Ok(result.into_value::<bool>().unwrap_or(false))
    }

    /// デバッグ用スクリーンショットをログに出す
    async fn log_screenshot(&self, label: &str) {
        if !self.config.debug {
            return;
        }

        match self
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            Ok(screenshot) => {
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
                debug!("{} screenshot: data:image/png;base64,{}", label, encoded);
            }
            Err(e) => debug!("Failed to take screenshot: {}", e),
        }
    }
}

async fn shutdown_browser(browser: &mut Browser, handler: JoinHandle<()>) {
    if let Err(e) = browser.close().await {
        debug!("Failed to close browser: {}", e);
    }
    if let Err(e) = browser.wait().await {
        debug!("Failed to wait for browser exit: {}", e);
    }
    handler.abort();
}

#[async_trait]
impl ListingPages for BrowserSession {
    async fn load(&mut self, location: &str, page: u32) -> Result<ListingPage, FetchError> {
        let url = self.config.page_url(location, page);
        info!("Fetching URL: {}", url);

        tokio::time::timeout(self.config.page_timeout, self.page.goto(url.as_str()))
            .await
            .map_err(|_| {
                FetchError::Timeout(format!(
                    "page {} did not load within {:?}",
                    page, self.config.page_timeout
                ))
            })?
            .map_err(|e| FetchError::Navigation(e.to_string()))?;

        self.wait_request_idle().await;

        let anchors = match self.extract_anchors().await {
            Ok(anchors) => anchors,
            Err(e) => {
                self.log_screenshot(&format!("Extraction failure (page {})", page))
                    .await;
                return Err(e);
            }
        };

        if anchors.is_empty() {
            return Ok(ListingPage::default());
        }

        let has_next = self.has_next_page().await;
        Ok(page_with_next(anchors, has_next, location, page))
    }
}

/// 抽出済みの求人は「次へ」の判定に失敗しても捨てず、最終ページとして扱う
fn page_with_next(
    anchors: Vec<RawAnchor>,
    has_next: Result<bool, FetchError>,
    location: &str,
    page: u32,
) -> ListingPage {
    let has_next = match has_next {
        Ok(has_next) => has_next,
        Err(e) => {
            warn!(
                location,
                page,
                error = %e,
                "Next-page check failed, treating as last page"
            );
            false
        }
    };
    ListingPage { anchors, has_next }
}

/// ブラウザで求人一覧を取得するフェッチャー
#[derive(Debug, Clone)]
pub struct ChromeFetcher {
    config: FetcherConfig,
}

impl ChromeFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }
}

#[async_trait]
impl ListingFetcher for ChromeFetcher {
    async fn fetch_listings(&self, location: &str) -> Result<Vec<ScrapedListing>, FetchError> {
        info!("Fetching listings for location: {}", location);
        let started = Instant::now();

        let mut session = BrowserSession::launch(&self.config).await?;

        // walk_pages はエラーを内部で処理するので、ここから close まで早期リターンはない
        let listings = walk_pages(
            &mut session,
            location,
            &self.config.origin,
            self.config.max_pages,
        )
        .await;

        session.close().await;

        info!("Finished fetching {} in {:?}", location, started.elapsed());
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_fetcher_new() {
        let config = FetcherConfig::new().with_max_pages(2).with_headless(false);
        let fetcher = ChromeFetcher::new(config);

        assert_eq!(fetcher.config().max_pages, 2);
        assert!(!fetcher.config().headless);
    }

    #[test]
    fn test_next_page_failure_keeps_anchors() {
        let anchors = vec![RawAnchor::new("QA", "/job/1/"), RawAnchor::new("Dev", "/job/2/")];

        let page = page_with_next(
            anchors.clone(),
            Err(FetchError::JavaScript("Execution context was destroyed".into())),
            "חיפה",
            3,
        );
        assert_eq!(page.anchors, anchors);
        assert!(!page.has_next);

        let page = page_with_next(anchors, Ok(true), "חיפה", 3);
        assert!(page.has_next);
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test fetch_real_location -- --ignored --nocapture
    async fn test_fetch_real_location() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info,job_alert=debug")
            .try_init();

        let fetcher = ChromeFetcher::new(FetcherConfig::new().with_max_pages(2));
        let listings = fetcher.fetch_listings("יהוד").await.unwrap();

        for l in &listings {
            println!("- {} ({})", l.title, l.link);
            assert!(l.link.starts_with("https://jobs.iai.co.il/"));
        }
    }
}
