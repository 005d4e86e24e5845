//! ページ送りの巡回

use tracing::{debug, error, info, warn};

use crate::traits::ListingPages;

use super::types::ScrapedListing;

/// 1ページ目から順に読み込み、求人を集める
///
/// 次の場合に終了する:
/// - 求人が0件のページ
/// - 「次へ」がない
/// - `max_pages` に到達（異常として warn を出す）
/// - 読み込みエラー（それまでの結果を返す）
pub async fn walk_pages<P>(
    pages: &mut P,
    location: &str,
    origin: &str,
    max_pages: u32,
) -> Vec<ScrapedListing>
where
    P: ListingPages + ?Sized,
{
    let max_pages = max_pages.max(1);
    let mut listings = Vec::new();
    let mut page = 1;

    loop {
        let loaded = match pages.load(location, page).await {
            Ok(loaded) => loaded,
            Err(e) => {
                error!(
                    location,
                    page,
                    kept = listings.len(),
                    error = %e,
                    "Error fetching page"
                );
                break;
            }
        };

        if loaded.anchors.is_empty() {
            debug!(location, page, "No listings on page");
            break;
        }

        let before = listings.len();
        listings.extend(
            loaded
                .anchors
                .into_iter()
                .filter_map(|anchor| anchor.into_listing(origin, location)),
        );
        debug!(location, page, count = listings.len() - before, "Page extracted");

        if !loaded.has_next {
            break;
        }

        if page >= max_pages {
            warn!(
                location,
                max_pages, "Page cap reached while a next page was still offered"
            );
            break;
        }

        page += 1;
    }

    info!(location, pages = page, count = listings.len(), "Fetched listings");
    listings
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;

    use super::*;
    use crate::error::FetchError;
    use crate::fetcher::types::{ListingPage, RawAnchor};

    const ORIGIN: &str = "https://jobs.iai.co.il";

    /// 台本どおりにページを返すセッション
    struct ScriptedPages {
        script: VecDeque<Result<ListingPage, FetchError>>,
        requested: Vec<u32>,
    }

    impl ScriptedPages {
        fn new(script: Vec<Result<ListingPage, FetchError>>) -> Self {
            Self {
                script: script.into(),
                requested: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl ListingPages for ScriptedPages {
        async fn load(&mut self, _location: &str, page: u32) -> Result<ListingPage, FetchError> {
            self.requested.push(page);
            self.script.pop_front().unwrap_or_else(|| Ok(ListingPage::default()))
        }
    }

    /// 常に「次へ」がありリンクを1件返すセッション
    struct EndlessPages {
        loads: u32,
    }

    #[async_trait]
    impl ListingPages for EndlessPages {
        async fn load(&mut self, _location: &str, page: u32) -> Result<ListingPage, FetchError> {
            self.loads += 1;
            Ok(ListingPage {
                anchors: vec![RawAnchor::new(format!("Job {}", page), format!("/job/{}/", page))],
                has_next: true,
            })
        }
    }

    fn page(titles: &[&str], has_next: bool) -> ListingPage {
        ListingPage {
            anchors: titles
                .iter()
                .map(|t| RawAnchor::new(*t, format!("/job/{}/", t)))
                .collect(),
            has_next,
        }
    }

    #[tokio::test]
    async fn test_stops_on_empty_page() {
        let mut pages = ScriptedPages::new(vec![Ok(page(&["a", "b"], true)), Ok(page(&[], true))]);

        let listings = walk_pages(&mut pages, "X", ORIGIN, 10).await;

        assert_eq!(listings.len(), 2);
        assert_eq!(pages.requested, vec![1, 2]);
        assert_eq!(listings[0].link, "https://jobs.iai.co.il/job/a/");
        assert_eq!(listings[0].location, "X");
    }

    #[tokio::test]
    async fn test_stops_without_next_page() {
        let mut pages = ScriptedPages::new(vec![Ok(page(&["a"], true)), Ok(page(&["b"], false))]);

        let listings = walk_pages(&mut pages, "X", ORIGIN, 10).await;

        assert_eq!(listings.len(), 2);
        assert_eq!(pages.requested, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_page_cap_stops_after_ten_fetches() {
        let mut pages = EndlessPages { loads: 0 };

        let listings = walk_pages(&mut pages, "X", ORIGIN, 10).await;

        assert_eq!(pages.loads, 10);
        assert_eq!(listings.len(), 10);
    }

    #[tokio::test]
    async fn test_error_keeps_accumulated_listings() {
        let mut pages = ScriptedPages::new(vec![
            Ok(page(&["a", "b"], true)),
            Err(FetchError::Navigation("net::ERR_CONNECTION_RESET".into())),
            Ok(page(&["c"], false)),
        ]);

        let listings = walk_pages(&mut pages, "X", ORIGIN, 10).await;

        assert_eq!(listings.len(), 2);
        assert_eq!(pages.requested, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_error_on_first_page_yields_empty() {
        let mut pages =
            ScriptedPages::new(vec![Err(FetchError::Timeout("page 1".into()))]);

        let listings = walk_pages(&mut pages, "X", ORIGIN, 10).await;

        assert!(listings.is_empty());
    }
}
