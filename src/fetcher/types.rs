//! 求人一覧フェッチャーの型定義

use serde::{Deserialize, Serialize};

/// フェッチャーが返す求人（IDは保存時に導出する）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedListing {
    pub title: String,
    /// ページ上の href（IDの導出に使う）
    pub href: String,
    /// 絶対URL
    pub link: String,
    pub location: String,
}

impl ScrapedListing {
    /// 絶対URLから生成する（href はパス部分）
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        let link = link.into();
        Self {
            title: title.into(),
            href: path_of(&link).to_string(),
            link,
            location: location.into(),
        }
    }
}

/// ページから抽出した求人リンク（href は相対パスのまま）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawAnchor {
    pub title: String,
    pub href: String,
}

impl RawAnchor {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
        }
    }

    /// 空のタイトル・リンクは捨て、リンクを絶対URLにする
    pub fn into_listing(self, origin: &str, location: &str) -> Option<ScrapedListing> {
        let title = self.title.trim();
        let href = self.href.trim();
        if title.is_empty() || href.is_empty() {
            return None;
        }
        Some(ScrapedListing {
            title: title.to_string(),
            href: href.to_string(),
            link: absolutize(origin, href),
            location: location.to_string(),
        })
    }
}

/// 1ページ分の抽出結果
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub anchors: Vec<RawAnchor>,
    /// 「次へ」が存在し、無効化されていない
    pub has_next: bool,
}

/// 相対リンクにオリジンを付与する（絶対URLはそのまま）
pub fn absolutize(origin: &str, href: &str) -> String {
    if href.starts_with("https://") || href.starts_with("http://") {
        return href.to_string();
    }

    let origin = origin.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{}{}", origin, href)
    } else {
        format!("{}/{}", origin, href)
    }
}

/// 絶対URLのパス以降を返す（相対リンクはそのまま）
fn path_of(link: &str) -> &str {
    match link.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |i| &rest[i..]),
        None => link,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolutize() {
        let origin = "https://jobs.iai.co.il";
        assert_eq!(
            absolutize(origin, "/job/42/"),
            "https://jobs.iai.co.il/job/42/"
        );
        assert_eq!(
            absolutize("https://jobs.iai.co.il/", "job/42/"),
            "https://jobs.iai.co.il/job/42/"
        );
        assert_eq!(
            absolutize(origin, "https://other.example/job/1"),
            "https://other.example/job/1"
        );
    }

    #[test]
    fn test_into_listing_trims_and_filters() {
        let origin = "https://jobs.iai.co.il";

        let listing = RawAnchor::new("  Student QA \n", "/job/7/")
            .into_listing(origin, "חיפה")
            .unwrap();
        assert_eq!(listing.title, "Student QA");
        assert_eq!(listing.href, "/job/7/");
        assert_eq!(listing.link, "https://jobs.iai.co.il/job/7/");
        assert_eq!(listing.location, "חיפה");

        assert!(RawAnchor::new("   ", "/job/7/")
            .into_listing(origin, "חיפה")
            .is_none());
        assert!(RawAnchor::new("Title", "")
            .into_listing(origin, "חיפה")
            .is_none());
    }

    #[test]
    fn test_new_keeps_path_as_href() {
        let listing = ScrapedListing::new("QA", "https://jobs.iai.co.il/job/1/?a=b", "חיפה");
        assert_eq!(listing.href, "/job/1/?a=b");

        assert_eq!(ScrapedListing::new("QA", "https://x.example", "L").href, "/");
        assert_eq!(ScrapedListing::new("QA", "/job/2/", "L").href, "/job/2/");
    }
}
