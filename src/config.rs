use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// 求人サイトのオリジン
pub const DEFAULT_ORIGIN: &str = "https://jobs.iai.co.il";
/// 一覧ページのパス
pub const DEFAULT_LISTINGS_PATH: &str = "/jobs/";
/// 職種フィルター（学生向け求人）
pub const DEFAULT_JOB_TYPE: &str = "משרת סטודנט";
/// ページ送りの安全上限
pub const DEFAULT_MAX_PAGES: u32 = 10;
/// 購読可能な勤務地
pub const DEFAULT_LOCATIONS: &[&str] = &[
    "יהוד",
    "נתב\"ג",
    "ירושלים",
    "אשדוד",
    "באר יעקב",
    "חיפה",
    "באר שבע",
    "רמת הגולן",
    "פתח תקווה",
];
/// 送信せずにログ出力だけ行うSMTPホスト
pub const MOCK_SMTP_HOST: &str = "smtp.example.com";
/// 毎時0分
pub const DEFAULT_SWEEP_CRON: &str = "0 0 * * * *";

/// ネットワークアイドル判定の設定
#[derive(Debug, Clone, PartialEq)]
pub struct SettleConfig {
    /// アイドル待機の上限
    pub idle_timeout: Duration,
    /// 判定のインターバル
    pub check_interval: Duration,
    /// 連続でアイドルと判定される必要のある回数
    pub required_idle_checks: u32,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_millis(30000),
            check_interval: Duration::from_millis(500),
            required_idle_checks: 3,
        }
    }
}

/// 求人一覧フェッチャーの設定
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub origin: String,
    pub listings_path: String,
    pub job_type: String,
    pub max_pages: u32,
    pub headless: bool,
    pub debug: bool,
    /// Chrome 実行ファイル（未指定なら chromiumoxide の自動検出）
    pub chrome_path: Option<String>,
    /// ページ遷移1回あたりのタイムアウト
    pub page_timeout: Duration,
    /// CDPリクエストのタイムアウト
    pub request_timeout: Duration,
    pub settle: SettleConfig,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            listings_path: DEFAULT_LISTINGS_PATH.to_string(),
            job_type: DEFAULT_JOB_TYPE.to_string(),
            max_pages: DEFAULT_MAX_PAGES,
            headless: true,
            debug: false,
            chrome_path: None,
            page_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(60),
            settle: SettleConfig::default(),
        }
    }
}

impl FetcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_job_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = job_type.into();
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_chrome_path(mut self, path: impl Into<String>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    pub fn with_settle(mut self, settle: SettleConfig) -> Self {
        self.settle = settle;
        self
    }

    /// 指定ページの一覧URLを組み立てる
    pub fn page_url(&self, location: &str, page: u32) -> String {
        format!(
            "{}{}?tp={}&ct={}&page={}",
            self.origin.trim_end_matches('/'),
            self.listings_path,
            urlencoding::encode(&self.job_type),
            urlencoding::encode(location),
            page
        )
    }
}

/// SMTP送信設定
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub use_tls: bool,
    pub timeout: Duration,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: MOCK_SMTP_HOST.to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from: "Job Alert <noreply@example.com>".to_string(),
            use_tls: false,
            timeout: Duration::from_secs(30),
        }
    }
}

impl MailConfig {
    /// モックモード（ログ出力のみ）か
    pub fn is_mock(&self) -> bool {
        self.host == MOCK_SMTP_HOST
    }
}

/// アプリケーション全体の設定（環境変数から読み込む）
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub locations: Vec<String>,
    pub sweep_cron: String,
    pub work_queue_capacity: usize,
    pub fetcher: FetcherConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    /// 環境変数から設定を読み込む（.env があれば先に読み込む）
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let fetcher_defaults = FetcherConfig::default();
        let settle_defaults = SettleConfig::default();
        let mail_defaults = MailConfig::default();

        let fetcher = FetcherConfig {
            headless: parse_bool("SCRAPER_HEADLESS", true),
            debug: parse_bool("SCRAPER_DEBUG", false),
            chrome_path: env::var("CHROME_PATH")
                .or_else(|_| env::var("CHROMIUM_PATH"))
                .ok(),
            max_pages: parse_var("SCRAPER_MAX_PAGES", fetcher_defaults.max_pages)?,
            page_timeout: Duration::from_secs(parse_var(
                "SCRAPER_PAGE_TIMEOUT_SECS",
                fetcher_defaults.page_timeout.as_secs(),
            )?),
            settle: SettleConfig {
                idle_timeout: Duration::from_millis(parse_var(
                    "SCRAPER_IDLE_TIMEOUT_MS",
                    settle_defaults.idle_timeout.as_millis() as u64,
                )?),
                required_idle_checks: parse_var(
                    "SCRAPER_IDLE_CHECKS",
                    settle_defaults.required_idle_checks,
                )?,
                ..settle_defaults
            },
            ..fetcher_defaults
        };

        let mail = MailConfig {
            host: env::var("SMTP_HOST").unwrap_or(mail_defaults.host),
            port: parse_var("SMTP_PORT", mail_defaults.port)?,
            username: env::var("SMTP_USER").unwrap_or_default(),
            password: env::var("SMTP_PASS").unwrap_or_default(),
            from: env::var("SMTP_FROM").unwrap_or(mail_defaults.from),
            use_tls: parse_bool("SMTP_TLS", mail_defaults.use_tls),
            timeout: Duration::from_secs(parse_var(
                "SMTP_TIMEOUT_SECS",
                mail_defaults.timeout.as_secs(),
            )?),
        };

        let locations = env::var("LOCATIONS")
            .ok()
            .map(|raw| parse_locations(&raw))
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATIONS.iter().map(|l| l.to_string()).collect());

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://jobs.db?mode=rwc".to_string()),
            port: parse_var("PORT", 3000)?,
            locations,
            sweep_cron: env::var("SWEEP_CRON").unwrap_or_else(|_| DEFAULT_SWEEP_CRON.to_string()),
            work_queue_capacity: parse_var("WORK_QUEUE_CAPACITY", 64)?,
            fetcher,
            mail,
        })
    }
}

/// カンマ区切りの勤務地リストを分解する
pub fn parse_locations(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid value", key)),
        Err(_) => Ok(default),
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}
