use thiserror::Error;

/// 求人ページ取得のエラー
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("要素が見つかりません: {0}")]
    ElementNotFound(String),
}

/// 永続化レイヤーのエラー
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("データベースエラー: {0}")]
    Database(#[from] sqlx::Error),

    #[error("不正な行データ: {0}")]
    InvalidRow(String),
}

/// メール送信のエラー
#[derive(Error, Debug)]
pub enum MailError {
    #[error("不正なメールアドレス: {0}")]
    Address(String),

    #[error("メッセージ作成エラー: {0}")]
    Build(String),

    #[error("テンプレートエラー: {0}")]
    Template(String),

    #[error("送信エラー: {0}")]
    Transport(String),
}

/// スクレイプ → 保存 → 通知 パイプラインのエラー
///
/// 配信エラーは購読者単位でログに留め、ここには含めない
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
