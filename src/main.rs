// 求人アラートサーバーのエントリポイント

use std::sync::Arc;

use anyhow::{Context, Result};
use job_alert::{
    build_app, spawn_worker, start_scheduler, AppConfig, AppState, ChromeFetcher,
    NotificationEngine, SmtpMailer, SqliteStore, Sweeper, WorkQueue,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // ログ設定
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,job_alert=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    tracing::info!(
        "Configuration loaded ({} locations, sweep schedule {})",
        config.locations.len(),
        config.sweep_cron
    );

    let store = Arc::new(
        SqliteStore::new(&config.database_url)
            .await
            .context("Failed to open database")?,
    );
    let mailer = Arc::new(SmtpMailer::new(config.mail.clone()).context("Failed to configure mailer")?);
    let fetcher = Arc::new(ChromeFetcher::new(config.fetcher.clone()));

    let engine = NotificationEngine::new(fetcher, store.clone(), mailer);
    let sweeper = Sweeper::new(engine.clone());

    // 購読直後の処理はワーカー1つで順番に実行
    let (queue, receiver) = WorkQueue::new(config.work_queue_capacity);
    let _worker = spawn_worker(engine, receiver);

    let _scheduler = start_scheduler(sweeper.clone(), &config.sweep_cron)
        .await
        .context("Failed to start scheduler")?;

    let app = build_app(AppState {
        store,
        sweeper,
        queue,
        locations: Arc::new(config.locations.clone()),
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Server running on http://localhost:{}", config.port);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
