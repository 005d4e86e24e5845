//! HTTP API
//!
//! - `GET /api/locations` - 購読可能な勤務地
//! - `POST /api/subscribe` - 購読登録（勤務地セットは置き換え）
//! - `POST /api/trigger-check` - スイープを同期実行

mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::scheduler::{Sweeper, WorkQueue};
use crate::traits::ListingStore;

pub use routes::{ApiError, MessageResponse, SubscribeRequest, TriggerResponse};

/// ハンドラー共有の状態
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ListingStore>,
    pub sweeper: Sweeper,
    pub queue: WorkQueue,
    /// 購読可能な勤務地（表示順）
    pub locations: Arc<Vec<String>>,
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/locations", get(routes::list_locations))
        .route("/api/subscribe", post(routes::subscribe))
        .route("/api/trigger-check", post(routes::trigger_check))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
