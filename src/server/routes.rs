use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lettre::Address;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::scheduler::Task;

use super::AppState;

/// APIエラー（`{"error": ...}` で返す）
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub message: String,
    pub locations: usize,
    pub failed: Vec<String>,
}

/// 購読リクエスト
///
/// 旧形式の単一 `location` も受け付け、`locations` に合流させる。
#[derive(Debug, Default, Deserialize)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub locations: Option<Vec<String>>,
    #[serde(default)]
    pub location: Option<String>,
}

impl SubscribeRequest {
    /// 前後の空白を除き、空の値と重複を落とす。メールアドレスは形式を検査する
    pub fn validate(self) -> Result<(String, Vec<String>), ApiError> {
        let email = self
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        let mut locations: Vec<String> = Vec::new();
        for location in self.locations.unwrap_or_default().into_iter().chain(self.location) {
            let location = location.trim();
            if !location.is_empty() && !locations.iter().any(|l| l == location) {
                locations.push(location.to_string());
            }
        }

        let email = match email {
            Some(email) if !locations.is_empty() => email,
            _ => {
                return Err(ApiError::Validation(
                    "Email and locations are required".to_string(),
                ))
            }
        };

        // 配信できない宛先は保存しない
        email
            .parse::<Address>()
            .map_err(|e| ApiError::Validation(format!("Invalid email address: {}", e)))?;

        Ok((email, locations))
    }
}

pub async fn list_locations(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.locations.as_ref().clone())
}

pub async fn subscribe(
    State(state): State<AppState>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let (email, locations) = request.validate()?;

    for location in &locations {
        if !state.locations.contains(location) {
            warn!(
                email = %email,
                location = %location,
                "Subscription names an unknown location; it may never match listings"
            );
        }
    }

    let outcome = state
        .store
        .upsert_subscriber(&email, &locations)
        .await
        .map_err(|e| {
            error!(email = %email, error = %e, "Failed to save subscription");
            ApiError::Internal("Database error".to_string())
        })?;

    info!(
        email = %email,
        created = outcome.created,
        locations = locations.len(),
        "Subscription saved"
    );

    // 応答はスクレイプの完了を待たない
    for location in locations {
        state.queue.submit(Task::ProcessLocation(location));
    }

    let message = if outcome.created {
        "Subscribed successfully! Sending initial job list..."
    } else {
        "Subscription updated successfully! Sending updated job list..."
    };
    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

pub async fn trigger_check(
    State(state): State<AppState>,
) -> Result<Json<TriggerResponse>, ApiError> {
    info!("Manual job check triggered");

    let report = state.sweeper.run_sweep().await.map_err(|e| {
        error!("Manual job check failed: {}", e);
        ApiError::Internal("Error triggering check".to_string())
    })?;

    Ok(Json(TriggerResponse {
        message: "Check triggered".to_string(),
        locations: report.locations(),
        failed: report.failed,
    }))
}
