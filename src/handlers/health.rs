//! Health check handler

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    version: &'static str,
    timestamp: i64,
}

pub async fn check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status, message) = match &state.model {
        Some(_) => (StatusCode::OK, "ok", "Server is running"),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "error", "Model not loaded"),
    };

    (
        code,
        Json(HealthResponse {
            status,
            message,
            model: state.model.as_ref().map(|m| m.name().to_string()),
            version: env!("CARGO_PKG_VERSION"),
            timestamp: chrono::Utc::now().timestamp(),
        }),
    )
}
