//! Prediction handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::model::{classify, Keypoints, Prediction};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub keypoints: Option<Value>,
}

/// Classify one keypoint sample
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> AppResult<Json<Prediction>> {
    let model = state.model.clone().ok_or(AppError::ModelNotLoaded)?;

    let raw = match payload {
        Ok(Json(PredictRequest { keypoints: Some(raw) })) => raw,
        Ok(_) => return Err(AppError::MissingKeypoints),
        Err(rejection) => {
            tracing::warn!("Rejected predict body: {}", rejection.body_text());
            return Err(AppError::MissingKeypoints);
        }
    };

    let keypoints = Keypoints::from_json(&raw)?;
    tracing::debug!(
        "Received {} keypoint values, dims {:?}",
        keypoints.value_count(),
        keypoints.dims()
    );

    let input = keypoints.into_model_input(model.input_shape())?;

    let scores = tokio::task::spawn_blocking(move || model.predict(input))
        .await
        .map_err(|e| AppError::InternalError(format!("inference task failed: {}", e)))??;

    let prediction = classify(&scores, &state.labels)?;

    tracing::info!(
        "Prediction made: {} (class {}, confidence {:.3})",
        prediction.prediction,
        prediction.class_index,
        prediction.confidence
    );

    Ok(Json(prediction))
}
