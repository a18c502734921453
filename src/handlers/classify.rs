//! Classification handler
//!
//! body -> ClassifyRequest -> base64 decode -> model check -> preprocess -> label.
//! Every stage converts its own failure into an [`AppError`], which decides
//! the status code; nothing escapes as an unhandled fault.

use axum::{body::Bytes, extract::State, Json};
use uuid::Uuid;

use crate::config::ServiceMode;
use crate::logic::model::ModelHolder;
use crate::logic::{decode, preprocess};
use crate::models::{ClassifyRequest, ClassifyResponse, EchoResponse, PredictionResponse};
use crate::{AppError, AppResult, AppState};

/// POST /classify/v0
pub async fn classify(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<ClassifyResponse>> {
    let request_id = Uuid::new_v4();
    let mode = state.config.mode;
    let span = tracing::info_span!("classify", %request_id, ?mode);
    let holder = state.holder.clone();

    // CPU-bound pipeline, keep it off the async workers
    let response = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        match mode {
            ServiceMode::Predict => predict_digit(&holder, &body).map(ClassifyResponse::Prediction),
            ServiceMode::Echo => echo(&body).map(ClassifyResponse::Echo),
        }
    })
    .await??;

    Ok(Json(response))
}

/// Synchronous request pipeline for the model-backed endpoint
pub fn predict_digit(holder: &ModelHolder, body: &[u8]) -> AppResult<PredictionResponse> {
    let request = ClassifyRequest::parse(body)?;
    let image_bytes = decode::decode(&request.image)?;

    // Unavailable wins over image content once the payload is well formed
    let model = holder.current().ok_or(AppError::ModelUnavailable)?;

    let tensor = preprocess::preprocess(&image_bytes)?;
    let result = model.predict(&tensor)?;

    tracing::info!(
        label = result.label,
        latency_us = result.inference_time_us,
        "Predicted digit"
    );

    Ok(PredictionResponse {
        predicted_digit: result.label,
    })
}

/// Echo variant: decoded bytes back as hex, no model involved
pub fn echo(body: &[u8]) -> AppResult<EchoResponse> {
    let request = ClassifyRequest::parse(body)?;
    let image_bytes = decode::decode(&request.image)?;

    tracing::debug!("Echoing {} decoded bytes", image_bytes.len());

    Ok(EchoResponse {
        decoded: hex::encode(image_bytes),
    })
}
