// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction endpoint handler

use axum::{
    extract::State,
    http::{HeaderName, HeaderValue},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::request::read_upload;
use super::response::{PredictResponse, PROCESSING_TIME_HEADER};
use crate::api::errors::{ApiError, ApiErrorResponse};
use crate::api::http_server::AppState;
use crate::screening::{InferenceResult, ModelSlot, ScreeningError, TwoStagePredictor};

/// POST /predict (also POST /analyze/) - Screen a fundus image
///
/// # Request
/// Multipart form with the image in field `image` or `file` (JPEG or PNG).
///
/// # Response
/// - `is_nerve`: Whether the gating model recognised an optic nerve
/// - `nerve_probability`: Gate probability (0.0-1.0)
/// - `cdr_prediction`: Cup-to-disc ratio, `null` if not a nerve
/// - `glaucoma_suspected`: CDR at or above threshold, `null` if not a nerve
/// - `risk_tier`: `low`, `moderate` or `high`, `null` if not a nerve
///
/// Processing time is reported in the `x-processing-time-ms` header.
///
/// # Errors
/// - 400 Bad Request: Missing/invalid image or malformed form
/// - 413 Payload Too Large: Upload above the size limit
/// - 503 Service Unavailable: Models loading or failed to load
/// - 500 Internal Server Error: Inference failed
pub async fn predict_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiErrorResponse> {
    let request_id = Uuid::new_v4().to_string();
    let started = Instant::now();
    let fail = |e: ApiError| e.with_request_id(request_id.clone());

    // 1. Models must be installed
    let Some(bundle) = state.current_bundle().await else {
        let reason = match state.model_slot().await {
            ModelSlot::Failed(reason) => format!("Models failed to load: {}", reason),
            _ => "Models are still loading, retry shortly".to_string(),
        };
        warn!("[{}] Prediction rejected: {}", request_id, reason);
        return Err(fail(ScreeningError::ModelsUnavailable(reason).into()));
    };

    // 2. Extract the upload
    let mut multipart = multipart.map_err(|e| {
        warn!("[{}] Rejected multipart request: {}", request_id, e);
        fail(ApiError::InvalidRequest(format!(
            "Expected a multipart/form-data upload: {}",
            e
        )))
    })?;

    let upload = read_upload(&mut multipart).await.map_err(|e| {
        warn!("[{}] Upload rejected: {}", request_id, e);
        fail(e)
    })?;
    upload.validate().map_err(|e| {
        warn!("[{}] Upload rejected: {}", request_id, e);
        fail(e)
    })?;

    debug!(
        "[{}] Screening '{}' ({} bytes)",
        request_id,
        upload.file_name.as_deref().unwrap_or("<unnamed>"),
        upload.bytes.len()
    );

    // 3. Decode, normalize and run both stages off the async runtime
    let normalizer = state.normalizer.clone();
    let predictor = TwoStagePredictor::new(bundle, state.config.thresholds());
    let bytes = upload.bytes;

    let outcome = tokio::task::spawn_blocking(move || -> Result<InferenceResult, ScreeningError> {
        let (tensor, _info) = normalizer.normalize_bytes(&bytes)?;
        predictor.predict(&tensor)
    })
    .await
    .map_err(|e| {
        error!("[{}] Screening task failed: {}", request_id, e);
        fail(ApiError::InternalError("Prediction task failed".to_string()))
    })?;

    let result = outcome.map_err(|e| {
        match &e {
            ScreeningError::Inference(msg) => {
                error!("[{}] Inference failed: {}", request_id, msg)
            }
            other => warn!("[{}] Screening rejected: {}", request_id, other),
        }
        fail(e.into())
    })?;

    let processing_time_ms = started.elapsed().as_millis() as u64;

    info!(
        "[{}] Screening complete: is_nerve={}, nerve_p={:.3}, cdr={:?}, risk={:?}, {}ms",
        request_id,
        result.is_nerve,
        result.nerve_probability,
        result.cdr_prediction,
        result.risk_tier,
        processing_time_ms
    );

    Ok((
        [(
            HeaderName::from_static(PROCESSING_TIME_HEADER),
            HeaderValue::from(processing_time_ms),
        )],
        Json(PredictResponse::from(result)),
    ))
}
