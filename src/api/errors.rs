// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::screening::ScreeningError;
use crate::vision::ImageError;

/// JSON body of every error response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    NotFound(String),
    InvalidRequest(String),
    PayloadTooLarge(String),
    ServiceUnavailable(String),
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self, request_id: String) -> ErrorResponse {
        let (error_type, message) = match self {
            ApiError::NotFound(msg) => ("not_found", msg),
            ApiError::InvalidRequest(msg) => ("invalid_request", msg),
            ApiError::PayloadTooLarge(msg) => ("payload_too_large", msg),
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg),
            ApiError::InternalError(msg) => ("internal_error", msg),
        };

        ErrorResponse {
            error: message.clone(),
            error_type: error_type.to_string(),
            request_id,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::InvalidRequest(_) => 400,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::InternalError(_) => 500,
        }
    }

    /// Attach the id of the request that failed
    pub fn with_request_id(self, request_id: impl Into<String>) -> ApiErrorResponse {
        ApiErrorResponse {
            error: self,
            request_id: request_id.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::TooLarge(..) => ApiError::PayloadTooLarge(err.to_string()),
            other => ApiError::InvalidRequest(format!("Invalid image: {}", other)),
        }
    }
}

impl From<ScreeningError> for ApiError {
    fn from(err: ScreeningError) -> Self {
        match err {
            ScreeningError::InvalidImage(e) => e.into(),
            ScreeningError::ModelsUnavailable(msg) => ApiError::ServiceUnavailable(msg),
            ScreeningError::Inference(msg) => {
                ApiError::InternalError(format!("Prediction failed: {}", msg))
            }
        }
    }
}

/// An [`ApiError`] bound to a request id
#[derive(Debug, Clone)]
pub struct ApiErrorResponse {
    pub error: ApiError,
    pub request_id: String,
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = self.error.to_response(self.request_id);

        (status, Json(body)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.with_request_id(Uuid::new_v4().to_string())
            .into_response()
    }
}
