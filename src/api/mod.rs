// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod health;
pub mod http_server;
pub mod predict;

pub use errors::{ApiError, ApiErrorResponse, ErrorResponse};
pub use health::{health_handler, HealthResponse};
pub use http_server::{
    create_app, start_server, with_middleware, AppState, MULTIPART_OVERHEAD_BYTES,
};
pub use predict::{predict_handler, PredictResponse, UploadedImage, PROCESSING_TIME_HEADER};
