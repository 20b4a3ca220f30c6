// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Screening API endpoint module
//!
//! Provides POST /predict and POST /analyze/ for multipart fundus uploads.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::predict_handler;
pub use request::{read_upload, UploadedImage, IMAGE_FIELD_NAMES};
pub use response::{PredictResponse, PROCESSING_TIME_HEADER};
