// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multipart upload extraction

use axum::http::StatusCode;
use axum_extra::extract::multipart::{Multipart, MultipartError};
use bytes::Bytes;
use tracing::debug;

use crate::api::errors::ApiError;
use crate::vision::validate_content_type;

/// Form fields that may carry the image; the first one present wins
pub const IMAGE_FIELD_NAMES: &[&str] = &["image", "file"];

/// Image file taken from a multipart form
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
    pub field_name: String,
}

impl UploadedImage {
    /// Reject declared content types other than JPEG/PNG
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_content_type(self.content_type.as_deref()).map_err(ApiError::from)?;

        if self.bytes.is_empty() {
            return Err(ApiError::InvalidRequest(format!(
                "Uploaded field '{}' is empty",
                self.field_name
            )));
        }

        Ok(())
    }
}

/// Pull the first `image`/`file` field out of the form, skipping others
pub async fn read_upload(multipart: &mut Multipart) -> Result<UploadedImage, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or_default().to_string();

        if !IMAGE_FIELD_NAMES.contains(&field_name.as_str()) {
            debug!("Skipping multipart field '{}'", field_name);
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        debug!(
            "Received '{}' ({:?}, {:?}): {} bytes",
            field_name,
            file_name,
            content_type,
            bytes.len()
        );

        return Ok(UploadedImage {
            bytes,
            content_type,
            file_name,
            field_name,
        });
    }

    Err(ApiError::InvalidRequest(
        "No image uploaded: expected multipart field 'image' or 'file'".to_string(),
    ))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(format!("Upload exceeds size limit: {}", err.body_text()))
    } else {
        ApiError::InvalidRequest(format!("Malformed multipart body: {}", err.body_text()))
    }
}
