// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image loading and validation for fundus uploads

use image::{DynamicImage, ImageFormat};
use thiserror::Error;

/// Default maximum upload size (10MB)
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Content types accepted on the upload field
pub const SUPPORTED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];

/// Errors raised while turning an upload into model input.
///
/// Every variant is a caller mistake, never a server fault.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ImageError {
    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Unsupported image format (expected JPEG or PNG)")]
    UnsupportedFormat,

    #[error("Unsupported content type '{0}' (expected image/jpeg or image/png)")]
    UnsupportedContentType(String),

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,

    #[error("Image too small: {width}x{height}, minimum {min}x{min}")]
    TooSmall { width: u32, height: u32, min: u32 },

    #[error("Image contains non-finite values after normalization")]
    NonFinite,
}

/// Image information extracted during loading
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Detected format
    pub format: ImageFormat,
    /// Size in bytes
    pub size_bytes: usize,
}

/// Decode raw image bytes from a multipart upload
///
/// # Arguments
/// * `bytes` - Raw image bytes
/// * `max_bytes` - Upper bound on the encoded size
///
/// # Returns
/// * `Ok((DynamicImage, ImageInfo))` - The decoded image and metadata
/// * `Err(ImageError)` - If the data is empty, oversized, not JPEG/PNG, or corrupt
pub fn decode_image_bytes(
    bytes: &[u8],
    max_bytes: usize,
) -> Result<(DynamicImage, ImageInfo), ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    if bytes.len() > max_bytes {
        return Err(ImageError::TooLarge(bytes.len(), max_bytes));
    }

    // Trust magic bytes, not the file name or declared type
    let format = detect_format(bytes)?;

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;

    let info = ImageInfo {
        width: img.width(),
        height: img.height(),
        format,
        size_bytes: bytes.len(),
    };

    Ok((img, info))
}

/// Detect image format from magic bytes
///
/// Only JPEG and PNG are accepted; the deployed models were trained on those.
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        _ => Err(ImageError::UnsupportedFormat),
    }
}

/// Check the content type declared on the multipart field.
///
/// Browsers sometimes omit it or send `application/octet-stream`; those are
/// let through and the magic bytes decide.
pub fn validate_content_type(declared: Option<&str>) -> Result<(), ImageError> {
    let Some(raw) = declared else {
        return Ok(());
    };

    let essence = raw
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence.is_empty()
        || essence == "application/octet-stream"
        || SUPPORTED_CONTENT_TYPES.contains(&essence.as_str())
    {
        Ok(())
    } else {
        Err(ImageError::UnsupportedContentType(raw.to_string()))
    }
}
