// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Fundus image handling
//!
//! This module provides:
//! - Upload decoding and validation (JPEG/PNG only)
//! - Normalization into the `[1, H, W, 3]` tensor both models consume

pub mod image_utils;
pub mod preprocessing;

pub use image_utils::{
    decode_image_bytes, detect_format, validate_content_type, ImageError, ImageInfo,
    MAX_IMAGE_SIZE,
};
pub use preprocessing::{
    ImageNormalizer, NormalizedTensor, PixelScaling, ResizeFilter, DEFAULT_INPUT_SIZE,
    DEFAULT_MIN_DIMENSION,
};
