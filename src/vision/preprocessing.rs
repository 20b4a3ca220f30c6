// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the screening models
//!
//! Both models share one input geometry, so a single normalized tensor is
//! produced per request and fed to each stage.

use clap::ValueEnum;
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use super::image_utils::{decode_image_bytes, ImageError, ImageInfo, MAX_IMAGE_SIZE};

/// Default square input size of the deployed models
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Default minimum accepted width/height of an upload
pub const DEFAULT_MIN_DIMENSION: u32 = 100;

/// Mean values for normalization (ImageNet)
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Std values for normalization (ImageNet)
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// How raw 0-255 channel values are mapped into model input space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PixelScaling {
    /// `v / 255` -> [0, 1]
    #[default]
    Unit,
    /// `v / 127.5 - 1` -> [-1, 1] (MobileNet preprocess)
    Symmetric,
    /// `(v / 255 - mean) / std` with ImageNet statistics
    Imagenet,
}

impl PixelScaling {
    /// Scale one channel value
    pub fn apply(self, value: u8, channel: usize) -> f32 {
        let v = value as f32;
        match self {
            PixelScaling::Unit => v / 255.0,
            PixelScaling::Symmetric => v / 127.5 - 1.0,
            PixelScaling::Imagenet => (v / 255.0 - MEAN[channel]) / STD[channel],
        }
    }

    /// Inclusive range every output value falls into
    pub fn value_range(self) -> (f32, f32) {
        match self {
            PixelScaling::Unit => (0.0, 1.0),
            PixelScaling::Symmetric => (-1.0, 1.0),
            // Widest channel bounds: (0 - 0.485) / 0.229 and (1 - 0.406) / 0.225
            PixelScaling::Imagenet => (-2.118, 2.641),
        }
    }
}

/// Resampling filter used when resizing to the model geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    Nearest,
    Bilinear,
    #[default]
    Bicubic,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
            ResizeFilter::Bicubic => FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Model-ready image tensor in NHWC layout `[1, H, W, 3]`.
///
/// Only [`ImageNormalizer`] constructs these, so holders can rely on the
/// shape and on every value being finite.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    data: Array4<f32>,
}

impl NormalizedTensor {
    /// Tensor shape as `[batch, height, width, channels]`
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.data
    }
}

/// Decodes uploads and produces [`NormalizedTensor`]s
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    input_size: u32,
    scaling: PixelScaling,
    filter: ResizeFilter,
    min_dimension: u32,
    max_bytes: usize,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            scaling: PixelScaling::default(),
            filter: ResizeFilter::default(),
            min_dimension: DEFAULT_MIN_DIMENSION,
            max_bytes: MAX_IMAGE_SIZE,
        }
    }
}

impl ImageNormalizer {
    pub fn new(input_size: u32, scaling: PixelScaling, filter: ResizeFilter) -> Self {
        Self {
            input_size,
            scaling,
            filter,
            ..Self::default()
        }
    }

    /// Set the minimum accepted width/height
    pub fn with_min_dimension(mut self, min_dimension: u32) -> Self {
        self.min_dimension = min_dimension;
        self
    }

    /// Set the maximum accepted encoded size
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    pub fn scaling(&self) -> PixelScaling {
        self.scaling
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Decode raw upload bytes and normalize them
    ///
    /// Steps:
    /// 1. Decode (JPEG/PNG only, size-limited)
    /// 2. Reject images below the minimum dimension
    /// 3. Convert to RGB and resize to `input_size x input_size`
    /// 4. Scale channel values and add the batch dimension
    pub fn normalize_bytes(&self, bytes: &[u8]) -> Result<(NormalizedTensor, ImageInfo), ImageError> {
        let (image, info) = decode_image_bytes(bytes, self.max_bytes)?;
        let tensor = self.normalize_image(&image)?;
        Ok((tensor, info))
    }

    /// Normalize an already decoded image
    pub fn normalize_image(&self, image: &DynamicImage) -> Result<NormalizedTensor, ImageError> {
        let (width, height) = (image.width(), image.height());
        if width < self.min_dimension || height < self.min_dimension {
            return Err(ImageError::TooSmall {
                width,
                height,
                min: self.min_dimension,
            });
        }

        // Exact resize: the models were trained on stretched, not padded, inputs
        let rgb = image
            .resize_exact(self.input_size, self.input_size, self.filter.into())
            .to_rgb8();

        let size = self.input_size as usize;
        let mut data = Array4::<f32>::zeros((1, size, size, 3));

        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                data[[0, y as usize, x as usize, c]] = self.scaling.apply(pixel[c], c);
            }
        }

        if data.iter().any(|v| !v.is_finite()) {
            return Err(ImageError::NonFinite);
        }

        Ok(NormalizedTensor { data })
    }
}
