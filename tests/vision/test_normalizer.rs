// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Image normalizer tests
//!
//! Verifies that encoded uploads become `[1, H, W, 3]` tensors with finite
//! values in the configured range, and that bad input is rejected without
//! panicking.

use glaucoma_screen::vision::{
    ImageError, ImageNormalizer, PixelScaling, ResizeFilter, MAX_IMAGE_SIZE,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

fn encode(img: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, format)
        .unwrap();
    buffer.into_inner()
}

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
    })
}

#[cfg(test)]
mod normalizer_tests {
    use super::*;

    // =============================================================================
    // Valid Uploads
    // =============================================================================

    /// Test 1: JPEG and PNG of various sizes normalize to the model geometry
    #[test]
    fn test_shape_for_valid_uploads() {
        let normalizer = ImageNormalizer::default();

        for (width, height) in [(100, 100), (224, 224), (640, 480), (150, 900)] {
            for format in [ImageFormat::Jpeg, ImageFormat::Png] {
                let bytes = encode(gradient(width, height), format);
                let (tensor, info) = normalizer.normalize_bytes(&bytes).unwrap();

                assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
                assert_eq!((info.width, info.height), (width, height));
                assert_eq!(info.format, format);
            }
        }
    }

    /// Test 2: Values stay finite and within the scaling range
    #[test]
    fn test_values_in_range_for_all_scalings() {
        let bytes = encode(gradient(320, 240), ImageFormat::Png);

        for scaling in [
            PixelScaling::Unit,
            PixelScaling::Symmetric,
            PixelScaling::Imagenet,
        ] {
            let normalizer = ImageNormalizer::new(224, scaling, ResizeFilter::Bicubic);
            let (tensor, _) = normalizer.normalize_bytes(&bytes).unwrap();
            let (lo, hi) = scaling.value_range();

            assert!(tensor
                .as_array()
                .iter()
                .all(|v| v.is_finite() && *v >= lo - 1e-3 && *v <= hi + 1e-3));
        }
    }

    /// Test 3: Custom input size is honoured
    #[test]
    fn test_custom_input_size() {
        let bytes = encode(gradient(300, 300), ImageFormat::Jpeg);
        let normalizer = ImageNormalizer::new(160, PixelScaling::Unit, ResizeFilter::Nearest);

        let (tensor, _) = normalizer.normalize_bytes(&bytes).unwrap();
        assert_eq!(tensor.shape(), &[1, 160, 160, 3]);
    }

    /// Test 4: Normalizing the same bytes twice is bit-identical
    #[test]
    fn test_deterministic() {
        let bytes = encode(gradient(257, 199), ImageFormat::Jpeg);
        let normalizer = ImageNormalizer::default();

        let (a, _) = normalizer.normalize_bytes(&bytes).unwrap();
        let (b, _) = normalizer.normalize_bytes(&bytes).unwrap();
        assert_eq!(a, b);
    }

    // =============================================================================
    // Invalid Uploads
    // =============================================================================

    /// Test 5: Non-image bytes are an input error, not a panic
    #[test]
    fn test_non_image_bytes() {
        let normalizer = ImageNormalizer::default();

        for bytes in [
            b"hello world".to_vec(),
            b"%PDF-1.7 not an image".to_vec(),
            vec![0u8; 2048],
            vec![0xFF, 0xD8, 0xFF],
        ] {
            assert!(normalizer.normalize_bytes(&bytes).is_err());
        }
    }

    /// Test 6: JPEG cut off inside its header fails to decode
    #[test]
    fn test_truncated_jpeg() {
        let bytes = encode(gradient(200, 200), ImageFormat::Jpeg);
        let truncated = &bytes[..16];

        let err = ImageNormalizer::default()
            .normalize_bytes(truncated)
            .unwrap_err();
        assert!(matches!(err, ImageError::DecodeFailed(_)));
    }

    /// Test 7: GIF is not an accepted format
    #[test]
    fn test_gif_rejected() {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(gradient(120, 120))
            .write_to(&mut buffer, ImageFormat::Gif)
            .unwrap();

        let err = ImageNormalizer::default()
            .normalize_bytes(&buffer.into_inner())
            .unwrap_err();
        assert_eq!(err, ImageError::UnsupportedFormat);
    }

    /// Test 8: Oversized upload is rejected before decoding
    #[test]
    fn test_too_large() {
        let bytes = encode(gradient(200, 200), ImageFormat::Png);
        let normalizer = ImageNormalizer::default().with_max_bytes(64);

        let err = normalizer.normalize_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ImageError::TooLarge(_, 64)));
        assert_eq!(ImageNormalizer::default().max_bytes(), MAX_IMAGE_SIZE);
    }

    /// Test 9: Image below the minimum dimension is rejected
    #[test]
    fn test_too_small() {
        let bytes = encode(gradient(99, 400), ImageFormat::Png);

        let err = ImageNormalizer::default()
            .normalize_bytes(&bytes)
            .unwrap_err();
        assert!(matches!(err, ImageError::TooSmall { width: 99, .. }));
    }

    /// Test 10: Empty upload
    #[test]
    fn test_empty() {
        let err = ImageNormalizer::default().normalize_bytes(&[]).unwrap_err();
        assert_eq!(err, ImageError::EmptyData);
    }
}
