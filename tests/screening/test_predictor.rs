// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Two-stage predictor tests
//!
//! Verifies gate/scorer sequencing, threshold boundaries, output clamping and
//! non-finite handling using mocked models.

use glaucoma_screen::{
    screening::{
        GatePolarity, ModelBundle, RiskTier, ScalarModel, ScreeningError, ScreeningThresholds,
        TwoStagePredictor,
    },
    vision::{ImageNormalizer, NormalizedTensor},
};
use image::DynamicImage;
use mockall::mock;
use std::sync::Arc;

mock! {
    pub Model {}

    impl ScalarModel for Model {
        fn name(&self) -> &str;
        fn predict(&self, input: &NormalizedTensor) -> anyhow::Result<f32>;
    }
}

fn tensor() -> NormalizedTensor {
    ImageNormalizer::default()
        .normalize_image(&DynamicImage::new_rgb8(224, 224))
        .unwrap()
}

fn gate_returning(raw: f32) -> MockModel {
    let mut gate = MockModel::new();
    gate.expect_predict().times(1).returning(move |_| Ok(raw));
    gate
}

fn scorer_returning(cdr: f32) -> MockModel {
    let mut scorer = MockModel::new();
    scorer.expect_predict().times(1).returning(move |_| Ok(cdr));
    scorer
}

fn scorer_never_called() -> MockModel {
    let mut scorer = MockModel::new();
    scorer.expect_predict().never();
    scorer
}

fn predictor(gate: MockModel, scorer: MockModel, thresholds: ScreeningThresholds) -> TwoStagePredictor {
    let bundle = ModelBundle::new(Arc::new(gate), Arc::new(scorer));
    TwoStagePredictor::new(Arc::new(bundle), thresholds)
}

fn positive_polarity() -> ScreeningThresholds {
    ScreeningThresholds {
        gate_polarity: GatePolarity::NervePositive,
        ..Default::default()
    }
}

#[cfg(test)]
mod predictor_tests {
    use super::*;

    // =============================================================================
    // Gate Sequencing
    // =============================================================================

    /// Test 1: Gate below threshold never invokes the scorer
    #[test]
    fn test_gate_rejects_without_scoring() {
        let p = predictor(gate_returning(0.2), scorer_never_called(), positive_polarity());

        let result = p.predict(&tensor()).unwrap();

        assert!(!result.is_nerve);
        assert!((result.nerve_probability - 0.2).abs() < 1e-6);
        assert_eq!(result.cdr_prediction, None);
        assert_eq!(result.glaucoma_suspected, None);
        assert_eq!(result.risk_tier, None);
    }

    /// Test 2: Gate above threshold invokes the scorer exactly once
    #[test]
    fn test_gate_passes_scores_once() {
        let p = predictor(gate_returning(0.9), scorer_returning(0.42), positive_polarity());

        let result = p.predict(&tensor()).unwrap();

        assert!(result.is_nerve);
        let cdr = result.cdr_prediction.unwrap();
        assert!(cdr.is_finite() && (0.0..=1.0).contains(&cdr));
        assert_eq!(result.glaucoma_suspected, Some(false));
        assert_eq!(result.risk_tier, Some(RiskTier::Low));
    }

    /// Test 3: Default negative polarity inverts the gate output
    #[test]
    fn test_negative_polarity_inverts_gate() {
        // Raw 0.3 = 30% "not a nerve" -> 70% nerve
        let p = predictor(
            gate_returning(0.3),
            scorer_returning(0.7),
            ScreeningThresholds::default(),
        );

        let result = p.predict(&tensor()).unwrap();

        assert!(result.is_nerve);
        assert!((result.nerve_probability - 0.7).abs() < 1e-6);
        assert_eq!(result.glaucoma_suspected, Some(true));
        assert_eq!(result.risk_tier, Some(RiskTier::High));
    }

    /// Test 4: Negative polarity rejects a confident "not a nerve"
    #[test]
    fn test_negative_polarity_rejects() {
        let p = predictor(
            gate_returning(0.8),
            scorer_never_called(),
            ScreeningThresholds::default(),
        );

        let result = p.predict(&tensor()).unwrap();
        assert!(!result.is_nerve);
    }

    // =============================================================================
    // Threshold Boundaries (all comparisons are >=)
    // =============================================================================

    /// Test 5: Gate score exactly at the threshold passes
    #[test]
    fn test_gate_boundary_passes() {
        let p = predictor(gate_returning(0.5), scorer_returning(0.1), positive_polarity());

        let result = p.predict(&tensor()).unwrap();
        assert!(result.is_nerve);
    }

    /// Test 6: CDR exactly at the threshold is suspected and high risk
    #[test]
    fn test_cdr_boundary_suspected() {
        let p = predictor(gate_returning(0.9), scorer_returning(0.65), positive_polarity());

        let result = p.predict(&tensor()).unwrap();
        assert_eq!(result.glaucoma_suspected, Some(true));
        assert_eq!(result.risk_tier, Some(RiskTier::High));
    }

    /// Test 7: CDR exactly at the moderate threshold is moderate risk
    #[test]
    fn test_moderate_boundary() {
        let p = predictor(gate_returning(0.9), scorer_returning(0.5), positive_polarity());

        let result = p.predict(&tensor()).unwrap();
        assert_eq!(result.glaucoma_suspected, Some(false));
        assert_eq!(result.risk_tier, Some(RiskTier::Moderate));
    }

    /// Test 8: Default polarity: raw gate output 0.5 resolves to a nerve
    #[test]
    fn test_default_polarity_boundary_is_nerve() {
        let p = predictor(
            gate_returning(0.5),
            scorer_returning(0.3),
            ScreeningThresholds::default(),
        );

        let result = p.predict(&tensor()).unwrap();
        assert_eq!(result.nerve_probability, 0.5);
        assert!(result.is_nerve);
        assert_eq!(result.cdr_prediction, Some(0.3));
        assert_eq!(result.risk_tier, Some(RiskTier::Low));
    }

    /// Test 9: Default polarity: raw gate output above 0.5 is not a nerve
    #[test]
    fn test_default_polarity_above_boundary_rejects() {
        let p = predictor(
            gate_returning(0.51),
            scorer_never_called(),
            ScreeningThresholds::default(),
        );

        let result = p.predict(&tensor()).unwrap();
        assert!(!result.is_nerve);
        assert!((result.nerve_probability - 0.49).abs() < 1e-6);
        assert_eq!(result.cdr_prediction, None);
    }

    /// Test 10: Custom thresholds are honoured
    #[test]
    fn test_custom_thresholds() {
        let thresholds = ScreeningThresholds {
            gate_threshold: 0.8,
            gate_polarity: GatePolarity::NervePositive,
            cdr_threshold: 0.5,
            cdr_moderate_threshold: 0.3,
        };
        let p = predictor(gate_returning(0.75), scorer_never_called(), thresholds);

        let result = p.predict(&tensor()).unwrap();
        assert!(!result.is_nerve);
    }

    // =============================================================================
    // Output Sanitizing
    // =============================================================================

    /// Test 11: CDR above 1 is clamped
    #[test]
    fn test_cdr_clamped_high() {
        let p = predictor(gate_returning(0.9), scorer_returning(1.4), positive_polarity());

        let result = p.predict(&tensor()).unwrap();
        assert_eq!(result.cdr_prediction, Some(1.0));
        assert_eq!(result.risk_tier, Some(RiskTier::High));
    }

    /// Test 12: Negative CDR is clamped to 0
    #[test]
    fn test_cdr_clamped_low() {
        let p = predictor(gate_returning(0.9), scorer_returning(-0.2), positive_polarity());

        let result = p.predict(&tensor()).unwrap();
        assert_eq!(result.cdr_prediction, Some(0.0));
        assert_eq!(result.risk_tier, Some(RiskTier::Low));
    }

    /// Test 13: NaN from the gate is an inference error and skips scoring
    #[test]
    fn test_nan_gate_is_error() {
        let p = predictor(gate_returning(f32::NAN), scorer_never_called(), positive_polarity());

        let err = p.predict(&tensor()).unwrap_err();
        assert!(matches!(err, ScreeningError::Inference(_)));
    }

    /// Test 14: Infinite CDR is an inference error
    #[test]
    fn test_infinite_cdr_is_error() {
        let p = predictor(
            gate_returning(0.9),
            scorer_returning(f32::INFINITY),
            positive_polarity(),
        );

        let err = p.predict(&tensor()).unwrap_err();
        assert!(matches!(err, ScreeningError::Inference(_)));
    }

    /// Test 15: Model errors surface as inference errors
    #[test]
    fn test_model_error_is_inference_error() {
        let mut gate = MockModel::new();
        gate.expect_predict()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("session run failed")));
        let p = predictor(gate, scorer_never_called(), positive_polarity());

        let err = p.predict(&tensor()).unwrap_err();
        match err {
            ScreeningError::Inference(msg) => assert!(msg.contains("session run failed")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
