// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Glaucoma screening
//!
//! A gating model first decides whether the image shows an optic nerve.
//! Only then does the scoring model estimate the cup-to-disc ratio, which is
//! turned into a suspicion flag and a risk tier.

pub mod bootstrap;
pub mod bundle;
pub mod model;
pub mod predictor;

pub use bootstrap::load_model_bundle;
pub use bundle::{ModelBundle, ModelDescriptor, ModelSlot};
pub use model::{OnnxScalarModel, ScalarModel, DEFAULT_INTRA_THREADS};
pub use predictor::{
    GatePolarity, InferenceResult, RiskTier, ScreeningError, ScreeningThresholds,
    TwoStagePredictor, DEFAULT_CDR_MODERATE_THRESHOLD, DEFAULT_CDR_THRESHOLD,
    DEFAULT_GATE_THRESHOLD,
};
