// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction response type

use serde::{Deserialize, Serialize};

use crate::screening::{InferenceResult, RiskTier};

/// Header carrying the server-side processing time in milliseconds
pub const PROCESSING_TIME_HEADER: &str = "x-processing-time-ms";

/// Response from POST /predict
///
/// `cdr_prediction`, `glaucoma_suspected` and `risk_tier` are `null` when the
/// image was not recognised as an optic nerve. The body depends only on the
/// image and the models; timing goes in [`PROCESSING_TIME_HEADER`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub is_nerve: bool,
    pub nerve_probability: f32,
    pub cdr_prediction: Option<f32>,
    pub glaucoma_suspected: Option<bool>,
    pub risk_tier: Option<RiskTier>,
}

impl From<InferenceResult> for PredictResponse {
    fn from(result: InferenceResult) -> Self {
        Self {
            is_nerve: result.is_nerve,
            nerve_probability: result.nerve_probability,
            cdr_prediction: result.cdr_prediction,
            glaucoma_suspected: result.glaucoma_suspected,
            risk_tier: result.risk_tier,
        }
    }
}
