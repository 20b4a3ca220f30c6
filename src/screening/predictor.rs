// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Two-stage screening: optic-nerve gate, then cup-to-disc scoring

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::bundle::ModelBundle;
use crate::vision::{ImageError, NormalizedTensor};

pub const DEFAULT_GATE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_CDR_THRESHOLD: f32 = 0.65;
pub const DEFAULT_CDR_MODERATE_THRESHOLD: f32 = 0.5;

/// What the gating model's raw output measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GatePolarity {
    /// Output is the probability that the image shows an optic nerve
    NervePositive,
    /// Output is the probability that it does not
    #[default]
    NerveNegative,
}

impl GatePolarity {
    /// Convert a raw gate output into a nerve probability
    pub fn nerve_probability(self, raw: f32) -> f32 {
        match self {
            GatePolarity::NervePositive => raw,
            GatePolarity::NerveNegative => 1.0 - raw,
        }
    }
}

/// Coarse risk bucket derived from the CDR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

/// Decision thresholds. Every comparison is `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreeningThresholds {
    pub gate_threshold: f32,
    pub gate_polarity: GatePolarity,
    pub cdr_threshold: f32,
    pub cdr_moderate_threshold: f32,
}

impl Default for ScreeningThresholds {
    fn default() -> Self {
        Self {
            gate_threshold: DEFAULT_GATE_THRESHOLD,
            gate_polarity: GatePolarity::default(),
            cdr_threshold: DEFAULT_CDR_THRESHOLD,
            cdr_moderate_threshold: DEFAULT_CDR_MODERATE_THRESHOLD,
        }
    }
}

impl ScreeningThresholds {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("gate_threshold", self.gate_threshold),
            ("cdr_threshold", self.cdr_threshold),
            ("cdr_moderate_threshold", self.cdr_moderate_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be within [0, 1], got {}", name, value);
            }
        }

        if self.cdr_moderate_threshold > self.cdr_threshold {
            anyhow::bail!(
                "cdr_moderate_threshold ({}) must not exceed cdr_threshold ({})",
                self.cdr_moderate_threshold,
                self.cdr_threshold
            );
        }

        Ok(())
    }

    pub fn risk_tier(&self, cdr: f32) -> RiskTier {
        if cdr >= self.cdr_threshold {
            RiskTier::High
        } else if cdr >= self.cdr_moderate_threshold {
            RiskTier::Moderate
        } else {
            RiskTier::Low
        }
    }
}

/// Per-request screening verdict
///
/// The CDR fields are `None` when the gate rejected the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub is_nerve: bool,
    pub nerve_probability: f32,
    pub cdr_prediction: Option<f32>,
    pub glaucoma_suspected: Option<bool>,
    pub risk_tier: Option<RiskTier>,
}

#[derive(Debug, Error)]
pub enum ScreeningError {
    #[error(transparent)]
    InvalidImage(#[from] ImageError),

    #[error("Models unavailable: {0}")]
    ModelsUnavailable(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Runs the gate and, only when it passes, the CDR scorer
#[derive(Clone)]
pub struct TwoStagePredictor {
    bundle: Arc<ModelBundle>,
    thresholds: ScreeningThresholds,
}

impl TwoStagePredictor {
    pub fn new(bundle: Arc<ModelBundle>, thresholds: ScreeningThresholds) -> Self {
        Self { bundle, thresholds }
    }

    pub fn thresholds(&self) -> &ScreeningThresholds {
        &self.thresholds
    }

    pub fn predict(&self, input: &NormalizedTensor) -> Result<InferenceResult, ScreeningError> {
        let raw_gate = self
            .bundle
            .gate()
            .predict(input)
            .map_err(|e| ScreeningError::Inference(format!("gating model: {:#}", e)))?;

        if !raw_gate.is_finite() {
            return Err(ScreeningError::Inference(format!(
                "gating model returned non-finite output {}",
                raw_gate
            )));
        }

        let nerve_probability = clamp_unit(
            "gate",
            self.thresholds.gate_polarity.nerve_probability(raw_gate),
        );
        let is_nerve = nerve_probability >= self.thresholds.gate_threshold;

        debug!(
            "Gate raw={:.4} nerve_probability={:.4} is_nerve={}",
            raw_gate, nerve_probability, is_nerve
        );

        if !is_nerve {
            return Ok(InferenceResult {
                is_nerve: false,
                nerve_probability,
                cdr_prediction: None,
                glaucoma_suspected: None,
                risk_tier: None,
            });
        }

        let raw_cdr = self
            .bundle
            .scorer()
            .predict(input)
            .map_err(|e| ScreeningError::Inference(format!("scoring model: {:#}", e)))?;

        if !raw_cdr.is_finite() {
            return Err(ScreeningError::Inference(format!(
                "scoring model returned non-finite output {}",
                raw_cdr
            )));
        }

        let cdr = clamp_unit("cdr", raw_cdr);

        Ok(InferenceResult {
            is_nerve: true,
            nerve_probability,
            cdr_prediction: Some(cdr),
            glaucoma_suspected: Some(cdr >= self.thresholds.cdr_threshold),
            risk_tier: Some(self.thresholds.risk_tier(cdr)),
        })
    }
}

fn clamp_unit(what: &str, value: f32) -> f32 {
    let clamped = value.clamp(0.0, 1.0);
    if clamped != value {
        warn!("{} output {} outside [0, 1], clamped to {}", what, value, clamped);
    }
    clamped
}
