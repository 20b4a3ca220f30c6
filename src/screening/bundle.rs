// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Loaded model pair and its lifecycle slot

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use super::model::{OnnxScalarModel, ScalarModel};

/// Gating model plus scoring model, loaded together and never mutated
pub struct ModelBundle {
    gate: Arc<dyn ScalarModel>,
    scorer: Arc<dyn ScalarModel>,
    loaded_at: DateTime<Utc>,
}

impl std::fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBundle")
            .field("gate", &self.gate.name())
            .field("scorer", &self.scorer.name())
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

/// Public summary of one loaded model
#[derive(Debug, Clone, Serialize)]
pub struct ModelDescriptor {
    pub role: &'static str,
    pub name: String,
    pub loaded_at: DateTime<Utc>,
}

impl ModelBundle {
    pub fn new(gate: Arc<dyn ScalarModel>, scorer: Arc<dyn ScalarModel>) -> Self {
        Self {
            gate,
            scorer,
            loaded_at: Utc::now(),
        }
    }

    /// Load both ONNX models. Blocking; call from `spawn_blocking`.
    pub fn load_onnx(gate_path: &Path, score_path: &Path, intra_threads: usize) -> Result<Self> {
        let gate = OnnxScalarModel::load(gate_path, intra_threads)
            .context("Failed to load gating model")?;
        let scorer = OnnxScalarModel::load(score_path, intra_threads)
            .context("Failed to load scoring model")?;

        Ok(Self::new(Arc::new(gate), Arc::new(scorer)))
    }

    pub fn gate(&self) -> &dyn ScalarModel {
        self.gate.as_ref()
    }

    pub fn scorer(&self) -> &dyn ScalarModel {
        self.scorer.as_ref()
    }

    pub fn describe(&self) -> Vec<ModelDescriptor> {
        vec![
            ModelDescriptor {
                role: "gate",
                name: self.gate.name().to_string(),
                loaded_at: self.loaded_at,
            },
            ModelDescriptor {
                role: "scorer",
                name: self.scorer.name().to_string(),
                loaded_at: self.loaded_at,
            },
        ]
    }
}

/// Where the model bundle is in its startup lifecycle
#[derive(Debug, Clone)]
pub enum ModelSlot {
    Loading,
    Ready(Arc<ModelBundle>),
    Failed(String),
}

impl ModelSlot {
    pub fn bundle(&self) -> Option<Arc<ModelBundle>> {
        match self {
            ModelSlot::Ready(bundle) => Some(bundle.clone()),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ModelSlot::Ready(_))
    }

    /// Status label reported by the health route
    pub fn status_label(&self) -> &'static str {
        match self {
            ModelSlot::Loading => "loading",
            ModelSlot::Ready(_) => "ready",
            ModelSlot::Failed(_) => "degraded",
        }
    }
}
