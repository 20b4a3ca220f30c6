// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Single-output ONNX models
//!
//! Both screening stages take the normalized fundus tensor and emit one
//! scalar: the gate a probability, the scorer a cup-to-disc ratio.

use anyhow::{Context, Result};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::vision::NormalizedTensor;

/// Default ONNX Runtime intra-op thread count
pub const DEFAULT_INTRA_THREADS: usize = 4;

/// A model mapping a normalized image to a single score
pub trait ScalarModel: Send + Sync {
    /// Short human-readable name (usually the model file name)
    fn name(&self) -> &str;

    /// Run the model and return the first element of its first output
    fn predict(&self, input: &NormalizedTensor) -> Result<f32>;
}

/// ONNX Runtime backed [`ScalarModel`]
///
/// Runs on CPU. The session sits behind a mutex since `Session::run`
/// needs exclusive access.
#[derive(Clone)]
pub struct OnnxScalarModel {
    name: String,
    session: Arc<Mutex<Session>>,
    input_name: String,
}

impl std::fmt::Debug for OnnxScalarModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxScalarModel")
            .field("name", &self.name)
            .field("input_name", &self.input_name)
            .finish_non_exhaustive()
    }
}

impl OnnxScalarModel {
    /// Load a model from an `.onnx` file
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - ONNX Runtime initialization fails
    pub fn load<P: AsRef<Path>>(model_path: P, intra_threads: usize) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Model file not found: {}", model_path.display());
        }

        info!("Loading ONNX model from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(intra_threads.max(1))
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!("Failed to load model from {}", model_path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("Model declares no inputs")?;

        if session.outputs.is_empty() {
            anyhow::bail!("Model declares no outputs: {}", model_path.display());
        }

        if let Some(input) = session.inputs.first() {
            debug!("Model input '{}' type: {:?}", input_name, input.input_type);
        }

        let name = model_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| model_path.display().to_string());

        info!("✅ Model {} loaded (CPU-only)", name);

        Ok(Self {
            name,
            session: Arc::new(Mutex::new(session)),
            input_name,
        })
    }
}

impl ScalarModel for OnnxScalarModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, input: &NormalizedTensor) -> Result<f32> {
        let input_value = Value::from_array(input.as_array().to_owned())
            .context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("Session lock poisoned for {}", self.name))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context(format!("Inference failed for {}", self.name))?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        let score = output
            .iter()
            .next()
            .copied()
            .context(format!("Empty output tensor from {}", self.name))?;

        debug!("{} output shape {:?}, score {:.4}", self.name, output.shape(), score);

        Ok(score)
    }
}
