// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Startup model loading

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use super::bundle::ModelBundle;
use crate::config::ServiceConfig;
use crate::registry::{ModelFetcher, ModelSource};

/// Resolve both model files and load them into a [`ModelBundle`]
///
/// A configured local path wins over the registry. Downloads go through the
/// configured retry policy; ONNX session creation runs on the blocking pool.
pub async fn load_model_bundle(config: &ServiceConfig) -> Result<ModelBundle> {
    let fetcher = ModelFetcher::new(
        config.model_registry_url.clone(),
        config.model_cache_dir.clone(),
        config.retry_policy(),
        config.download_timeout(),
    )?;

    let gate_path = resolve_model_file(
        &fetcher,
        config.gate_model_path.as_ref(),
        &config.gate_source(),
    )
    .await
    .context("Failed to obtain gating model")?;

    let score_path = resolve_model_file(
        &fetcher,
        config.score_model_path.as_ref(),
        &config.score_source(),
    )
    .await
    .context("Failed to obtain scoring model")?;

    let intra_threads = config.ort_intra_threads;
    let bundle = tokio::task::spawn_blocking(move || {
        ModelBundle::load_onnx(&gate_path, &score_path, intra_threads)
    })
    .await
    .context("Model loading task panicked")??;

    info!(
        "✅ Model bundle ready: gate={}, scorer={}",
        bundle.gate().name(),
        bundle.scorer().name()
    );

    Ok(bundle)
}

async fn resolve_model_file(
    fetcher: &ModelFetcher,
    local_path: Option<&PathBuf>,
    source: &ModelSource,
) -> Result<PathBuf> {
    if let Some(path) = local_path {
        if !path.exists() {
            anyhow::bail!("Configured model path does not exist: {}", path.display());
        }
        info!("Using local model {}", path.display());
        return Ok(path.clone());
    }

    Ok(fetcher.fetch(source).await?)
}
