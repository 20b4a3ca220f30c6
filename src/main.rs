// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use glaucoma_screen::{
    api::{start_server, AppState},
    config::ServiceConfig,
    screening::load_model_bundle,
    version,
};
use std::env;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::parse();
    config.validate().context("Invalid configuration")?;

    info!("🚀 Starting glaucoma screening service {}", version::get_version_string());
    info!(
        "Models: {} / {} from {} ({})",
        config.gate_model_file, config.score_model_file, config.model_repo, config.model_revision
    );
    info!(
        "Thresholds: gate={} ({:?}), cdr={}, moderate={}",
        config.gate_threshold,
        config.gate_polarity,
        config.cdr_threshold,
        config.cdr_moderate_threshold
    );

    // Serve immediately; models arrive in the background
    let state = AppState::new(config);
    let loader_state = state.clone();

    tokio::spawn(async move {
        info!("🧠 Loading screening models...");
        match load_model_bundle(&loader_state.config).await {
            Ok(bundle) => {
                loader_state.install_bundle(bundle).await;
                info!("✅ Models loaded, service ready");
            }
            Err(e) => {
                error!("❌ Failed to load models: {:#}", e);
                if loader_state.config.exit_on_model_failure {
                    error!("Exiting because exit_on_model_failure is set");
                    std::process::exit(1);
                }
                loader_state.mark_failed(format!("{:#}", e)).await;
                warn!("⚠️ Running in degraded mode: predictions will return 503");
            }
        }
    });

    start_server(state).await
}
