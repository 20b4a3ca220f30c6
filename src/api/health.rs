// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Health / status endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use super::http_server::AppState;
use crate::screening::{ModelDescriptor, ModelSlot};
use crate::version::VERSION_NUMBER;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `ready`, `loading` or `degraded`
    pub status: &'static str,
    pub models_loaded: bool,
    pub message: String,
    pub version: &'static str,
    pub models: Vec<ModelDescriptor>,
}

impl HealthResponse {
    pub fn from_slot(slot: &ModelSlot) -> Self {
        let (message, models) = match slot {
            ModelSlot::Ready(bundle) => (
                "Glaucoma screening service is running".to_string(),
                bundle.describe(),
            ),
            ModelSlot::Loading => ("Models are still loading".to_string(), Vec::new()),
            ModelSlot::Failed(reason) => (
                format!("Models failed to load: {}", reason),
                Vec::new(),
            ),
        };

        Self {
            status: slot.status_label(),
            models_loaded: slot.is_ready(),
            message,
            version: VERSION_NUMBER,
            models,
        }
    }
}

/// GET / and GET /health
///
/// Always 200; the model lifecycle is reported in `status`.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let slot = state.model_slot().await;
    Json(HealthResponse::from_slot(&slot))
}
