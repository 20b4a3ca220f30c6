// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::errors::ApiError;
use super::health::health_handler;
use super::predict::predict_handler;
use crate::config::ServiceConfig;
use crate::screening::{ModelBundle, ModelSlot};
use crate::vision::ImageNormalizer;

/// Allowance on top of `max_upload_bytes` for multipart boundaries and headers
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub normalizer: Arc<ImageNormalizer>,
    model_slot: Arc<RwLock<ModelSlot>>,
}

impl AppState {
    /// State with models still loading
    pub fn new(config: ServiceConfig) -> Self {
        let normalizer = config.normalizer();
        Self {
            config: Arc::new(config),
            normalizer: Arc::new(normalizer),
            model_slot: Arc::new(RwLock::new(ModelSlot::Loading)),
        }
    }

    /// State with models already loaded
    pub fn with_bundle(config: ServiceConfig, bundle: ModelBundle) -> Self {
        let normalizer = config.normalizer();
        Self {
            config: Arc::new(config),
            normalizer: Arc::new(normalizer),
            model_slot: Arc::new(RwLock::new(ModelSlot::Ready(Arc::new(bundle)))),
        }
    }

    /// Install the loaded bundle. Only the first install takes effect.
    pub async fn install_bundle(&self, bundle: ModelBundle) -> bool {
        let mut slot = self.model_slot.write().await;
        if slot.is_ready() {
            warn!("Model bundle already installed, ignoring replacement");
            return false;
        }
        *slot = ModelSlot::Ready(Arc::new(bundle));
        true
    }

    /// Switch to degraded mode unless a bundle is already installed
    pub async fn mark_failed(&self, reason: impl Into<String>) {
        let mut slot = self.model_slot.write().await;
        if !slot.is_ready() {
            *slot = ModelSlot::Failed(reason.into());
        }
    }

    pub async fn model_slot(&self) -> ModelSlot {
        self.model_slot.read().await.clone()
    }

    pub async fn current_bundle(&self) -> Option<Arc<ModelBundle>> {
        self.model_slot.read().await.bundle()
    }
}

/// Build the router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    let routes = Router::new()
        // Health / status
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        // Prediction
        .route("/predict", post(predict_handler))
        .route("/analyze", post(predict_handler))
        .route("/analyze/", post(predict_handler))
        .fallback(not_found_handler)
        .with_state(state);

    with_middleware(routes, &config)
}

/// Wrap `router` in the body limit, panic catcher, tracing and CORS layers
pub fn with_middleware(router: Router, config: &ServiceConfig) -> Router {
    let body_limit = config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        // Outermost so panics and rejections still carry CORS headers
        .layer(cors_layer(config))
}

fn cors_layer(config: &ServiceConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(cors::Any)
        .allow_headers(cors::Any);

    if config.allows_any_origin() {
        return layer.allow_origin(cors::Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(origins)
}

async fn not_found_handler() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    error!("❌ Handler panicked: {}", detail);

    ApiError::InternalError("Internal server error".to_string()).into_response()
}

/// Bind the configured address and serve until Ctrl-C
pub async fn start_server(state: AppState) -> Result<()> {
    let addr = state.config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("🌐 API server listening on {}", listener.local_addr()?);

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
