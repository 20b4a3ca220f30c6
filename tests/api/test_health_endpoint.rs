// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Health endpoint tests for GET / and GET /health
//!
//! The route always answers 200 and reports the model lifecycle in `status`.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use glaucoma_screen::{
    api::{create_app, AppState},
    config::ServiceConfig,
    screening::ModelBundle,
    version::VERSION_NUMBER,
};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

use super::support::{body_json, ready_state, FixedModel};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[cfg(test)]
mod health_endpoint_tests {
    use super::*;

    /// Test 1: Loading state reports models_loaded=false
    #[tokio::test]
    async fn test_health_while_loading() {
        let app = create_app(AppState::new(ServiceConfig::default()));

        let response = app.oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "loading");
        assert_eq!(json["models_loaded"], false);
        assert_eq!(json["version"], VERSION_NUMBER);
        assert!(json["models"].as_array().unwrap().is_empty());
    }

    /// Test 2: Ready state lists both models
    #[tokio::test]
    async fn test_health_when_ready() {
        let (state, _calls) = ready_state(0.1, 0.3);
        let app = create_app(state);

        let response = app.oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ready");
        assert_eq!(json["models_loaded"], true);

        let models = json["models"].as_array().unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0]["role"], "gate");
        assert_eq!(models[0]["name"], "gate.onnx");
        assert_eq!(models[1]["role"], "scorer");
    }

    /// Test 3: Failed load reports degraded with the reason
    #[tokio::test]
    async fn test_health_when_degraded() {
        let state = AppState::new(ServiceConfig::default());
        state.mark_failed("checksum mismatch").await;
        let app = create_app(state);

        let response = app.oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["models_loaded"], false);
        assert!(json["message"]
            .as_str()
            .unwrap()
            .contains("checksum mismatch"));
    }

    /// Test 4: Root path serves the same status
    #[tokio::test]
    async fn test_root_serves_health() {
        let (state, _calls) = ready_state(0.1, 0.3);
        let app = create_app(state);

        let response = app.oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ready");
    }

    /// Test 5: The bundle is installed once; later installs and failures are ignored
    #[tokio::test]
    async fn test_bundle_installed_once() {
        let state = AppState::new(ServiceConfig::default());

        let (gate, _) = FixedModel::new("first-gate.onnx", 0.1);
        let (scorer, _) = FixedModel::new("first-scorer.onnx", 0.1);
        assert!(
            state
                .install_bundle(ModelBundle::new(Arc::new(gate), Arc::new(scorer)))
                .await
        );

        let (gate, _) = FixedModel::new("second-gate.onnx", 0.1);
        let (scorer, _) = FixedModel::new("second-scorer.onnx", 0.1);
        assert!(
            !state
                .install_bundle(ModelBundle::new(Arc::new(gate), Arc::new(scorer)))
                .await
        );

        state.mark_failed("late failure").await;

        let bundle = state.current_bundle().await.unwrap();
        assert_eq!(bundle.gate().name(), "first-gate.onnx");
        assert!(state.model_slot().await.is_ready());
    }
}
