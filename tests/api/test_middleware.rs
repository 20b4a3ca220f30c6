// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Middleware stack tests
//!
//! Mounts handlers that panic outright, outside any blocking task, to check
//! that the panic catcher turns them into JSON 500s that keep CORS headers.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    routing::get,
    Router,
};
use glaucoma_screen::{api::with_middleware, config::ServiceConfig};
use tower::util::ServiceExt; // for `oneshot`

use super::support::body_json;

async fn exploding_handler() -> &'static str {
    panic!("handler exploded");
}

fn exploding_app(config: &ServiceConfig) -> Router {
    let routes = Router::new().route("/explode", get(exploding_handler).post(exploding_handler));
    with_middleware(routes, config)
}

fn request(method: Method, origin: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri("/explode")
        .header(header::ORIGIN, origin)
        .body(Body::empty())
        .unwrap()
}

#[cfg(test)]
mod middleware_tests {
    use super::*;

    /// Test 1: A panicking handler yields a JSON 500 with the wildcard origin
    #[tokio::test]
    async fn test_handler_panic_becomes_json_500() {
        let app = exploding_app(&ServiceConfig::default());

        let response = app
            .oneshot(request(Method::GET, "https://screening.example"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let json = body_json(response).await;
        assert_eq!(json["error_type"], "internal_error");
        assert_eq!(json["error"], "Internal server error");
        assert!(!json["request_id"].as_str().unwrap().is_empty());
        // Panic payload stays in the logs
        assert!(!json.to_string().contains("handler exploded"));
    }

    /// Test 2: A configured origin is echoed back on a panic response
    #[tokio::test]
    async fn test_handler_panic_keeps_configured_origin() {
        let config = ServiceConfig {
            cors_origins: vec!["https://frontend.example".to_string()],
            ..Default::default()
        };
        let app = exploding_app(&config);

        let response = app
            .oneshot(request(Method::POST, "https://frontend.example"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "https://frontend.example"
        );
        let json = body_json(response).await;
        assert_eq!(json["error_type"], "internal_error");
    }
}
