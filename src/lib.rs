// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod registry;
pub mod screening;
pub mod version;
pub mod vision;

// Re-export main types
pub use api::{create_app, start_server, AppState};
pub use config::ServiceConfig;
pub use registry::{ModelFetcher, ModelSource, RetryPolicy};
pub use screening::{
    load_model_bundle, InferenceResult, ModelBundle, ModelSlot, RiskTier, ScalarModel,
    ScreeningError, ScreeningThresholds, TwoStagePredictor,
};
pub use vision::{ImageNormalizer, NormalizedTensor};
