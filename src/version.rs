// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the glaucoma screening service

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Full version string with feature description
pub const VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"), "-two-stage-screening");

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "optic-nerve-gate",
    "cdr-regression",
    "risk-tiers",
    "model-registry-cache",
    "download-retry",
    "cors",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("{} ({} features)", VERSION, FEATURES.len())
}
