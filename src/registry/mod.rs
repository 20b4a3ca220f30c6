// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model registry access: download, cache, verify, retry

pub mod fetcher;
pub mod retry;

pub use fetcher::{sha256_hex, FetchError, ModelFetcher, ModelSource, DEFAULT_REGISTRY_URL};
pub use retry::{RetryPolicy, Retryable};
