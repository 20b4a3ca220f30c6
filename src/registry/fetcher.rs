// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model file download and on-disk cache
//!
//! Files are fetched with a plain GET against a Hugging Face style layout
//! (`{base}/{repo}/resolve/{revision}/{file}`) and cached under
//! `{cache_dir}/{repo with '/' -> '--'}/{revision}/{file}`.

use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::retry::{RetryPolicy, Retryable};

pub const DEFAULT_REGISTRY_URL: &str = "https://huggingface.co";

/// One downloadable model file
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSource {
    pub repo: String,
    pub revision: String,
    pub file: String,
    /// Expected lowercase hex SHA-256 of the file
    pub sha256: Option<String>,
}

impl ModelSource {
    pub fn new(
        repo: impl Into<String>,
        revision: impl Into<String>,
        file: impl Into<String>,
    ) -> Self {
        Self {
            repo: repo.into(),
            revision: revision.into(),
            file: file.into(),
            sha256: None,
        }
    }

    pub fn with_sha256(mut self, sha256: Option<String>) -> Self {
        self.sha256 = sha256.map(|s| s.trim().to_ascii_lowercase());
        self
    }

    pub fn url(&self, base: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            base.trim_end_matches('/'),
            self.repo,
            self.revision,
            self.file
        )
    }

    pub fn cache_path(&self, cache_dir: &Path) -> PathBuf {
        cache_dir
            .join(self.repo.replace('/', "--"))
            .join(&self.revision)
            .join(&self.file)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("Registry returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("I/O error at {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network { .. } => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::ChecksumMismatch { .. } | FetchError::Io { .. } => false,
        }
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Downloads model files through the retry policy and caches them on disk
#[derive(Debug, Clone)]
pub struct ModelFetcher {
    client: reqwest::Client,
    base_url: String,
    cache_dir: PathBuf,
    retry: RetryPolicy,
}

impl ModelFetcher {
    pub fn new(
        base_url: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            cache_dir: cache_dir.into(),
            retry,
        })
    }

    /// Return a local path for `source`, downloading it if not cached
    pub async fn fetch(&self, source: &ModelSource) -> Result<PathBuf, FetchError> {
        let path = source.cache_path(&self.cache_dir);

        if path.exists() {
            match self.verify_cached(source, &path).await {
                Ok(()) => {
                    info!("📦 Using cached model {}", path.display());
                    return Ok(path);
                }
                Err(e) => {
                    warn!("Discarding cached {}: {}", path.display(), e);
                    remove_file(&path).await?;
                }
            }
        }

        let url = source.url(&self.base_url);
        info!("Downloading {} from {}", source.file, url);

        let operation = format!("download {}", source.file);
        let data = self
            .retry
            .run(&operation, |_| self.download_once(&url))
            .await?;

        verify_digest(source, &data)?;
        write_atomic(&path, &data).await?;

        info!(
            "✅ Downloaded {} ({} bytes) to {}",
            source.file,
            data.len(),
            path.display()
        );

        Ok(path)
    }

    async fn download_once(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn verify_cached(&self, source: &ModelSource, path: &Path) -> Result<(), FetchError> {
        if source.sha256.is_none() {
            return Ok(());
        }

        let data = tokio::fs::read(path).await.map_err(|e| io_error(path, e))?;
        verify_digest(source, &data)
    }
}

fn verify_digest(source: &ModelSource, data: &[u8]) -> Result<(), FetchError> {
    let Some(expected) = &source.sha256 else {
        return Ok(());
    };

    let actual = sha256_hex(data);
    if &actual != expected {
        return Err(FetchError::ChecksumMismatch {
            file: source.file.clone(),
            expected: expected.clone(),
            actual,
        });
    }

    debug!("Checksum verified for {}", source.file);
    Ok(())
}

/// Write to `{path}.part` then rename over `path`
async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), FetchError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }

    let mut part_name = path.file_name().unwrap_or_default().to_os_string();
    part_name.push(".part");
    let part_path = path.with_file_name(part_name);

    tokio::fs::write(&part_path, data)
        .await
        .map_err(|e| io_error(&part_path, e))?;
    tokio::fs::rename(&part_path, path)
        .await
        .map_err(|e| io_error(path, e))?;

    Ok(())
}

async fn remove_file(path: &Path) -> Result<(), FetchError> {
    tokio::fs::remove_file(path)
        .await
        .map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, e: std::io::Error) -> FetchError {
    FetchError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
