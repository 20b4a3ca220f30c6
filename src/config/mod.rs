// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration
//!
//! Every option can be given as a command-line flag or through the
//! environment variable named next to it. `.env` files are loaded in `main`
//! before parsing.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::registry::{ModelSource, RetryPolicy, DEFAULT_REGISTRY_URL};
use crate::screening::{
    GatePolarity, ScreeningThresholds, DEFAULT_CDR_MODERATE_THRESHOLD, DEFAULT_CDR_THRESHOLD,
    DEFAULT_GATE_THRESHOLD, DEFAULT_INTRA_THREADS,
};
use crate::vision::{
    ImageNormalizer, PixelScaling, ResizeFilter, DEFAULT_INPUT_SIZE, DEFAULT_MIN_DIMENSION,
    MAX_IMAGE_SIZE,
};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_MODEL_REPO: &str = "Glaucomate/Modelo-glaucoma";
pub const DEFAULT_MODEL_REVISION: &str = "main";
pub const DEFAULT_GATE_MODEL_FILE: &str = "nervio_optico_modelo_mobilenet.onnx";
pub const DEFAULT_SCORE_MODEL_FILE: &str = "modelo_clasificacion_glaucoma_mejorado.onnx";
pub const DEFAULT_MODEL_CACHE_DIR: &str = "./models";
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Largest accepted `INPUT_SIZE`
const MAX_INPUT_SIZE: u32 = 4096;

#[derive(Parser, Debug, Clone)]
#[command(name = "glaucoma-screen")]
#[command(version)]
#[command(about = "Two-stage glaucoma screening service for fundus images", long_about = None)]
pub struct ServiceConfig {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Allowed CORS origins, comma separated; `*` allows any origin
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub cors_origins: Vec<String>,

    /// Model hub repository holding both model files
    #[arg(long, env = "MODEL_REPO", default_value = DEFAULT_MODEL_REPO)]
    pub model_repo: String,

    #[arg(long, env = "MODEL_REVISION", default_value = DEFAULT_MODEL_REVISION)]
    pub model_revision: String,

    #[arg(long, env = "MODEL_REGISTRY_URL", default_value = DEFAULT_REGISTRY_URL)]
    pub model_registry_url: String,

    #[arg(long, env = "GATE_MODEL_FILE", default_value = DEFAULT_GATE_MODEL_FILE)]
    pub gate_model_file: String,

    #[arg(long, env = "SCORE_MODEL_FILE", default_value = DEFAULT_SCORE_MODEL_FILE)]
    pub score_model_file: String,

    /// Local gating model; skips the download when set
    #[arg(long, env = "GATE_MODEL_PATH")]
    pub gate_model_path: Option<PathBuf>,

    /// Local scoring model; skips the download when set
    #[arg(long, env = "SCORE_MODEL_PATH")]
    pub score_model_path: Option<PathBuf>,

    /// Expected SHA-256 (hex) of the gating model file
    #[arg(long, env = "GATE_MODEL_SHA256")]
    pub gate_model_sha256: Option<String>,

    /// Expected SHA-256 (hex) of the scoring model file
    #[arg(long, env = "SCORE_MODEL_SHA256")]
    pub score_model_sha256: Option<String>,

    #[arg(long, env = "MODEL_CACHE_DIR", default_value = DEFAULT_MODEL_CACHE_DIR)]
    pub model_cache_dir: PathBuf,

    /// Square model input size in pixels
    #[arg(long, env = "INPUT_SIZE", default_value_t = DEFAULT_INPUT_SIZE)]
    pub input_size: u32,

    #[arg(long, env = "PIXEL_SCALING", value_enum, default_value_t = PixelScaling::Unit)]
    pub pixel_scaling: PixelScaling,

    #[arg(long, env = "RESIZE_FILTER", value_enum, default_value_t = ResizeFilter::Bicubic)]
    pub resize_filter: ResizeFilter,

    /// Minimum nerve probability for the gate to pass
    #[arg(long, env = "GATE_THRESHOLD", default_value_t = DEFAULT_GATE_THRESHOLD)]
    pub gate_threshold: f32,

    #[arg(long, env = "GATE_POLARITY", value_enum, default_value_t = GatePolarity::NerveNegative)]
    pub gate_polarity: GatePolarity,

    /// CDR at or above which glaucoma is suspected
    #[arg(long, env = "CDR_THRESHOLD", default_value_t = DEFAULT_CDR_THRESHOLD)]
    pub cdr_threshold: f32,

    /// CDR at or above which the risk tier is at least moderate
    #[arg(long, env = "CDR_MODERATE_THRESHOLD", default_value_t = DEFAULT_CDR_MODERATE_THRESHOLD)]
    pub cdr_moderate_threshold: f32,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = MAX_IMAGE_SIZE)]
    pub max_upload_bytes: usize,

    #[arg(long, env = "MIN_IMAGE_DIMENSION", default_value_t = DEFAULT_MIN_DIMENSION)]
    pub min_image_dimension: u32,

    #[arg(long, env = "DOWNLOAD_MAX_ATTEMPTS", default_value_t = 3)]
    pub download_max_attempts: u32,

    #[arg(long, env = "DOWNLOAD_INITIAL_DELAY_MS", default_value_t = 1000)]
    pub download_initial_delay_ms: u64,

    #[arg(long, env = "DOWNLOAD_MAX_DELAY_MS", default_value_t = 30000)]
    pub download_max_delay_ms: u64,

    #[arg(long, env = "DOWNLOAD_TIMEOUT_SECS", default_value_t = DEFAULT_DOWNLOAD_TIMEOUT_SECS)]
    pub download_timeout_secs: u64,

    #[arg(long, env = "ORT_INTRA_THREADS", default_value_t = DEFAULT_INTRA_THREADS)]
    pub ort_intra_threads: usize,

    /// Exit instead of serving in degraded mode when models fail to load
    #[arg(long, env = "EXIT_ON_MODEL_FAILURE")]
    pub exit_on_model_failure: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: vec!["*".to_string()],
            model_repo: DEFAULT_MODEL_REPO.to_string(),
            model_revision: DEFAULT_MODEL_REVISION.to_string(),
            model_registry_url: DEFAULT_REGISTRY_URL.to_string(),
            gate_model_file: DEFAULT_GATE_MODEL_FILE.to_string(),
            score_model_file: DEFAULT_SCORE_MODEL_FILE.to_string(),
            gate_model_path: None,
            score_model_path: None,
            gate_model_sha256: None,
            score_model_sha256: None,
            model_cache_dir: PathBuf::from(DEFAULT_MODEL_CACHE_DIR),
            input_size: DEFAULT_INPUT_SIZE,
            pixel_scaling: PixelScaling::default(),
            resize_filter: ResizeFilter::default(),
            gate_threshold: DEFAULT_GATE_THRESHOLD,
            gate_polarity: GatePolarity::default(),
            cdr_threshold: DEFAULT_CDR_THRESHOLD,
            cdr_moderate_threshold: DEFAULT_CDR_MODERATE_THRESHOLD,
            max_upload_bytes: MAX_IMAGE_SIZE,
            min_image_dimension: DEFAULT_MIN_DIMENSION,
            download_max_attempts: retry.max_attempts,
            download_initial_delay_ms: retry.initial_delay.as_millis() as u64,
            download_max_delay_ms: retry.max_delay.as_millis() as u64,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            ort_intra_threads: DEFAULT_INTRA_THREADS,
            exit_on_model_failure: false,
        }
    }
}

impl ServiceConfig {
    /// Reject inconsistent values before anything starts
    pub fn validate(&self) -> Result<()> {
        self.thresholds().validate()?;

        if self.input_size == 0 || self.input_size > MAX_INPUT_SIZE {
            bail!(
                "input_size must be within 1..={}, got {}",
                MAX_INPUT_SIZE,
                self.input_size
            );
        }

        if self.max_upload_bytes == 0 {
            bail!("max_upload_bytes must be greater than 0");
        }

        if self.download_max_attempts == 0 {
            bail!("download_max_attempts must be at least 1");
        }

        if self.download_initial_delay_ms > self.download_max_delay_ms {
            bail!(
                "download_initial_delay_ms ({}) exceeds download_max_delay_ms ({})",
                self.download_initial_delay_ms,
                self.download_max_delay_ms
            );
        }

        if self.cors_origins.iter().all(|o| o.trim().is_empty()) {
            bail!("cors_origins must name at least one origin or '*'");
        }

        for (name, file) in [
            ("gate_model_file", &self.gate_model_file),
            ("score_model_file", &self.score_model_file),
        ] {
            if file.trim().is_empty() {
                bail!("{} must not be empty", name);
            }
        }

        for (name, digest) in [
            ("gate_model_sha256", &self.gate_model_sha256),
            ("score_model_sha256", &self.score_model_sha256),
        ] {
            if let Some(digest) = digest {
                let digest = digest.trim();
                if digest.len() != 64 || hex::decode(digest).is_err() {
                    bail!("{} must be 64 hex characters", name);
                }
            }
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o.trim() == "*")
    }

    pub fn thresholds(&self) -> ScreeningThresholds {
        ScreeningThresholds {
            gate_threshold: self.gate_threshold,
            gate_polarity: self.gate_polarity,
            cdr_threshold: self.cdr_threshold,
            cdr_moderate_threshold: self.cdr_moderate_threshold,
        }
    }

    pub fn normalizer(&self) -> ImageNormalizer {
        ImageNormalizer::new(self.input_size, self.pixel_scaling, self.resize_filter)
            .with_min_dimension(self.min_image_dimension)
            .with_max_bytes(self.max_upload_bytes)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.download_max_attempts,
            initial_delay: Duration::from_millis(self.download_initial_delay_ms),
            max_delay: Duration::from_millis(self.download_max_delay_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn gate_source(&self) -> ModelSource {
        ModelSource::new(&self.model_repo, &self.model_revision, &self.gate_model_file)
            .with_sha256(self.gate_model_sha256.clone())
    }

    pub fn score_source(&self) -> ModelSource {
        ModelSource::new(&self.model_repo, &self.model_revision, &self.score_model_file)
            .with_sha256(self.score_model_sha256.clone())
    }
}
