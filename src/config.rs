//! Configuration System
//!
//! Layered configuration for the generation pipeline: provider endpoint and
//! models, pipeline bounds, thumbnail refinement and logging. Files are TOML;
//! every key can be overridden from the environment as `REELGEN__SECTION__KEY`.

use crate::logging::LoggingConfig;
use crate::pipeline::images::FanOutPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use crate::provider::{ProviderConfig, ProviderType};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReelConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub refinement: RefinementConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pipeline bounds and fan-out behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Seconds between video job status queries
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    #[serde(default = "default_max_poll_duration_secs")]
    pub max_poll_duration_secs: u64,

    /// Bound on each remote stage call; unset means unbounded
    #[serde(default)]
    pub stage_timeout_secs: Option<u64>,

    /// Concurrent image requests; unset issues every paragraph at once
    #[serde(default)]
    pub max_concurrent_images: Option<usize>,

    #[serde(default)]
    pub fan_out_policy: FanOutPolicy,

    /// Shortest topic the CLI accepts
    #[serde(default = "default_min_topic_chars")]
    pub min_topic_chars: usize,
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_poll_attempts() -> u32 {
    120
}

fn default_max_poll_duration_secs() -> u64 {
    900
}

fn default_min_topic_chars() -> usize {
    3
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_attempts: default_max_poll_attempts(),
            max_poll_duration_secs: default_max_poll_duration_secs(),
            stage_timeout_secs: None,
            max_concurrent_images: None,
            fan_out_policy: FanOutPolicy::default(),
            min_topic_chars: default_min_topic_chars(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be greater than zero".to_string());
        }
        if self.max_poll_attempts == 0 {
            return Err("max_poll_attempts must be at least 1".to_string());
        }
        if self.max_poll_duration_secs < self.poll_interval_secs {
            return Err(format!(
                "max_poll_duration_secs ({}) is shorter than poll_interval_secs ({})",
                self.max_poll_duration_secs, self.poll_interval_secs
            ));
        }
        if self.stage_timeout_secs == Some(0) {
            return Err("stage_timeout_secs must be greater than zero when set".to_string());
        }
        if self.max_concurrent_images == Some(0) {
            return Err("max_concurrent_images must be at least 1 when set".to_string());
        }
        Ok(())
    }
}

/// Thumbnail refinement settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Where `reelgen thumbnail` saves versions when no --out is given
    #[serde(default = "default_refinement_output_dir")]
    pub output_dir: PathBuf,
}

fn default_refinement_output_dir() -> PathBuf {
    PathBuf::from("thumbnails")
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            output_dir: default_refinement_output_dir(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Provider(String, String),
    Pipeline(String),
    Refinement(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(name, msg) => write!(f, "Provider '{}': {}", name, msg),
            ValidationError::Pipeline(msg) => write!(f, "Pipeline: {}", msg),
            ValidationError::Refinement(msg) => write!(f, "Refinement: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ReelConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.provider.validate() {
            errors.push(ValidationError::Provider(
                self.provider.provider_name.clone(),
                e,
            ));
        }
        if let Err(e) = self.pipeline.validate() {
            errors.push(ValidationError::Pipeline(e));
        }
        if self.refinement.output_dir.as_os_str().is_empty() {
            errors.push(ValidationError::Refinement(
                "output_dir cannot be empty".to_string(),
            ));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
