//! Remote Generation Port
//!
//! Capability interface to the hosted generative model: one async method per
//! pipeline stage plus job polling and thumbnail refinement. The pipeline only
//! sees this trait; concrete backends live in `http` (hosted OpenAI-compatible
//! endpoint) and `offline` (deterministic placeholder artifacts).

use crate::error::ApiError;
use crate::pipeline::script::Script;
use crate::types::{AudioArtifact, ImageArtifact, JobHandle, VideoArtifact};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod http;
pub mod offline;

pub use http::HttpGenerationClient;
pub use offline::OfflineGenerator;

/// Inputs for the video stage: the whole script, every image in paragraph order, and the narration.
#[derive(Debug, Clone, Copy)]
pub struct VideoRequest<'a> {
    pub script: &'a Script,
    pub images: &'a [ImageArtifact],
    pub audio: &'a AudioArtifact,
}

/// Result of submitting a video: either finished immediately or a job to poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSubmission {
    Ready(VideoArtifact),
    Job(JobHandle),
}

/// Status of a long-running video job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Done(VideoArtifact),
    Failed(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Done(_) => "done",
            JobStatus::Failed(_) => "failed",
        }
    }
}

/// Remote generation capability used by the pipeline and the thumbnail loop.
#[async_trait]
pub trait RemoteGenerationPort: Send + Sync {
    /// Produce narration text for a topic, one paragraph per line.
    async fn generate_script(&self, topic: &str) -> Result<String, ApiError>;

    /// Produce the illustrations for one paragraph.
    async fn generate_images_for_paragraph(
        &self,
        paragraph: &str,
    ) -> Result<Vec<ImageArtifact>, ApiError>;

    /// Produce narration audio for the whole script.
    async fn generate_audio(&self, script: &Script) -> Result<AudioArtifact, ApiError>;

    /// Submit the video render.
    async fn generate_video(&self, request: VideoRequest<'_>) -> Result<VideoSubmission, ApiError>;

    /// Query a previously submitted video job.
    async fn poll_video_job(&self, handle: &JobHandle) -> Result<JobStatus, ApiError>;

    /// Produce an image from a prompt, optionally derived from a base image.
    async fn refine_image(
        &self,
        prompt: &str,
        base: Option<&ImageArtifact>,
    ) -> Result<ImageArtifact, ApiError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}

/// Backend kind selected in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// Hosted endpoint speaking the OpenAI-compatible REST surface.
    OpenaiCompatible,
    /// Local deterministic generator; no network access.
    Offline,
}

impl ProviderType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderType::OpenaiCompatible => "openai_compatible",
            ProviderType::Offline => "offline",
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai_compatible" | "openai" => Ok(ProviderType::OpenaiCompatible),
            "offline" => Ok(ProviderType::Offline),
            other => Err(ApiError::ConfigError(format!(
                "Unknown provider type '{}' (expected openai_compatible or offline)",
                other
            ))),
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub provider_name: String,

    #[serde(default = "default_provider_type")]
    pub provider_type: ProviderType,

    /// API root, e.g. https://api.openai.com/v1
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Inline API key. Prefer `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_text_model")]
    pub text_model: String,

    #[serde(default = "default_image_model")]
    pub image_model: String,

    #[serde(default = "default_speech_model")]
    pub speech_model: String,

    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_video_model")]
    pub video_model: String,

    /// Images requested per paragraph
    #[serde(default = "default_images_per_paragraph")]
    pub images_per_paragraph: u32,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_provider_name() -> String {
    "default".to_string()
}

fn default_provider_type() -> ProviderType {
    ProviderType::OpenaiCompatible
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "REELGEN_API_KEY".to_string()
}

fn default_text_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_image_model() -> String {
    "gpt-image-1".to_string()
}

fn default_speech_model() -> String {
    "gpt-4o-mini-tts".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_video_model() -> String {
    "sora-2".to_string()
}

fn default_images_per_paragraph() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_name: default_provider_name(),
            provider_type: default_provider_type(),
            base_url: default_base_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
            text_model: default_text_model(),
            image_model: default_image_model(),
            speech_model: default_speech_model(),
            voice: default_voice(),
            video_model: default_video_model(),
            images_per_paragraph: default_images_per_paragraph(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    /// Validate provider configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.provider_name.trim().is_empty() {
            return Err("Provider name cannot be empty".to_string());
        }
        if self.images_per_paragraph == 0 {
            return Err("images_per_paragraph must be at least 1".to_string());
        }
        if self.provider_type == ProviderType::Offline {
            return Ok(());
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            ));
        }
        for (field, value) in [
            ("text_model", &self.text_model),
            ("image_model", &self.image_model),
            ("speech_model", &self.speech_model),
            ("video_model", &self.video_model),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{} cannot be empty", field));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Inline key first, then the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty()))
    }
}

/// Provider factory for creating generation ports
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_port(config: &ProviderConfig) -> Result<Arc<dyn RemoteGenerationPort>, ApiError> {
        config.validate().map_err(ApiError::ConfigError)?;
        match config.provider_type {
            ProviderType::OpenaiCompatible => {
                let api_key = config.resolve_api_key().ok_or_else(|| {
                    ApiError::ProviderNotConfigured(format!(
                        "No API key for provider '{}'. Set {} or provider.api_key.",
                        config.provider_name, config.api_key_env
                    ))
                })?;
                Ok(Arc::new(HttpGenerationClient::new(config, api_key)?))
            }
            ProviderType::Offline => Ok(Arc::new(OfflineGenerator::new(
                config.provider_name.clone(),
                config.images_per_paragraph as usize,
            ))),
        }
    }
}
