//! Error types for the reelgen generation pipeline.

use crate::pipeline::state::Stage;
use std::time::Duration;
use thiserror::Error;

/// Provider, configuration and I/O errors.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Failure reported by the remote generation service, message passed through verbatim.
    #[error("{0}")]
    Remote(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider model not found: {0}")]
    ProviderModelNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::IoError(err.to_string())
    }
}

/// Rejected pipeline state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Stage {stage} cannot move from {from} to {to}")]
    InvalidTransition {
        stage: Stage,
        from: &'static str,
        to: &'static str,
    },

    #[error("Stage {stage} cannot start before {dependency} is done")]
    DependencyNotDone { stage: Stage, dependency: Stage },

    #[error("Stage {stage} cannot start after {failed} failed")]
    UpstreamFailed { stage: Stage, failed: Stage },
}

/// Stage-tagged failure of a generation run.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Script generation failed: {cause}")]
    ScriptGenerationFailed { cause: String },

    #[error("Image generation failed for paragraph {paragraph_index}: {cause}")]
    ImageGenerationFailed { paragraph_index: usize, cause: String },

    #[error("Audio generation failed: {cause}")]
    AudioGenerationFailed { cause: String },

    #[error("Video generation failed: {cause}")]
    VideoGenerationFailed { cause: String },

    #[error("Polling video job failed: {cause}")]
    PollingFailed { cause: String },

    #[error("Run cancelled during {stage} stage")]
    Cancelled { stage: Stage },

    #[error("{stage} stage timed out after {timeout:?}")]
    StageTimedOut { stage: Stage, timeout: Duration },

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Pipeline state error: {0}")]
    State(#[from] StateError),
}

impl PipelineError {
    /// Stage the failure is attributed to. `None` for failures raised before any stage ran.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::ScriptGenerationFailed { .. } => Some(Stage::Script),
            PipelineError::ImageGenerationFailed { .. } => Some(Stage::Images),
            PipelineError::AudioGenerationFailed { .. } => Some(Stage::Audio),
            PipelineError::VideoGenerationFailed { .. } => Some(Stage::Video),
            PipelineError::PollingFailed { .. } => Some(Stage::Video),
            PipelineError::Cancelled { stage } => Some(*stage),
            PipelineError::StageTimedOut { stage, .. } => Some(*stage),
            PipelineError::InvalidTopic(_) => None,
            PipelineError::State(StateError::InvalidTransition { stage, .. })
            | PipelineError::State(StateError::DependencyNotDone { stage, .. })
            | PipelineError::State(StateError::UpstreamFailed { stage, .. }) => Some(*stage),
        }
    }

    /// Underlying cause message without the stage prefix.
    pub fn cause(&self) -> String {
        match self {
            PipelineError::ScriptGenerationFailed { cause }
            | PipelineError::ImageGenerationFailed { cause, .. }
            | PipelineError::AudioGenerationFailed { cause }
            | PipelineError::VideoGenerationFailed { cause }
            | PipelineError::PollingFailed { cause } => cause.clone(),
            PipelineError::Cancelled { .. } => "run cancelled".to_string(),
            PipelineError::StageTimedOut { timeout, .. } => {
                format!("timed out after {:?}", timeout)
            }
            PipelineError::InvalidTopic(msg) => msg.clone(),
            PipelineError::State(err) => err.to_string(),
        }
    }

    /// Stable snake_case tag used in telemetry payloads and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ScriptGenerationFailed { .. } => "script_generation_failed",
            PipelineError::ImageGenerationFailed { .. } => "image_generation_failed",
            PipelineError::AudioGenerationFailed { .. } => "audio_generation_failed",
            PipelineError::VideoGenerationFailed { .. } => "video_generation_failed",
            PipelineError::PollingFailed { .. } => "polling_failed",
            PipelineError::Cancelled { .. } => "cancelled",
            PipelineError::StageTimedOut { .. } => "stage_timed_out",
            PipelineError::InvalidTopic(_) => "invalid_topic",
            PipelineError::State(_) => "state_error",
        }
    }
}

/// Terminal failures of the long-running job poller.
#[derive(Debug, Clone, Error)]
pub enum PollError {
    /// The remote job reported failure.
    #[error("{0}")]
    JobFailed(String),

    /// A status query itself failed. Not retried.
    #[error("{0}")]
    Query(ApiError),

    #[error("job still pending after {attempts} status queries")]
    AttemptsExhausted { attempts: u32 },

    #[error("job still pending after {elapsed:?}")]
    TimedOut { elapsed: Duration },

    #[error("polling cancelled")]
    Cancelled,
}

impl From<PollError> for PipelineError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::JobFailed(cause) => PipelineError::VideoGenerationFailed { cause },
            PollError::Cancelled => PipelineError::Cancelled {
                stage: Stage::Video,
            },
            other => PipelineError::PollingFailed {
                cause: other.to_string(),
            },
        }
    }
}

/// Thumbnail refinement loop errors.
#[derive(Debug, Clone, Error)]
pub enum RefinementError {
    #[error("No active version to refine; generate an initial image first")]
    NoActiveVersion,

    #[error("Version {index} is out of range (history has {len} entries)")]
    VersionOutOfRange { index: usize, len: usize },

    #[error("Image generation failed: {0}")]
    Generation(#[from] ApiError),
}
