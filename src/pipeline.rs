//! Generation pipeline: topic → script → images → audio → video.

pub mod handle;
pub mod images;
pub mod orchestrator;
pub mod poller;
pub mod script;
pub mod state;

use crate::error::PipelineError;

/// Outcome of a single stage.
pub type StageResult<T> = Result<T, PipelineError>;

pub use handle::RunHandle;
pub use images::{FanOutOptions, FanOutPolicy, ParagraphImageSet};
pub use orchestrator::{
    GenerationOrchestrator, OrchestratorOptions, PartialArtifacts, RunArtifacts, RunOutcome,
    RunResult,
};
pub use poller::{LongRunningJobPoller, PollPolicy};
pub use script::Script;
pub use state::{PipelineState, Stage, StageStatus, StageTransition, StateTracker};
