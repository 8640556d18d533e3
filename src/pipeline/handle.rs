//! Handle to a run executing on its own task.

use crate::error::PipelineError;
use crate::pipeline::orchestrator::{PartialArtifacts, RunResult};
use crate::pipeline::state::{PipelineState, Stage, StateTracker};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Observe, cancel and await a spawned run.
///
/// Dropping the handle does not stop the run.
pub struct RunHandle {
    run_id: String,
    tracker: StateTracker,
    cancel: CancellationToken,
    task: JoinHandle<RunResult>,
}

impl RunHandle {
    pub(crate) fn new(
        run_id: String,
        tracker: StateTracker,
        cancel: CancellationToken,
        task: JoinHandle<RunResult>,
    ) -> Self {
        Self {
            run_id,
            tracker,
            cancel,
            task,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Current snapshot of the run's state.
    pub fn state(&self) -> PipelineState {
        self.tracker.snapshot()
    }

    /// New observer of state changes. Any number may be held.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.tracker.subscribe()
    }

    /// Request cancellation. The running stage ends in `error`; no later stage starts.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to settle.
    pub async fn join(self) -> RunResult {
        match self.task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => {
                let stage = self.tracker.snapshot().running_stage().unwrap_or(Stage::Script);
                RunResult::aborted(
                    self.run_id,
                    &self.tracker,
                    PartialArtifacts::default(),
                    PipelineError::Cancelled { stage },
                )
            }
        }
    }
}
