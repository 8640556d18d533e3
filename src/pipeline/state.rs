//! Pipeline stage state machine.
//!
//! `PipelineState` holds one `StageStatus` per stage. Transitions are checked:
//! `idle -> running` requires the preceding stage to be `done`, and
//! `running -> done | error` are the only ways out of `running`. The tracker
//! publishes every accepted transition through a `watch` channel so observers
//! always read a whole snapshot.

use crate::error::StateError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Named pipeline stage, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Script,
    Images,
    Audio,
    Video,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Script, Stage::Images, Stage::Audio, Stage::Video];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Script => "script",
            Stage::Images => "images",
            Stage::Audio => "audio",
            Stage::Video => "video",
        }
    }

    /// Stage that must be `done` before this one may start.
    pub fn dependency(self) -> Option<Stage> {
        match self {
            Stage::Script => None,
            Stage::Images => Some(Stage::Script),
            Stage::Audio => Some(Stage::Images),
            Stage::Video => Some(Stage::Audio),
        }
    }

    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Script => Some(Stage::Images),
            Stage::Images => Some(Stage::Audio),
            Stage::Audio => Some(Stage::Video),
            Stage::Video => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Idle,
    Running,
    Done,
    Error,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Idle => "idle",
            StageStatus::Running => "running",
            StageStatus::Done => "done",
            StageStatus::Error => "error",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of every stage for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineState {
    pub script: StageStatus,
    pub images: StageStatus,
    pub audio: StageStatus,
    pub video: StageStatus,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stage: Stage) -> StageStatus {
        match stage {
            Stage::Script => self.script,
            Stage::Images => self.images,
            Stage::Audio => self.audio,
            Stage::Video => self.video,
        }
    }

    fn slot(&mut self, stage: Stage) -> &mut StageStatus {
        match stage {
            Stage::Script => &mut self.script,
            Stage::Images => &mut self.images,
            Stage::Audio => &mut self.audio,
            Stage::Video => &mut self.video,
        }
    }

    /// Apply a transition, rejecting anything the state machine does not allow.
    pub fn transition(&mut self, stage: Stage, to: StageStatus) -> Result<(), StateError> {
        let from = self.get(stage);
        match (from, to) {
            (StageStatus::Idle, StageStatus::Running) => {
                if let Some(failed) = self.failed_stage() {
                    return Err(StateError::UpstreamFailed { stage, failed });
                }
                if let Some(dependency) = stage.dependency() {
                    if self.get(dependency) != StageStatus::Done {
                        return Err(StateError::DependencyNotDone { stage, dependency });
                    }
                }
            }
            (StageStatus::Running, StageStatus::Done) | (StageStatus::Running, StageStatus::Error) => {}
            _ => {
                return Err(StateError::InvalidTransition {
                    stage,
                    from: from.as_str(),
                    to: to.as_str(),
                })
            }
        }
        *self.slot(stage) = to;
        Ok(())
    }

    /// First stage in `error`, if any.
    pub fn failed_stage(&self) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .find(|stage| self.get(*stage) == StageStatus::Error)
    }

    /// Stage currently `running`, if any.
    pub fn running_stage(&self) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .find(|stage| self.get(*stage) == StageStatus::Running)
    }

    pub fn is_complete(&self) -> bool {
        Stage::ALL
            .into_iter()
            .all(|stage| self.get(stage) == StageStatus::Done)
    }

    /// No stage is running and no further stage can start.
    pub fn is_settled(&self) -> bool {
        self.is_complete() || (self.failed_stage().is_some() && self.running_stage().is_none())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, StageStatus)> + '_ {
        Stage::ALL.into_iter().map(move |stage| (stage, self.get(stage)))
    }
}

/// One accepted transition, in the order it was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub seq: u64,
    pub stage: Stage,
    pub to: StageStatus,
}

/// Owner-side view of a run's state: applies transitions and notifies observers.
#[derive(Clone)]
pub struct StateTracker {
    sender: Arc<watch::Sender<PipelineState>>,
    transitions: Arc<Mutex<Vec<StageTransition>>>,
}

impl StateTracker {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(PipelineState::new());
        Self {
            sender: Arc::new(sender),
            transitions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.sender.subscribe()
    }

    pub fn snapshot(&self) -> PipelineState {
        *self.sender.borrow()
    }

    pub fn transition(&self, stage: Stage, to: StageStatus) -> Result<(), StateError> {
        let mut outcome = Ok(());
        // Log lock is held across the publish: seq order == publish order.
        let mut log = self.transitions.lock();
        self.sender.send_if_modified(|state| match state.transition(stage, to) {
            Ok(()) => true,
            Err(err) => {
                outcome = Err(err);
                false
            }
        });
        if outcome.is_ok() {
            let seq = log.len() as u64 + 1;
            log.push(StageTransition { seq, stage, to });
        }
        outcome
    }

    pub fn transitions(&self) -> Vec<StageTransition> {
        self.transitions.lock().clone()
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
