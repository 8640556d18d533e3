//! Generation orchestrator: drives one run through the strict
//! script → images → audio → video chain.
//!
//! Every stage moves `idle → running → done | error` on the run's
//! [`StateTracker`]. The first failure aborts the run; later stages stay `idle`
//! and whatever earlier stages produced is returned as partial artifacts.
//! Nothing is retried.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pipeline::handle::RunHandle;
use crate::pipeline::images::{self, FanOutOptions, ParagraphImageSet, ParagraphOutcome};
use crate::pipeline::poller::{LongRunningJobPoller, PollPolicy};
use crate::pipeline::script::Script;
use crate::pipeline::state::{PipelineState, Stage, StageStatus, StageTransition, StateTracker};
use crate::pipeline::StageResult;
use crate::provider::{RemoteGenerationPort, VideoRequest, VideoSubmission};
use crate::telemetry::{
    new_session_id, ParagraphImagesEventData, ProgressRuntime, RunFinishedData, RunStartedData,
    SessionStatus, StageEventData, VideoJobEventData,
};
use crate::types::{AudioArtifact, ImageArtifact, VideoArtifact};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tunables for a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorOptions {
    pub poll: PollPolicy,
    /// Bound on each remote stage call. Video polling has its own bounds.
    pub stage_timeout: Option<Duration>,
    pub fan_out: FanOutOptions,
}

impl From<&PipelineConfig> for OrchestratorOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            poll: PollPolicy {
                interval: Duration::from_secs(config.poll_interval_secs),
                max_attempts: config.max_poll_attempts,
                max_duration: Duration::from_secs(config.max_poll_duration_secs),
            },
            stage_timeout: config.stage_timeout_secs.map(Duration::from_secs),
            fan_out: FanOutOptions {
                policy: config.fan_out_policy,
                max_concurrent: config.max_concurrent_images,
            },
        }
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunArtifacts {
    pub script: Script,
    pub image_sets: Vec<ParagraphImageSet>,
    pub audio: AudioArtifact,
    pub video: VideoArtifact,
}

impl RunArtifacts {
    /// All images in paragraph order.
    pub fn images(&self) -> Vec<ImageArtifact> {
        images::flatten_images(&self.image_sets)
    }
}

/// Results of the stages that finished before a run aborted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PartialArtifacts {
    pub script: Option<Script>,
    pub image_sets: Option<Vec<ParagraphImageSet>>,
    pub audio: Option<AudioArtifact>,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunArtifacts),
    Aborted {
        partial: PartialArtifacts,
        error: PipelineError,
    },
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: String,
    /// State after the run settled.
    pub state: PipelineState,
    /// Every accepted state transition, in order.
    pub transitions: Vec<StageTransition>,
    pub outcome: RunOutcome,
}

impl RunResult {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed(_))
    }

    pub fn artifacts(&self) -> Option<&RunArtifacts> {
        match &self.outcome {
            RunOutcome::Completed(artifacts) => Some(artifacts),
            RunOutcome::Aborted { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match &self.outcome {
            RunOutcome::Completed(_) => None,
            RunOutcome::Aborted { error, .. } => Some(error),
        }
    }

    pub fn into_result(self) -> Result<RunArtifacts, PipelineError> {
        match self.outcome {
            RunOutcome::Completed(artifacts) => Ok(artifacts),
            RunOutcome::Aborted { error, .. } => Err(error),
        }
    }

    pub(crate) fn aborted(
        run_id: String,
        tracker: &StateTracker,
        partial: PartialArtifacts,
        error: PipelineError,
    ) -> Self {
        Self {
            run_id,
            state: tracker.snapshot(),
            transitions: tracker.transitions(),
            outcome: RunOutcome::Aborted { partial, error },
        }
    }
}

struct RunContext<'a> {
    run_id: &'a str,
    tracker: &'a StateTracker,
    cancel: &'a CancellationToken,
    session: Option<&'a str>,
}

/// Runs the generation pipeline against a [`RemoteGenerationPort`].
#[derive(Clone)]
pub struct GenerationOrchestrator {
    port: Arc<dyn RemoteGenerationPort>,
    options: OrchestratorOptions,
    progress: Option<Arc<ProgressRuntime>>,
}

impl GenerationOrchestrator {
    pub fn new(port: Arc<dyn RemoteGenerationPort>) -> Self {
        Self {
            port,
            options: OrchestratorOptions::default(),
            progress: None,
        }
    }

    pub fn from_config(port: Arc<dyn RemoteGenerationPort>, config: &PipelineConfig) -> Self {
        Self::new(port).with_options(OrchestratorOptions::from(config))
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_progress(mut self, progress: Arc<ProgressRuntime>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Run the pipeline to completion on the current task.
    pub async fn run(&self, topic: &str) -> RunResult {
        self.run_with(topic, StateTracker::new(), CancellationToken::new())
            .await
    }

    /// Run with a caller-owned tracker and cancellation token.
    pub async fn run_with(
        &self,
        topic: &str,
        tracker: StateTracker,
        cancel: CancellationToken,
    ) -> RunResult {
        self.execute(new_session_id(), topic.to_string(), tracker, cancel)
            .await
    }

    /// Run the pipeline on a spawned tokio task. Must be called within a runtime.
    pub fn spawn(&self, topic: impl Into<String>) -> RunHandle {
        let run_id = new_session_id();
        let tracker = StateTracker::new();
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let orchestrator = self.clone();
            let run_id = run_id.clone();
            let tracker = tracker.clone();
            let cancel = cancel.clone();
            let topic = topic.into();
            async move { orchestrator.execute(run_id, topic, tracker, cancel).await }
        });
        RunHandle::new(run_id, tracker, cancel, task)
    }

    async fn execute(
        &self,
        run_id: String,
        topic: String,
        tracker: StateTracker,
        cancel: CancellationToken,
    ) -> RunResult {
        let topic = topic.trim();
        if topic.is_empty() {
            warn!(run_id = %run_id, "Rejected run with empty topic");
            return RunResult::aborted(
                run_id,
                &tracker,
                PartialArtifacts::default(),
                PipelineError::InvalidTopic("topic must not be empty".to_string()),
            );
        }

        let session = self.open_session(&run_id);
        let ctx = RunContext {
            run_id: &run_id,
            tracker: &tracker,
            cancel: &cancel,
            session: session.as_deref(),
        };

        info!(
            run_id = %run_id,
            provider_name = %self.port.provider_name(),
            topic_chars = topic.chars().count(),
            "Run started"
        );
        self.emit(
            &ctx,
            "run_started",
            &RunStartedData {
                run_id: run_id.clone(),
                topic: topic.to_string(),
                provider_name: self.port.provider_name().to_string(),
            },
        );

        let started = Instant::now();
        let mut partial = PartialArtifacts::default();
        let result = self.drive(&ctx, topic, &mut partial).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(artifacts) => {
                info!(run_id = %run_id, duration_ms, "Run completed");
                self.emit(
                    &ctx,
                    "run_completed",
                    &RunFinishedData {
                        run_id: run_id.clone(),
                        duration_ms,
                        failed_stage: None,
                        error_kind: None,
                        error: None,
                    },
                );
                self.close_session(&ctx, SessionStatus::Completed, None);
                RunOutcome::Completed(artifacts)
            }
            Err(err) => {
                error!(
                    run_id = %run_id,
                    duration_ms,
                    error_kind = err.kind(),
                    error = %err,
                    "Run failed"
                );
                self.emit(
                    &ctx,
                    "run_failed",
                    &RunFinishedData {
                        run_id: run_id.clone(),
                        duration_ms,
                        failed_stage: err.stage().map(|stage| stage.as_str().to_string()),
                        error_kind: Some(err.kind().to_string()),
                        error: Some(err.cause()),
                    },
                );
                let status = if matches!(err, PipelineError::Cancelled { .. }) {
                    SessionStatus::Cancelled
                } else {
                    SessionStatus::Failed
                };
                self.close_session(&ctx, status, Some(err.to_string()));
                RunOutcome::Aborted {
                    partial,
                    error: err,
                }
            }
        };

        RunResult {
            state: tracker.snapshot(),
            transitions: tracker.transitions(),
            run_id,
            outcome,
        }
    }

    async fn drive(
        &self,
        ctx: &RunContext<'_>,
        topic: &str,
        partial: &mut PartialArtifacts,
    ) -> StageResult<RunArtifacts> {
        let port = self.port.as_ref();

        let script = self
            .run_stage(
                ctx,
                Stage::Script,
                self.guarded(Stage::Script, ctx.cancel, async {
                    let text = port.generate_script(topic).await.map_err(|err| {
                        PipelineError::ScriptGenerationFailed {
                            cause: err.to_string(),
                        }
                    })?;
                    let script = Script::parse(&text);
                    if script.is_empty() {
                        return Err(PipelineError::ScriptGenerationFailed {
                            cause: "script contained no paragraphs".to_string(),
                        });
                    }
                    debug!(run_id = %ctx.run_id, paragraphs = script.len(), "Script parsed");
                    Ok(script)
                }),
            )
            .await?;
        partial.script = Some(script.clone());

        let image_sets = self
            .run_stage(
                ctx,
                Stage::Images,
                self.guarded(
                    Stage::Images,
                    ctx.cancel,
                    images::generate_image_sets(port, &script, self.options.fan_out, |outcome| {
                        self.on_paragraph(ctx, outcome)
                    }),
                ),
            )
            .await?;
        partial.image_sets = Some(image_sets.clone());

        let audio = self
            .run_stage(
                ctx,
                Stage::Audio,
                self.guarded(Stage::Audio, ctx.cancel, async {
                    port.generate_audio(&script).await.map_err(|err| {
                        PipelineError::AudioGenerationFailed {
                            cause: err.to_string(),
                        }
                    })
                }),
            )
            .await?;
        partial.audio = Some(audio.clone());

        let all_images = images::flatten_images(&image_sets);
        let video = self
            .run_stage(
                ctx,
                Stage::Video,
                self.video_stage(ctx, &script, &all_images, &audio),
            )
            .await?;

        Ok(RunArtifacts {
            script,
            image_sets,
            audio,
            video,
        })
    }

    async fn video_stage(
        &self,
        ctx: &RunContext<'_>,
        script: &Script,
        images: &[ImageArtifact],
        audio: &AudioArtifact,
    ) -> StageResult<VideoArtifact> {
        let port = self.port.as_ref();
        let submission = self
            .guarded(Stage::Video, ctx.cancel, async {
                port.generate_video(VideoRequest {
                    script,
                    images,
                    audio,
                })
                .await
                .map_err(|err| PipelineError::VideoGenerationFailed {
                    cause: err.to_string(),
                })
            })
            .await?;

        let handle = match submission {
            VideoSubmission::Ready(video) => return Ok(video),
            VideoSubmission::Job(handle) => handle,
        };

        info!(run_id = %ctx.run_id, job_id = %handle, "Video job submitted");
        self.emit(
            ctx,
            "video_job_submitted",
            &VideoJobEventData {
                job_id: handle.to_string(),
                attempt: None,
                status: None,
            },
        );

        LongRunningJobPoller::new(self.options.poll)
            .poll(port, &handle, ctx.cancel, |attempt, status| {
                self.emit(
                    ctx,
                    "video_job_polled",
                    &VideoJobEventData {
                        job_id: handle.to_string(),
                        attempt: Some(attempt),
                        status: Some(status.label().to_string()),
                    },
                );
            })
            .await
            .map_err(PipelineError::from)
    }

    /// Move `stage` to running, await `work`, then record done or error.
    async fn run_stage<T, Fut>(&self, ctx: &RunContext<'_>, stage: Stage, work: Fut) -> StageResult<T>
    where
        Fut: Future<Output = StageResult<T>>,
    {
        ctx.tracker.transition(stage, StageStatus::Running)?;
        info!(run_id = %ctx.run_id, stage = %stage, "Stage started");
        self.emit(ctx, "stage_started", &stage_event(stage, None, None));

        let started = Instant::now();
        let result = work.await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => {
                ctx.tracker.transition(stage, StageStatus::Done)?;
                info!(run_id = %ctx.run_id, stage = %stage, duration_ms, "Stage completed");
                self.emit(
                    ctx,
                    "stage_completed",
                    &stage_event(stage, Some(duration_ms), None),
                );
            }
            Err(err) => {
                if let Err(state_err) = ctx.tracker.transition(stage, StageStatus::Error) {
                    warn!(run_id = %ctx.run_id, stage = %stage, error = %state_err, "Could not mark stage failed");
                }
                error!(
                    run_id = %ctx.run_id,
                    stage = %stage,
                    duration_ms,
                    error_kind = err.kind(),
                    error = %err,
                    "Stage failed"
                );
                self.emit(
                    ctx,
                    "stage_failed",
                    &stage_event(stage, Some(duration_ms), Some(err)),
                );
            }
        }
        result
    }

    /// Race `work` against cancellation and the optional stage timeout.
    async fn guarded<T, Fut>(
        &self,
        stage: Stage,
        cancel: &CancellationToken,
        work: Fut,
    ) -> StageResult<T>
    where
        Fut: Future<Output = StageResult<T>>,
    {
        let bounded = async {
            match self.options.stage_timeout {
                Some(limit) => tokio::time::timeout(limit, work)
                    .await
                    .map_err(|_| PipelineError::StageTimedOut {
                        stage,
                        timeout: limit,
                    })?,
                None => work.await,
            }
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled { stage }),
            result = bounded => result,
        }
    }

    fn on_paragraph(&self, ctx: &RunContext<'_>, outcome: ParagraphOutcome<'_>) {
        match outcome {
            ParagraphOutcome::Completed { index, image_count } => self.emit(
                ctx,
                "paragraph_images_completed",
                &ParagraphImagesEventData {
                    paragraph_index: index,
                    image_count: Some(image_count),
                    error: None,
                },
            ),
            ParagraphOutcome::Failed { index, cause } => self.emit(
                ctx,
                "paragraph_images_failed",
                &ParagraphImagesEventData {
                    paragraph_index: index,
                    image_count: None,
                    error: Some(cause.to_string()),
                },
            ),
        }
    }

    fn open_session(&self, run_id: &str) -> Option<String> {
        let progress = self.progress.as_ref()?;
        match progress.start_session_with_id(run_id, "run") {
            Ok(()) => Some(run_id.to_string()),
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "Progress session unavailable");
                None
            }
        }
    }

    fn close_session(&self, ctx: &RunContext<'_>, status: SessionStatus, error: Option<String>) {
        if let (Some(progress), Some(session)) = (&self.progress, ctx.session) {
            if let Err(err) = progress.finish_session(session, status, error) {
                warn!(run_id = %ctx.run_id, error = %err, "Failed to close progress session");
            }
        }
    }

    fn emit<T: Serialize>(&self, ctx: &RunContext<'_>, event_type: &str, data: &T) {
        if let (Some(progress), Some(session)) = (&self.progress, ctx.session) {
            progress.emit_event_best_effort(session, event_type, data);
        }
    }
}

fn stage_event(stage: Stage, duration_ms: Option<u64>, err: Option<&PipelineError>) -> StageEventData {
    StageEventData {
        stage: stage.as_str().to_string(),
        duration_ms,
        error_kind: err.map(|e| e.kind().to_string()),
        error: err.map(PipelineError::cause),
    }
}
