//! CLI route: single route table and run context. Dispatches to the pipeline,
//! the refinement loop and presentation.

use crate::cli::artifacts::{write_image, write_run_artifacts};
use crate::cli::command_name;
use crate::cli::output::CommandOutput;
use crate::cli::parse::{Commands, ConfigCommands};
use crate::cli::presentation::{
    format_config_text, format_history_text, format_run_json, format_run_text,
    format_stage_change, format_validation_text,
};
use crate::config::{ConfigLoader, ProviderConfig, ReelConfig};
use crate::error::{ApiError, RefinementError};
use crate::pipeline::{GenerationOrchestrator, PipelineState, RunResult, StateTracker};
use crate::provider::{ProviderFactory, RemoteGenerationPort};
use crate::refinement::ThumbnailRefiner;
use crate::telemetry::{ProgressRuntime, SessionStatus};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Exit code for a run that settled with an error.
const EXIT_RUN_ABORTED: i32 = 2;
const EXIT_INVALID_CONFIG: i32 = 1;

/// Runtime context for CLI execution: workspace, resolved config and progress runtime.
pub struct RunContext {
    workspace_root: PathBuf,
    config: ReelConfig,
    progress: Arc<ProgressRuntime>,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Ok(Self::from_config(workspace_root, config))
    }

    pub fn from_config(workspace_root: PathBuf, config: ReelConfig) -> Self {
        Self {
            workspace_root,
            config,
            progress: Arc::new(ProgressRuntime::new()),
        }
    }

    pub fn config(&self) -> &ReelConfig {
        &self.config
    }

    /// Progress runtime for session and event emission.
    pub fn progress_runtime(&self) -> Arc<ProgressRuntime> {
        Arc::clone(&self.progress)
    }

    /// Execute a command inside its own progress session.
    pub fn execute(&self, command: &Commands) -> Result<CommandOutput, ApiError> {
        let name = command_name(command);
        let session = self.progress.start_session(&name)?;
        let started = Instant::now();

        let result = match command {
            Commands::Run {
                topic,
                out,
                format,
                provider,
            } => self.handle_run(topic, out.as_deref(), format, provider.as_deref()),
            Commands::Thumbnail {
                prompt,
                out,
                provider,
            } => self.handle_thumbnail(prompt, out.as_deref(), provider.as_deref()),
            Commands::Config { command } => self.handle_config(command),
        };

        let (status, error) = match &result {
            Ok(output) if output.exit_code == 0 => (SessionStatus::Completed, None),
            Ok(output) => (
                SessionStatus::Failed,
                Some(format!("exit code {}", output.exit_code)),
            ),
            Err(e) => (SessionStatus::Failed, Some(e.to_string())),
        };
        if let Err(e) = self.progress.finish_session(&session, status, error) {
            warn!(command = %name, error = %e, "Failed to close progress session");
        }
        info!(
            command = %name,
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn handle_run(
        &self,
        topic: &str,
        out: Option<&Path>,
        format: &str,
        provider: Option<&str>,
    ) -> Result<CommandOutput, ApiError> {
        let topic = topic.trim();
        let min_chars = self.config.pipeline.min_topic_chars;
        if topic.chars().count() < min_chars {
            return Err(ApiError::InvalidInput(format!(
                "Topic must be at least {} characters",
                min_chars
            )));
        }
        if format != "text" && format != "json" {
            return Err(ApiError::InvalidInput(format!(
                "Unknown format '{}' (expected text or json)",
                format
            )));
        }
        self.validate_config()?;

        let port = ProviderFactory::create_port(&self.provider_config(provider)?)?;
        let orchestrator = GenerationOrchestrator::from_config(port, &self.config.pipeline)
            .with_progress(self.progress_runtime());

        let rt = new_runtime()?;
        let result = rt.block_on(run_with_live_progress(
            &orchestrator,
            topic,
            tokio::signal::ctrl_c(),
        ));

        let written = match out {
            Some(dir) => write_run_artifacts(dir, &result)?,
            None => Vec::new(),
        };
        let events = self.progress.read_events(&result.run_id);
        let text = if format == "json" {
            format_run_json(&result, &events, &written)?
        } else {
            format_run_text(&result, events.len(), &written)
        };

        if result.is_completed() {
            Ok(CommandOutput::success(text))
        } else {
            Ok(CommandOutput::with_exit_code(text, EXIT_RUN_ABORTED))
        }
    }

    fn handle_thumbnail(
        &self,
        prompt: &str,
        out: Option<&Path>,
        provider: Option<&str>,
    ) -> Result<CommandOutput, ApiError> {
        use dialoguer::{Input, Select};

        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ApiError::InvalidInput("Prompt must not be empty".to_string()));
        }
        self.validate_config()?;

        let dir = match out {
            Some(dir) => dir.to_path_buf(),
            None => self.resolve_path(&self.config.refinement.output_dir),
        };
        let port = ProviderFactory::create_port(&self.provider_config(provider)?)?;
        let mut refiner = ThumbnailRefiner::new(port);
        let rt = new_runtime()?;

        rt.block_on(refiner.generate_initial(prompt))
            .map_err(refinement_to_api_error)?;
        let mut saved = vec![save_active(&dir, &refiner)?];

        loop {
            let choice = Select::new()
                .with_prompt("Thumbnail")
                .items(&[
                    "Refine active version",
                    "Select version",
                    "Show versions",
                    "Start over",
                    "Done",
                ])
                .default(0)
                .interact()
                .map_err(input_error)?;

            match choice {
                0 => {
                    let refinement: String = Input::new()
                        .with_prompt("Refinement prompt")
                        .interact_text()
                        .map_err(input_error)?;
                    let refined = rt.block_on(refiner.refine(&refinement)).map(|_| ());
                    match refined {
                        Ok(()) => saved.push(save_active(&dir, &refiner)?),
                        Err(e) => eprintln!("{}", e),
                    }
                }
                1 => {
                    let items: Vec<String> = refiner
                        .history()
                        .entries()
                        .iter()
                        .enumerate()
                        .map(|(i, entry)| format!("v{}: {}", i, entry.prompt))
                        .collect();
                    let index = Select::new()
                        .with_prompt("Version")
                        .items(&items)
                        .default(refiner.history().active_index().unwrap_or(0))
                        .interact()
                        .map_err(input_error)?;
                    if let Err(e) = refiner.select_version(index) {
                        eprintln!("{}", e);
                    }
                }
                2 => eprintln!("{}", format_history_text(refiner.history())),
                3 => {
                    let fresh: String = Input::new()
                        .with_prompt("New prompt")
                        .interact_text()
                        .map_err(input_error)?;
                    let restarted = rt.block_on(refiner.generate_initial(&fresh)).map(|_| ());
                    match restarted {
                        Ok(()) => saved.push(save_active(&dir, &refiner)?),
                        Err(e) => eprintln!("{}", e),
                    }
                }
                _ => break,
            }
        }

        Ok(CommandOutput::success(format!(
            "{}\n\nSaved {} file(s) to {}",
            format_history_text(refiner.history()),
            saved.len(),
            dir.display()
        )))
    }

    fn handle_config(&self, command: &ConfigCommands) -> Result<CommandOutput, ApiError> {
        match command {
            ConfigCommands::Show { format } => {
                Ok(CommandOutput::success(format_config_text(&self.config, format)?))
            }
            ConfigCommands::Validate => {
                let result = self.config.validate();
                let text = format_validation_text(&result);
                Ok(match result {
                    Ok(()) => CommandOutput::success(text),
                    Err(_) => CommandOutput::with_exit_code(text, EXIT_INVALID_CONFIG),
                })
            }
        }
    }

    fn validate_config(&self) -> Result<(), ApiError> {
        self.config.validate().map_err(|errors| {
            ApiError::ConfigError(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })
    }

    fn provider_config(&self, provider_type: Option<&str>) -> Result<ProviderConfig, ApiError> {
        let mut provider = self.config.provider.clone();
        if let Some(provider_type) = provider_type {
            provider.provider_type = provider_type.parse()?;
        }
        Ok(provider)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }
}

/// Drive a run on the current runtime, echoing stage changes to stderr.
/// `interrupt` resolving (Ctrl-C from the CLI) cancels the run; the running stage then settles in `error`.
async fn run_with_live_progress<I>(
    orchestrator: &GenerationOrchestrator,
    topic: &str,
    interrupt: I,
) -> RunResult
where
    I: Future,
{
    let tracker = StateTracker::new();
    let cancel = CancellationToken::new();
    let mut updates = tracker.subscribe();
    let mut last = PipelineState::new();

    let run = orchestrator.run_with(topic, tracker, cancel.clone());
    tokio::pin!(run);
    tokio::pin!(interrupt);

    let result = loop {
        tokio::select! {
            result = &mut run => break result,
            changed = updates.changed() => {
                if changed.is_ok() {
                    let current = *updates.borrow_and_update();
                    print_stage_changes(&last, &current);
                    last = current;
                }
            }
            _ = &mut interrupt, if !cancel.is_cancelled() => {
                warn!("Interrupted; cancelling run");
                cancel.cancel();
            }
        }
    };
    print_stage_changes(&last, &result.state);
    result
}

fn print_stage_changes(previous: &PipelineState, current: &PipelineState) {
    for (stage, status) in current.iter() {
        if previous.get(stage) != status {
            eprintln!("{}", format_stage_change(stage, status));
        }
    }
}

fn save_active<P: RemoteGenerationPort + ?Sized>(
    dir: &Path,
    refiner: &ThumbnailRefiner<P>,
) -> Result<PathBuf, ApiError> {
    let history = refiner.history();
    let (index, entry) = history
        .active_index()
        .and_then(|i| history.get(i).map(|e| (i, e)))
        .ok_or_else(|| ApiError::InvalidInput("No active thumbnail version".to_string()))?;
    let stem = format!("thumbnail-e{}-v{}", history.epoch(), index);
    let path = write_image(dir, &stem, &entry.image)?;
    eprintln!("Saved {}", path.display());
    Ok(path)
}

fn new_runtime() -> Result<Runtime, ApiError> {
    Runtime::new().map_err(|e| ApiError::ProviderError(format!("Failed to create runtime: {}", e)))
}

fn input_error(e: dialoguer::Error) -> ApiError {
    ApiError::ConfigError(format!("Failed to get user input: {}", e))
}

fn refinement_to_api_error(e: RefinementError) -> ApiError {
    match e {
        RefinementError::Generation(inner) => inner,
        other => ApiError::InvalidInput(other.to_string()),
    }
}
