//! Run command output: live stage lines, final summary table and JSON.

use crate::cli::presentation::shared::{colored_status, format_section_heading, to_json_pretty};
use crate::error::ApiError;
use crate::pipeline::{RunOutcome, RunResult, Stage, StageStatus};
use crate::telemetry::ProgressEvent;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde_json::json;
use std::path::PathBuf;

/// One line per observed stage change, written to stderr while the run is live.
pub fn format_stage_change(stage: Stage, status: StageStatus) -> String {
    format!("[{:>6}] {}", stage.as_str(), colored_status(status))
}

pub fn format_run_text(result: &RunResult, event_count: usize, written: &[PathBuf]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Run")));
    out.push_str(&format!("  Run id: {}\n", result.run_id));
    out.push_str(&format!("  Progress events: {}\n\n", event_count));

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Stage", "Status"]);
    for (stage, status) in result.state.iter() {
        table.add_row(vec![stage.as_str().to_string(), status.as_str().to_string()]);
    }
    out.push_str(&format!("{}\n\n", table));

    match &result.outcome {
        RunOutcome::Completed(artifacts) => {
            out.push_str(&format!(
                "  Script: {} paragraphs\n  Images: {}\n  Audio: {}\n  Video: {}\n",
                artifacts.script.len(),
                artifacts.images().len(),
                artifacts.audio,
                artifacts.video
            ));
        }
        RunOutcome::Aborted { error, .. } => {
            let stage = error
                .stage()
                .map(|s| s.as_str())
                .unwrap_or("-");
            out.push_str(&format!("  Failed stage: {}\n  Error: {}\n", stage, error));
        }
    }

    if !written.is_empty() {
        out.push_str(&format!("\n  Wrote {} file(s):\n", written.len()));
        for path in written {
            out.push_str(&format!("    {}\n", path.display()));
        }
    }
    out.trim_end().to_string()
}

pub fn format_run_json(
    result: &RunResult,
    events: &[ProgressEvent],
    written: &[PathBuf],
) -> Result<String, ApiError> {
    let outcome = match &result.outcome {
        RunOutcome::Completed(artifacts) => json!({
            "status": "completed",
            "script": artifacts.script.paragraphs(),
            "image_sets": artifacts.image_sets.iter().map(|set| json!({
                "paragraph_index": set.paragraph_index,
                "images": set.images.iter().map(|i| i.to_string()).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
            "audio": artifacts.audio.to_string(),
            "video": artifacts.video.to_string(),
        }),
        RunOutcome::Aborted { error, .. } => json!({
            "status": "aborted",
            "error": {
                "kind": error.kind(),
                "stage": error.stage(),
                "cause": error.cause(),
                "message": error.to_string(),
            },
        }),
    };
    let out = json!({
        "run_id": result.run_id,
        "state": result.state,
        "transitions": result.transitions,
        "outcome": outcome,
        "events": events,
        "files": written.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
    });
    to_json_pretty(&out)
}
