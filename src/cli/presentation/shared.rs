//! Shared presentation helpers.

use crate::error::ApiError;
use crate::pipeline::StageStatus;
use owo_colors::OwoColorize;

pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn colored_status(status: StageStatus) -> String {
    match status {
        StageStatus::Idle => format!("{}", status.as_str().dimmed()),
        StageStatus::Running => format!("{}", status.as_str().yellow()),
        StageStatus::Done => format!("{}", status.as_str().green()),
        StageStatus::Error => format!("{}", status.as_str().red().bold()),
    }
}

pub fn to_json_pretty(value: &serde_json::Value) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::ConfigError(format!("Failed to serialize output: {}", e)))
}
