//! Config command output.

use crate::cli::presentation::shared::to_json_pretty;
use crate::config::{ReelConfig, ValidationError};
use crate::error::ApiError;

const REDACTED: &str = "********";

/// Render the merged configuration. Inline API keys are never printed.
pub fn format_config_text(config: &ReelConfig, format: &str) -> Result<String, ApiError> {
    let mut shown = config.clone();
    if shown.provider.api_key.is_some() {
        shown.provider.api_key = Some(REDACTED.to_string());
    }
    match format {
        "json" => {
            let value = serde_json::to_value(&shown)
                .map_err(|e| ApiError::ConfigError(format!("Failed to serialize config: {}", e)))?;
            to_json_pretty(&value)
        }
        "toml" => toml::to_string_pretty(&shown)
            .map_err(|e| ApiError::ConfigError(format!("Failed to serialize config: {}", e))),
        other => Err(ApiError::InvalidInput(format!(
            "Unknown format '{}' (expected toml or json)",
            other
        ))),
    }
}

pub fn format_validation_text(result: &Result<(), Vec<ValidationError>>) -> String {
    match result {
        Ok(()) => "Configuration is valid".to_string(),
        Err(errors) => {
            let mut s = format!("Configuration has {} error(s):", errors.len());
            for e in errors {
                s.push_str(&format!("\n  - {}", e));
            }
            s
        }
    }
}
