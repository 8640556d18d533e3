//! CLI output: error mapping and the command result surface.

use crate::error::ApiError;

/// Rendered command result. `exit_code` is non-zero when the command ran but
/// its work did not succeed (an aborted run).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exit_code: 0,
        }
    }

    pub fn with_exit_code(text: impl Into<String>, exit_code: i32) -> Self {
        Self {
            text: text.into(),
            exit_code,
        }
    }
}

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::ProviderNotConfigured(_) => format!(
            "{}\nSet provider.api_key, export the variable named by provider.api_key_env, or use --provider offline.",
            e
        ),
        _ => e.to_string(),
    }
}
