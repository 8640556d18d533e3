//! CLI presentation: text and JSON formatting for command results.

mod config;
mod run;
mod shared;
mod thumbnail;

pub use config::{format_config_text, format_validation_text};
pub use run::{format_run_json, format_run_text, format_stage_change};
pub use thumbnail::format_history_text;
