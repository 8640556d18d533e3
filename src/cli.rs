//! CLI domain: parse, route, output and presentation only.
//! Generation itself lives in the pipeline and refinement modules.

mod artifacts;
mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use artifacts::{write_image, write_run_artifacts};
pub use help::command_name;
pub use output::{map_error, CommandOutput};
pub use parse::{Cli, Commands, ConfigCommands};
pub use presentation::{
    format_config_text, format_history_text, format_run_json, format_run_text,
    format_stage_change, format_validation_text,
};
pub use route::RunContext;
