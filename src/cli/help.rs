//! Command names used for progress sessions and log lines.

use crate::cli::parse::{Commands, ConfigCommands};

/// Command name string for session records (e.g. "run", "config.show").
pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Run { .. } => "run".to_string(),
        Commands::Thumbnail { .. } => "thumbnail".to_string(),
        Commands::Config { command } => format!("config.{}", config_command_name(command)),
    }
}

pub fn config_command_name(command: &ConfigCommands) -> &'static str {
    match command {
        ConfigCommands::Show { .. } => "show",
        ConfigCommands::Validate => "validate",
    }
}
