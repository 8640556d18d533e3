//! CLI parse: clap types for reelgen. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// reelgen - Generate short narrated videos from a topic
#[derive(Parser)]
#[command(name = "reelgen")]
#[command(about = "Generate a script, images, narration and video from a topic")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (config/ is read from here)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline for a topic
    Run {
        /// Topic the script is written about
        topic: String,
        /// Directory to write decoded artifacts into
        #[arg(long)]
        out: Option<PathBuf>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Override the configured provider type (openai_compatible or offline)
        #[arg(long)]
        provider: Option<String>,
    },
    /// Interactively generate and refine a thumbnail image
    Thumbnail {
        /// Prompt for the initial image
        prompt: String,
        /// Directory to save versions into (defaults to refinement.output_dir)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Override the configured provider type (openai_compatible or offline)
        #[arg(long)]
        provider: Option<String>,
    },
    /// Inspect the resolved configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the merged configuration (API key redacted)
    Show {
        /// Output format (toml or json)
        #[arg(long, default_value = "toml")]
        format: String,
    },
    /// Validate the merged configuration
    Validate,
}
