//! CLI commands driven through RunContext with the offline provider.

use crate::integration::with_env;
use reelgen::cli::{Cli, Commands, ConfigCommands, RunContext};
use reelgen::telemetry::SessionStatus;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const OFFLINE_CONFIG: &str = r#"
[provider]
provider_name = "local"
provider_type = "offline"
images_per_paragraph = 2
api_key = "sk-should-not-print"

[pipeline]
poll_interval_secs = 1
max_poll_duration_secs = 30
"#;

fn offline_context(temp: &TempDir) -> RunContext {
    let file = temp.path().join("reelgen.toml");
    fs::write(&file, OFFLINE_CONFIG).unwrap();
    let home = temp.path().join("home").to_string_lossy().to_string();
    with_env(&[("HOME", Some(home.as_str())), ("XDG_CONFIG_HOME", None)], || {
        RunContext::new(temp.path().to_path_buf(), Some(file)).unwrap()
    })
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn run_command_writes_every_artifact() {
    let temp = TempDir::new().unwrap();
    let ctx = offline_context(&temp);
    let out = temp.path().join("out");

    let output = ctx
        .execute(&Commands::Run {
            topic: "coral reefs".to_string(),
            out: Some(out.clone()),
            format: "text".to_string(),
            provider: None,
        })
        .unwrap();

    assert_eq!(output.exit_code, 0, "{}", output.text);
    let names = files_in(&out);
    assert!(names.contains(&"script.txt".to_string()));
    assert!(names.contains(&"image-p01-1.svg".to_string()));
    assert!(names.contains(&"image-p01-2.svg".to_string()));
    assert!(names.contains(&"narration.wav".to_string()));
    assert!(names.contains(&"video.json".to_string()));

    let script = fs::read_to_string(out.join("script.txt")).unwrap();
    assert!(script.contains("coral reefs"));

    let sessions = ctx.progress_runtime().list_sessions();
    let run_session = sessions.iter().find(|s| s.command == "run").unwrap();
    assert_eq!(run_session.status, SessionStatus::Completed);
    assert_eq!(sessions.len(), 2);
}

#[test]
fn config_show_redacts_api_key() {
    let temp = TempDir::new().unwrap();
    let ctx = offline_context(&temp);

    let output = ctx
        .execute(&Commands::Config {
            command: ConfigCommands::Show {
                format: "toml".to_string(),
            },
        })
        .unwrap();

    assert!(output.text.contains("provider_type = \"offline\""));
    assert!(!output.text.contains("sk-should-not-print"));
}

#[test]
fn run_rejects_unknown_output_format() {
    let temp = TempDir::new().unwrap();
    let ctx = offline_context(&temp);

    let result = ctx.execute(&Commands::Run {
        topic: "coral reefs".to_string(),
        out: None,
        format: "yaml".to_string(),
        provider: None,
    });
    assert!(result.is_err());
}

#[test]
fn cli_parses_global_flags_and_run_options() {
    use clap::Parser;

    let cli = Cli::try_parse_from([
        "reelgen",
        "--workspace",
        "/tmp/ws",
        "--log-level",
        "debug",
        "run",
        "deep sea vents",
        "--out",
        "renders",
        "--format",
        "json",
        "--provider",
        "offline",
    ])
    .unwrap();

    assert_eq!(cli.workspace, Path::new("/tmp/ws"));
    assert_eq!(cli.log_level.as_deref(), Some("debug"));
    match cli.command {
        Commands::Run {
            topic,
            out,
            format,
            provider,
        } => {
            assert_eq!(topic, "deep sea vents");
            assert_eq!(out.as_deref(), Some(Path::new("renders")));
            assert_eq!(format, "json");
            assert_eq!(provider.as_deref(), Some("offline"));
        }
        _ => panic!("expected run command"),
    }
}
