//! Integration tests for layered configuration loading

use crate::integration::with_env;
use reelgen::config::{ConfigLoader, ProviderType};
use reelgen::pipeline::{FanOutPolicy, OrchestratorOptions};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn isolated_env<'a>(home: &'a str, extra: &[(&'a str, Option<&'a str>)]) -> Vec<(&'a str, Option<&'a str>)> {
    let mut vars = vec![
        ("HOME", Some(home)),
        ("XDG_CONFIG_HOME", None),
        ("REELGEN_ENV", None),
        ("REELGEN__PIPELINE__MAX_POLL_ATTEMPTS", None),
        ("REELGEN__PROVIDER__PROVIDER_TYPE", None),
    ];
    for (key, value) in extra {
        vars.retain(|(k, _)| k != key);
        vars.push((*key, *value));
    }
    vars
}

#[test]
fn workspace_file_overrides_global_file() {
    let temp = TempDir::new().unwrap();
    let home = temp.path().join("home");
    let workspace = temp.path().join("workspace");
    fs::create_dir_all(home.join(".config/reelgen")).unwrap();
    fs::create_dir_all(workspace.join("config")).unwrap();

    fs::write(
        home.join(".config/reelgen/config.toml"),
        r#"
[provider]
provider_name = "global"
voice = "nova"

[pipeline]
poll_interval_secs = 7
"#,
    )
    .unwrap();
    fs::write(
        workspace.join("config/config.toml"),
        r#"
[provider]
provider_name = "workspace"

[pipeline]
max_concurrent_images = 2
"#,
    )
    .unwrap();

    let home_str = home.to_string_lossy().to_string();
    let config = with_env(&isolated_env(&home_str, &[]), || {
        ConfigLoader::load(&workspace).unwrap()
    });

    assert_eq!(config.provider.provider_name, "workspace");
    assert_eq!(config.provider.voice, "nova");
    assert_eq!(config.pipeline.poll_interval_secs, 7);
    assert_eq!(config.pipeline.max_concurrent_images, Some(2));
    assert!(config.validate().is_ok());
}

#[test]
fn environment_specific_file_and_env_vars_win() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("workspace");
    fs::create_dir_all(workspace.join("config")).unwrap();
    fs::write(
        workspace.join("config/config.toml"),
        "[pipeline]\nmax_poll_attempts = 10\nfan_out_policy = \"fail_fast\"\n",
    )
    .unwrap();
    fs::write(
        workspace.join("config/staging.toml"),
        "[pipeline]\nmax_poll_attempts = 20\nfan_out_policy = \"continue_on_failure\"\n",
    )
    .unwrap();

    let home_str = temp.path().join("home").to_string_lossy().to_string();
    let vars = isolated_env(
        &home_str,
        &[
            ("REELGEN_ENV", Some("staging")),
            ("REELGEN__PIPELINE__MAX_POLL_ATTEMPTS", Some("30")),
            ("REELGEN__PROVIDER__PROVIDER_TYPE", Some("offline")),
        ],
    );
    let config = with_env(&vars, || ConfigLoader::load(&workspace).unwrap());

    assert_eq!(config.pipeline.max_poll_attempts, 30);
    assert_eq!(config.pipeline.fan_out_policy, FanOutPolicy::ContinueOnFailure);
    assert_eq!(config.provider.provider_type, ProviderType::Offline);
}

#[test]
fn empty_workspace_yields_defaults() {
    let temp = TempDir::new().unwrap();
    let home_str = temp.path().join("home").to_string_lossy().to_string();
    let config = with_env(&isolated_env(&home_str, &[]), || {
        ConfigLoader::load(temp.path()).unwrap()
    });

    assert_eq!(config.provider.provider_type, ProviderType::OpenaiCompatible);
    assert_eq!(config.pipeline.poll_interval_secs, 5);
    assert_eq!(config.pipeline.max_poll_duration_secs, 900);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn pipeline_config_maps_onto_orchestrator_options() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("reelgen.toml");
    fs::write(
        &file,
        r#"
[pipeline]
poll_interval_secs = 2
max_poll_attempts = 9
max_poll_duration_secs = 60
stage_timeout_secs = 45
max_concurrent_images = 3
"#,
    )
    .unwrap();

    let home_str = temp.path().join("home").to_string_lossy().to_string();
    let config = with_env(&isolated_env(&home_str, &[]), || {
        ConfigLoader::load_from_file(&file).unwrap()
    });
    let options = OrchestratorOptions::from(&config.pipeline);

    assert_eq!(options.poll.interval, Duration::from_secs(2));
    assert_eq!(options.poll.max_attempts, 9);
    assert_eq!(options.poll.max_duration, Duration::from_secs(60));
    assert_eq!(options.stage_timeout, Some(Duration::from_secs(45)));
    assert_eq!(options.fan_out.max_concurrent, Some(3));
    assert_eq!(options.fan_out.policy, FanOutPolicy::FailFast);
}

#[test]
fn malformed_values_are_reported() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("reelgen.toml");
    fs::write(&file, "[pipeline]\nfan_out_policy = \"best_effort\"\n").unwrap();

    let home_str = temp.path().join("home").to_string_lossy().to_string();
    let result = with_env(&isolated_env(&home_str, &[]), || {
        ConfigLoader::load_from_file(&file)
    });
    assert!(result.is_err());
}
