//! Merge rules: defaults first, then files, then environment. Later sources win per key.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("provider.provider_type", "openai_compatible")?
        .set_default("provider.images_per_paragraph", 3)?
        .set_default("pipeline.poll_interval_secs", 5)?
        .set_default("pipeline.max_poll_attempts", 120)?
        .set_default("pipeline.max_poll_duration_secs", 900)?
        .set_default("pipeline.fan_out_policy", "fail_fast")?
        .set_default("logging.level", "info")
}
