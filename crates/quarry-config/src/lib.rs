//! Configuration system for Quarry.
//!
//! Provides TOML-based configuration with:
//! - One section per concern (`[llm]`, `[agent]`, `[compression]`, `[executor]`,
//!   `[artifacts]`, `[session]`, `[server]`)
//! - Config file layering (user config + project-local + explicit file)
//! - `QUARRY_*` environment overrides
//! - API key resolution (config file → backend env var)
//! - Range validation on load

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ARTIFACT_DIR_ENV, ConfigSource, EXECUTOR_URL_ENV, LoadOptions, LoadedConfig, MODEL_ENV,
    apply_env_overrides, load_config, load_config_file, load_config_with_options, save_config,
    user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
