//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/quarry/config.toml` (user config, or `QUARRY_CONFIG_DIR`)
//! 2. `./quarry.toml` (project-local)
//! 3. An explicit `--config` file
//! 4. Environment overrides (`QUARRY_MODEL`, `QUARRY_EXECUTOR_URL`, `QUARRY_ARTIFACT_DIR`)
//! 5. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::{ArtifactsConfig, ConfigError, ExecutorConfig, LlmConfig, QuarryConfig, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "quarry.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for config directory resolution.
const APP_NAME: &str = "quarry";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "QUARRY_CONFIG_DIR";

/// Environment variable overriding `[llm] model`.
pub const MODEL_ENV: &str = "QUARRY_MODEL";

/// Environment variable overriding `[executor] url`.
pub const EXECUTOR_URL_ENV: &str = "QUARRY_EXECUTOR_URL";

/// Environment variable overriding `[artifacts] base_dir`.
pub const ARTIFACT_DIR_ENV: &str = "QUARRY_ARTIFACT_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: QuarryConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading (e.g., plaintext API keys).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Options for [`load_config_with_options`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Directory holding `quarry.toml`. Defaults to the working directory.
    pub project_dir: Option<PathBuf>,
    /// User config directory. Overrides `QUARRY_CONFIG_DIR` and the platform default.
    pub config_dir: Option<PathBuf>,
    /// A file that must exist and parse; merged last.
    pub explicit_file: Option<PathBuf>,
    /// Skip environment overrides.
    pub ignore_env: bool,
}

/// Load configuration by discovering and merging all config layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(&LoadOptions {
        project_dir: project_dir.map(Path::to_path_buf),
        ..Default::default()
    })
}

/// Load configuration with explicit control over every layer.
///
/// Malformed discovered files are skipped with a warning. A malformed or
/// missing explicit file is an error, and so is a merged config that fails
/// [`QuarryConfig::validate`].
pub fn load_config_with_options(options: &LoadOptions) -> Result<LoadedConfig> {
    let mut config = QuarryConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    // 1. User config: explicit override, then env var, then platform default
    let user_config_path = match options.config_dir {
        Some(ref dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    // 2. Project-local config
    let project_path = options
        .project_dir
        .as_ref()
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    // 3. Explicit file
    if let Some(ref path) = options.explicit_file {
        config.merge(load_config_file(path)?);
        sources.push(ConfigSource {
            path: path.clone(),
            loaded: true,
        });
    }

    // 4. Environment
    if !options.ignore_env {
        apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    }

    check_plaintext_keys(&config, &mut warnings);
    config.validate()?;

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<QuarryConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    QuarryConfig::from_toml(&contents)
}

/// Save configuration to a file.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &QuarryConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// Apply `QUARRY_*` environment overrides using `lookup` for env access.
///
/// Overrides touch single keys, creating the section with defaults if needed.
pub fn apply_env_overrides(config: &mut QuarryConfig, lookup: impl Fn(&str) -> Option<String>) {
    let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(model) = lookup(MODEL_ENV) {
        config.llm.get_or_insert_with(LlmConfig::default).model = Some(model);
    }
    if let Some(url) = lookup(EXECUTOR_URL_ENV) {
        config.executor.get_or_insert_with(ExecutorConfig::default).url = url;
    }
    if let Some(dir) = lookup(ARTIFACT_DIR_ENV) {
        config.artifacts.get_or_insert_with(ArtifactsConfig::default).base_dir = PathBuf::from(dir);
    }
}

/// Get the user config file path for quarry.
///
/// Checks `QUARRY_CONFIG_DIR` first, then falls back to the platform default
/// (`~/.config/quarry/config.toml` on Linux).
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the user config directory for quarry.
///
/// Also the parent of the `logs/` and default `sessions/` directories.
pub fn user_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Try to load a config file and merge it into the existing config.
fn load_layer(config: &mut QuarryConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

/// Check for plaintext secrets in the config and emit warnings.
fn check_plaintext_keys(config: &QuarryConfig, warnings: &mut Vec<String>) {
    if let Some(ref llm) = config.llm
        && llm.has_plaintext_api_key()
    {
        warnings.push(format!(
            "[llm] contains a plaintext API key. Consider setting {} instead.",
            llm.api_key_env_var()
        ));
    }

    if let Some(ref executor) = config.executor
        && executor.api_token.is_some()
    {
        warnings.push("[executor] contains a plaintext api_token.".to_string());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
