//! CLI command handlers.

pub mod ask;
pub mod serve;

use std::path::PathBuf;

use anyhow::Result;
use quarry_config::{LoadOptions, LoadedConfig};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file from `--config`.
    pub config_path: Option<PathBuf>,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Discover and merge configuration, printing load warnings.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded = quarry_config::load_config_with_options(&LoadOptions {
            explicit_file: self.config_path.clone(),
            ..Default::default()
        })?;

        for warning in &loaded.warnings {
            eprintln!("warning: {}", warning);
        }

        if self.verbose {
            let sources = loaded.loaded_from();
            if sources.is_empty() {
                eprintln!("No config files found, using defaults + CLI args");
            } else {
                for source in sources {
                    eprintln!("Loaded config: {}", source.display());
                }
            }
        }

        Ok(loaded)
    }
}
