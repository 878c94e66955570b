//! Bootstrap configuration file resolution and loading
//!
//! Config file priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config file (`~/.config/<app>/config.toml`)
//! 4. System config file (`/etc/<app>/config.toml`, Linux only)
//!
//! A config file that was only found by convention (3 or 4) is optional:
//! when absent, callers fall back to built-in defaults. A file named
//! explicitly (1 or 2) must exist.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Logging configuration (`[logging]` table)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where a resolved config path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    UserDefault,
    SystemDefault,
}

impl ConfigSource {
    /// Explicitly named config files must exist
    pub fn is_explicit(self) -> bool {
        matches!(self, ConfigSource::CommandLine | ConfigSource::Environment)
    }
}

/// Resolves the bootstrap config file for one application
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    app_name: String,
    env_var: String,
}

impl ConfigResolver {
    /// Create a resolver; the environment variable is `<PREFIX>_CONFIG`,
    /// where the prefix is the app name up to its first `-`, upper-cased.
    pub fn new(app_name: &str) -> Self {
        let prefix = app_name
            .split('-')
            .next()
            .unwrap_or(app_name)
            .to_ascii_uppercase();
        Self {
            app_name: app_name.to_string(),
            env_var: format!("{}_CONFIG", prefix),
        }
    }

    /// Environment variable consulted at priority 2
    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    /// Resolve the config file path, if any candidate applies
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<(PathBuf, ConfigSource)> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Some((path.to_path_buf(), ConfigSource::CommandLine));
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(&self.env_var) {
            if !path.is_empty() {
                return Some((PathBuf::from(path), ConfigSource::Environment));
            }
        }

        // Priority 3: Per-user config directory
        if let Some(path) = dirs::config_dir().map(|d| d.join(&self.app_name).join("config.toml")) {
            if path.exists() {
                return Some((path, ConfigSource::UserDefault));
            }
        }

        // Priority 4: System-wide config (Linux)
        if cfg!(target_os = "linux") {
            let system = PathBuf::from("/etc").join(&self.app_name).join("config.toml");
            if system.exists() {
                return Some((system, ConfigSource::SystemDefault));
            }
        }

        None
    }

    /// Resolve and parse the config file.
    ///
    /// Returns `T::default()` when no file applies. An explicitly named file
    /// that does not exist is an error; a parse failure is always an error.
    pub fn load<T>(&self, cli_arg: Option<&Path>) -> Result<(T, Option<PathBuf>)>
    where
        T: DeserializeOwned + Default,
    {
        let Some((path, source)) = self.resolve(cli_arg) else {
            debug!("No config file found for {}, using defaults", self.app_name);
            return Ok((T::default(), None));
        };

        if !path.exists() {
            if source.is_explicit() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            warn!("Config file {} disappeared, using defaults", path.display());
            return Ok((T::default(), None));
        }

        let config = load_toml_file(&path)?;
        Ok((config, Some(path)))
    }
}

/// Parse a TOML file into `T`
pub fn load_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}
