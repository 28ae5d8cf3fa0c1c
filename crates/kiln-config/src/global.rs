//! Global Configuration (~/.kiln/config.toml)
//!
//! Handles user-level configuration stored in `~/.kiln/config.toml`.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.kiln/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Executor settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor: Option<ExecutorConfig>,
}

/// Default settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Preferred compiler family when a workspace does not pick one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<String>,

    /// Preferred build profile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

/// Executor settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Path to the ninja-compatible executor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(defaults) = &self.defaults {
            if let Some(toolchain) = &defaults.toolchain {
                if toolchain.trim().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "defaults.toolchain".to_string(),
                        reason: "toolchain cannot be empty".to_string(),
                    });
                }
            }
        }

        if let Some(executor) = &self.executor {
            if let Some(path) = &executor.path {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "executor.path".to_string(),
                        reason: "path cannot be empty".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Get the global config file path (~/.kiln/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".kiln").join("config.toml"))
    }

    /// Get the default toolchain
    pub fn default_toolchain(&self) -> Option<&str> {
        self.defaults.as_ref().and_then(|d| d.toolchain.as_deref())
    }

    /// Get the default profile
    pub fn default_profile(&self) -> Option<&str> {
        self.defaults.as_ref().and_then(|d| d.profile.as_deref())
    }

    /// Get the executor path
    pub fn executor_path(&self) -> Option<&Path> {
        self.executor.as_ref().and_then(|e| e.path.as_deref())
    }

    /// Merge another global config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &GlobalConfig) {
        if other.defaults.is_some() {
            self.defaults = other.defaults.clone();
        }
        if other.executor.is_some() {
            self.executor = other.executor.clone();
        }
    }
}
