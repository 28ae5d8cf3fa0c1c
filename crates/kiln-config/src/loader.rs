//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::GlobalConfig;
use crate::workspace::{StalenessSetting, WorkspaceManifest};
use crate::{ConfigError, ConfigResult, MANIFEST_FILE};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.kiln/config.toml) - lowest priority
/// 2. Workspace manifest (./kiln.toml) - overrides global
/// 3. Environment variables (KILN_*) - overrides the manifest
/// 4. CLI flags - highest priority (handled by caller)
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace manifest, with environment overrides applied
    pub workspace: WorkspaceManifest,

    /// Global configuration
    pub global: GlobalConfig,

    /// Workspace root directory (where kiln.toml was found)
    pub root: PathBuf,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use a specific global config file instead of ~/.kiln/config.toml
    pub fn with_global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find kiln.toml, then loads and merges
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (root, manifest) = self.find_workspace_manifest(start_dir)?;
        let global = self.load_global_config()?;
        let workspace = self.apply_env_overrides(manifest)?;

        Ok(Config {
            workspace,
            global,
            root,
        })
    }

    /// Load configuration from a specific manifest file
    pub fn load_from_file(&mut self, manifest_path: &Path) -> ConfigResult<Config> {
        let manifest = WorkspaceManifest::load_from_file(manifest_path)?;
        let global = self.load_global_config()?;
        let workspace = self.apply_env_overrides(manifest)?;

        let root = manifest_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Config {
            workspace,
            global,
            root,
        })
    }

    /// Find the workspace manifest by walking up the directory tree
    fn find_workspace_manifest(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(PathBuf, WorkspaceManifest)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let manifest_path = current.join(MANIFEST_FILE);

            if manifest_path.exists() {
                let manifest = WorkspaceManifest::load_from_file(&manifest_path)?;
                return Ok((current, manifest));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Err(ConfigError::NotFound(start_dir.join(MANIFEST_FILE))),
            }
        }
    }

    /// Load global configuration from ~/.kiln/config.toml
    ///
    /// A missing file (or a missing home directory) yields the default config;
    /// a present but malformed file is an error.
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        if self.global_config_path.is_none() {
            match GlobalConfig::global_config_path() {
                Ok(path) => self.global_config_path = Some(path),
                Err(ConfigError::HomeNotFound) => return Ok(GlobalConfig::default()),
                Err(e) => return Err(e),
            }
        }

        match self.global_config_path.as_deref() {
            Some(path) if path.exists() => GlobalConfig::load_from_file(path),
            _ => Ok(GlobalConfig::default()),
        }
    }

    /// Apply environment variable overrides to the workspace manifest
    ///
    /// KILN_TOOLCHAIN, KILN_PROFILE and KILN_EXECUTOR replace the matching
    /// `[workspace]` keys; KILN_STALENESS accepts "fingerprint" or "existence".
    fn apply_env_overrides(&self, mut manifest: WorkspaceManifest) -> ConfigResult<WorkspaceManifest> {
        if let Some(toolchain) = non_empty_var("KILN_TOOLCHAIN") {
            manifest.workspace.toolchain = Some(toolchain);
        }

        if let Some(profile) = non_empty_var("KILN_PROFILE") {
            manifest.workspace.profile = Some(profile);
        }

        if let Some(executor) = non_empty_var("KILN_EXECUTOR") {
            manifest.workspace.executor = Some(PathBuf::from(executor));
        }

        if let Some(staleness) = non_empty_var("KILN_STALENESS") {
            manifest.workspace.staleness = Some(match staleness.to_lowercase().as_str() {
                "fingerprint" => StalenessSetting::Fingerprint,
                "existence" => StalenessSetting::Existence,
                other => {
                    return Err(ConfigError::InvalidValue {
                        field: "KILN_STALENESS".to_string(),
                        reason: format!("expected 'fingerprint' or 'existence', got '{}'", other),
                    })
                }
            });
        }

        Ok(manifest)
    }

    /// Get the global configuration directory (~/.kiln)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".kiln"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Effective compiler family override (manifest > global)
    pub fn toolchain(&self) -> Option<&str> {
        self.workspace
            .workspace
            .toolchain
            .as_deref()
            .or_else(|| self.global.default_toolchain())
    }

    /// Effective profile name (manifest > global > "dev")
    pub fn profile(&self) -> &str {
        self.workspace
            .workspace
            .profile
            .as_deref()
            .or_else(|| self.global.default_profile())
            .unwrap_or("dev")
    }

    /// Effective executor program (manifest > global > "ninja")
    pub fn executor(&self) -> PathBuf {
        self.workspace
            .workspace
            .executor
            .as_deref()
            .or_else(|| self.global.executor_path())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("ninja"))
    }

    /// Absolute publish directory
    pub fn bin_dir(&self) -> PathBuf {
        let bin = self
            .workspace
            .workspace
            .bin_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("bin"));
        self.root.join(bin)
    }

    /// Effective staleness policy
    pub fn staleness(&self) -> StalenessSetting {
        self.workspace.workspace.staleness.unwrap_or_default()
    }

    /// Get the workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}
