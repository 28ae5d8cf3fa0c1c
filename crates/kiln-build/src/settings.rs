//! Resolved build settings
//!
//! One immutable value built at startup from the merged configuration and
//! passed explicitly to every stage.

use crate::error::BuildResult;
use crate::platform::Platform;
use crate::profile::{Profile, ProfileConfig, ProfileManager};
use crate::toolchain::{CompilerFamily, ToolchainProfile};
use crate::writer::Staleness;
use kiln_config::Config;
use std::path::PathBuf;

/// Values given on the command line, highest precedence
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub toolchain: Option<String>,
    pub profile: Option<String>,
    pub executor: Option<PathBuf>,
    pub staleness: Option<Staleness>,
    /// Pretend to run on another platform (used to render foreign descriptions)
    pub platform: Option<Platform>,
}

/// Everything a build needs to know about its environment
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Workspace root; project paths are relative to it
    pub root: PathBuf,
    pub platform: Platform,
    pub toolchain: ToolchainProfile,
    pub profile: ProfileConfig,
    /// Shared publish directory
    pub bin_dir: PathBuf,
    /// Executor program
    pub executor: PathBuf,
    pub staleness: Staleness,
}

impl BuildSettings {
    /// Resolve settings from the merged configuration plus CLI overrides
    pub fn resolve(config: &Config, overrides: &SettingsOverrides) -> BuildResult<Self> {
        let platform = match overrides.platform {
            Some(platform) => platform,
            None => Platform::host()?,
        };

        let family = overrides
            .toolchain
            .as_deref()
            .or_else(|| config.toolchain())
            .map(str::parse::<CompilerFamily>)
            .transpose()?;
        let toolchain = ToolchainProfile::resolve(platform, family)?;

        let mut profiles = ProfileManager::new();
        profiles.load_from_manifest(&config.workspace.profile)?;
        let profile_name = overrides.profile.as_deref().unwrap_or_else(|| config.profile());
        let profile = profiles.get(&Profile::from_str(profile_name))?;

        let executor = overrides
            .executor
            .clone()
            .unwrap_or_else(|| config.executor());
        let staleness = overrides
            .staleness
            .unwrap_or_else(|| config.staleness().into());

        Ok(Self {
            root: config.root.clone(),
            platform,
            toolchain,
            profile,
            bin_dir: config.bin_dir(),
            executor,
            staleness,
        })
    }

    /// Settings for the host with default profile and toolchain
    pub fn for_root(root: impl Into<PathBuf>) -> BuildResult<Self> {
        let root = root.into();
        let platform = Platform::host()?;
        Ok(Self {
            bin_dir: root.join("bin"),
            root,
            platform,
            toolchain: ToolchainProfile::resolve(platform, None)?,
            profile: Profile::Dev.default_config(),
            executor: PathBuf::from("ninja"),
            staleness: Staleness::default(),
        })
    }

    pub fn with_executor(mut self, executor: impl Into<PathBuf>) -> Self {
        self.executor = executor.into();
        self
    }

    pub fn with_staleness(mut self, staleness: Staleness) -> Self {
        self.staleness = staleness;
        self
    }

    pub fn with_toolchain(mut self, toolchain: ToolchainProfile) -> Self {
        self.platform = toolchain.platform();
        self.toolchain = toolchain;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::{GlobalConfig, WorkspaceManifest};

    fn config(manifest: &str) -> Config {
        Config {
            workspace: toml::from_str::<WorkspaceManifest>(manifest).unwrap(),
            global: GlobalConfig::default(),
            root: PathBuf::from("/ws"),
        }
    }

    #[test]
    fn test_cli_overrides_win() {
        let config = config("[workspace]\ntoolchain = \"gcc\"\nprofile = \"dev\"\n");
        let overrides = SettingsOverrides {
            toolchain: Some("clang".to_string()),
            profile: Some("release".to_string()),
            platform: Some(Platform::Linux),
            ..Default::default()
        };
        let settings = BuildSettings::resolve(&config, &overrides).unwrap();
        assert_eq!(settings.toolchain.family(), CompilerFamily::Clang);
        assert_eq!(settings.profile.name, "release");
        assert_eq!(settings.bin_dir, PathBuf::from("/ws/bin"));
    }

    #[test]
    fn test_unknown_profile() {
        let config = config("");
        let overrides = SettingsOverrides {
            profile: Some("turbo".to_string()),
            platform: Some(Platform::Linux),
            ..Default::default()
        };
        assert!(BuildSettings::resolve(&config, &overrides).is_err());
    }

    #[test]
    fn test_msvc_on_linux_rejected() {
        let config = config("[workspace]\ntoolchain = \"msvc\"\n");
        let overrides = SettingsOverrides {
            platform: Some(Platform::Linux),
            ..Default::default()
        };
        assert!(BuildSettings::resolve(&config, &overrides).is_err());
    }
}
