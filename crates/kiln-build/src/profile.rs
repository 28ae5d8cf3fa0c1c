//! Build profile management
//!
//! Provides build configuration profiles (dev, release, custom) with
//! optimization levels and debug settings that feed the compiler arguments.

use crate::error::{BuildError, BuildResult};
use kiln_config::ProfileSection;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Optimization level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OptLevel {
    /// No optimization (fast compilation)
    #[default]
    O0,
    /// Basic optimization
    O1,
    /// Full optimization (default for release)
    O2,
    /// Aggressive optimization
    O3,
}

impl OptLevel {
    /// Convert a numeric level from the manifest
    pub fn from_level(level: u8) -> BuildResult<Self> {
        match level {
            0 => Ok(Self::O0),
            1 => Ok(Self::O1),
            2 => Ok(Self::O2),
            3 => Ok(Self::O3),
            n => Err(BuildError::Configuration(format!(
                "optimization level must be between 0 and 3, got {}",
                n
            ))),
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            Self::O0 => 0,
            Self::O1 => 1,
            Self::O2 => 2,
            Self::O3 => 3,
        }
    }
}

/// Build profile
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Profile {
    /// Development profile (default)
    #[default]
    Dev,
    /// Release profile (optimized)
    Release,
    /// Custom profile declared in kiln.toml
    Custom(String),
}

impl Profile {
    /// Parse profile from string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "debug" => Self::Dev,
            "release" => Self::Release,
            _ => Self::Custom(s.to_string()),
        }
    }

    /// Get profile name
    pub fn name(&self) -> &str {
        match self {
            Self::Dev => "dev",
            Self::Release => "release",
            Self::Custom(name) => name,
        }
    }

    /// Check if this is a built-in profile
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Dev | Self::Release)
    }

    /// Get default configuration for this profile
    pub fn default_config(&self) -> ProfileConfig {
        match self {
            Self::Dev => ProfileConfig {
                name: "dev".to_string(),
                opt_level: OptLevel::O0,
                debug_info: true,
                defines: Vec::new(),
            },
            Self::Release => ProfileConfig {
                name: "release".to_string(),
                opt_level: OptLevel::O2,
                debug_info: false,
                defines: vec!["NDEBUG".to_string()],
            },
            Self::Custom(name) => ProfileConfig {
                name: name.clone(),
                ..Self::Dev.default_config()
            },
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Resolved profile configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProfileConfig {
    /// Profile name
    pub name: String,
    /// Optimization level
    pub opt_level: OptLevel,
    /// Include debug information
    pub debug_info: bool,
    /// Preprocessor defines added to every compile
    pub defines: Vec<String>,
}

impl ProfileConfig {
    /// Create from profile with defaults
    pub fn from_profile(profile: &Profile) -> Self {
        profile.default_config()
    }

    /// Merge with a `[profile.<name>]` section
    pub fn merge_with_manifest(&mut self, section: &ProfileSection) -> BuildResult<()> {
        if let Some(level) = section.opt_level {
            self.opt_level = OptLevel::from_level(level)?;
        }
        if let Some(debug) = section.debug_info {
            self.debug_info = debug;
        }
        for define in &section.defines {
            if !self.defines.contains(define) {
                self.defines.push(define.clone());
            }
        }
        Ok(())
    }

    /// Create a custom profile, starting from an optional built-in base
    pub fn from_custom(
        name: String,
        section: &ProfileSection,
        base_profile: Option<&Profile>,
    ) -> BuildResult<Self> {
        let mut config = base_profile
            .unwrap_or(&Profile::Dev)
            .default_config();

        config.name = name;
        config.merge_with_manifest(section)?;
        Ok(config)
    }
}

/// Profile manager - handles profile loading and configuration
pub struct ProfileManager {
    /// Available profiles
    profiles: HashMap<String, ProfileConfig>,
}

impl ProfileManager {
    /// Create new profile manager
    pub fn new() -> Self {
        let mut profiles = HashMap::new();

        profiles.insert("dev".to_string(), Profile::Dev.default_config());
        profiles.insert("release".to_string(), Profile::Release.default_config());

        Self { profiles }
    }

    /// Load profiles from the manifest's `[profile.*]` tables
    pub fn load_from_manifest(
        &mut self,
        sections: &BTreeMap<String, ProfileSection>,
    ) -> BuildResult<()> {
        for (name, section) in sections {
            let profile = Profile::from_str(name);
            let config = if profile.is_builtin() {
                // Override built-in profile
                let mut config = profile.default_config();
                config.merge_with_manifest(section)?;
                config
            } else {
                let base = match &section.inherits {
                    Some(inherits) => {
                        let base = Profile::from_str(inherits);
                        if !base.is_builtin() {
                            return Err(BuildError::ProfileNotFound(format!(
                                "{} (inherited by '{}')",
                                inherits, name
                            )));
                        }
                        Some(base)
                    }
                    None => None,
                };
                ProfileConfig::from_custom(name.clone(), section, base.as_ref())?
            };

            self.profiles.insert(profile.name().to_string(), config);
        }

        Ok(())
    }

    /// Get profile configuration
    pub fn get(&self, profile: &Profile) -> BuildResult<ProfileConfig> {
        let name = profile.name();
        self.profiles
            .get(name)
            .cloned()
            .ok_or_else(|| BuildError::ProfileNotFound(name.to_string()))
    }

    /// Check if profile exists
    pub fn has_profile(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// List all available profiles
    pub fn list_profiles(&self) -> Vec<String> {
        let mut names: Vec<_> = self.profiles.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ProfileManager {
    fn default() -> Self {
        Self::new()
    }
}
