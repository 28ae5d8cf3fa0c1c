//! Workspace Manifest (kiln.toml)
//!
//! Handles the workspace-level manifest stored in `kiln.toml` at the
//! workspace root: shared settings, custom build profiles, the optional
//! codegen stage, and the list of projects.

use crate::project::ProjectSection;
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Workspace manifest from kiln.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceManifest {
    /// Shared workspace settings
    #[serde(default)]
    pub workspace: WorkspaceSection,

    /// Custom or overridden build profiles
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub profile: BTreeMap<String, ProfileSection>,

    /// Reflection/codegen stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codegen: Option<CodegenSection>,

    /// Projects in declaration order
    #[serde(default, rename = "project")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<ProjectSection>,
}

/// `[workspace]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSection {
    /// Workspace name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Shared publish directory for artifacts (default: "bin")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_dir: Option<PathBuf>,

    /// Compiler family override (gcc, clang, msvc)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<String>,

    /// Build profile name (default: "dev")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Build executor program (default: "ninja")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor: Option<PathBuf>,

    /// How existing build descriptions are judged stale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staleness: Option<StalenessSetting>,
}

/// Regeneration policy for build descriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StalenessSetting {
    /// Regenerate when the stored fingerprint no longer matches
    #[default]
    Fingerprint,
    /// Regenerate only when the description is missing
    Existence,
}

/// `[profile.<name>]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProfileSection {
    /// Optimization level (0-3)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opt_level: Option<u8>,

    /// Emit debug information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<bool>,

    /// Built-in profile to start from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherits: Option<String>,

    /// Extra preprocessor defines for every project
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub defines: Vec<String>,
}

/// `[codegen]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CodegenSection {
    /// Metaprogram artifact base name (default: "type_metadata")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Metaprogram sources, relative to the workspace root
    pub metaprogram: Vec<PathBuf>,

    /// Root directory of type-descriptor files
    pub descriptors: PathBuf,

    /// Descriptor file extension (default: "type")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,

    /// Directory receiving generated sources and headers
    pub output: PathBuf,

    /// Build directory for both codegen stages (default: "<descriptors>/../build")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<PathBuf>,
}

impl CodegenSection {
    /// Metaprogram artifact base name
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("type_metadata")
    }

    /// Descriptor extension
    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or("type")
    }

    /// Build directory relative to the workspace root
    pub fn build_dir(&self) -> PathBuf {
        match &self.build_dir {
            Some(dir) => dir.clone(),
            None => self
                .descriptors
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join("build"),
        }
    }
}

impl WorkspaceManifest {
    /// Load the manifest from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let manifest: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate the manifest as a whole
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(toolchain) = &self.workspace.toolchain {
            if toolchain.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "workspace.toolchain".to_string(),
                    reason: "toolchain cannot be empty".to_string(),
                });
            }
        }

        for (name, profile) in &self.profile {
            if let Some(level) = profile.opt_level {
                if level > 3 {
                    return Err(ConfigError::InvalidValue {
                        field: format!("profile.{}.opt_level", name),
                        reason: format!("must be between 0 and 3, got {}", level),
                    });
                }
            }
        }

        if let Some(codegen) = &self.codegen {
            if codegen.metaprogram.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "codegen.metaprogram".to_string(),
                    reason: "at least one metaprogram source is required".to_string(),
                });
            }
            if codegen.extension().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "codegen.extension".to_string(),
                    reason: "extension cannot be empty".to_string(),
                });
            }
        }

        let mut seen = HashSet::new();
        for project in &self.projects {
            project.validate()?;
            if !seen.insert(project.name.as_str()) {
                return Err(ConfigError::DuplicateProject(project.name.clone()));
            }
        }

        for project in &self.projects {
            for dependency in &project.dependencies {
                if !seen.contains(dependency.as_str()) {
                    return Err(ConfigError::UnknownDependency {
                        project: project.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
            if project.generated && self.codegen.is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "project '{}' compiles generated sources but no [codegen] section is declared",
                    project.name
                )));
            }
        }

        Ok(())
    }

    /// Look up a project by name
    pub fn project(&self, name: &str) -> Option<&ProjectSection> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// Workspace name, if declared
    pub fn name(&self) -> Option<&str> {
        self.workspace.name.as_deref()
    }
}
