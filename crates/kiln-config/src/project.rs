//! Project sections (`[[project]]` in kiln.toml)
//!
//! Each section describes one native sub-project: where its sources live,
//! which artifact it produces, and which other projects it links against.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Artifact kind requested by a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    /// Runnable program
    Executable,
    /// Dynamically loaded library
    Shared,
    /// Archive of object files
    Static,
}

impl std::fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Executable => write!(f, "executable"),
            Self::Shared => write!(f, "shared"),
            Self::Static => write!(f, "static"),
        }
    }
}

/// One `[[project]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    /// Project name, also the artifact base name
    pub name: String,

    /// Project directory, relative to the workspace root
    pub root: PathBuf,

    /// Artifact kind
    pub kind: ProjectKind,

    /// Source directory relative to `root` (default: "src")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<PathBuf>,

    /// Source file extension (default: "cpp")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,

    /// Build directory relative to `root` (default: "build")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<PathBuf>,

    /// Projects whose published artifacts this one links against
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Include directories, relative to the workspace root
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_dirs: Vec<PathBuf>,

    /// Preprocessor defines (`NAME` or `NAME=VALUE`)
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub defines: Vec<String>,

    /// Extra compiler flags, passed through verbatim
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub compiler_flags: Vec<String>,

    /// Library search directories, relative to the workspace root
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub library_dirs: Vec<PathBuf>,

    /// System or prebuilt libraries to link
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<String>,

    /// Extra linker flags, passed through verbatim
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub linker_flags: Vec<String>,

    /// Language standard (default: "c++17")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard: Option<String>,

    /// Silence compiler warnings
    #[serde(default)]
    pub suppress_warnings: bool,

    /// Precompiled header, relative to `root`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pch: Option<PathBuf>,

    /// Compile the codegen stage's generated sources into this project
    #[serde(default)]
    pub generated: bool,

    /// Arguments passed to the executable by `kiln run`
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub run_args: Vec<String>,
}

impl ProjectSection {
    /// Create a section with defaults for everything but the essentials
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, kind: ProjectKind) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            kind,
            source_dir: None,
            extension: None,
            build_dir: None,
            dependencies: Vec::new(),
            include_dirs: Vec::new(),
            defines: Vec::new(),
            compiler_flags: Vec::new(),
            library_dirs: Vec::new(),
            libraries: Vec::new(),
            linker_flags: Vec::new(),
            standard: None,
            suppress_warnings: false,
            pch: None,
            generated: false,
            run_args: Vec::new(),
        }
    }

    /// Source directory relative to the project root
    pub fn source_dir(&self) -> PathBuf {
        self.source_dir.clone().unwrap_or_else(|| PathBuf::from("src"))
    }

    /// Source file extension
    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or("cpp")
    }

    /// Build directory relative to the project root
    pub fn build_dir(&self) -> PathBuf {
        self.build_dir.clone().unwrap_or_else(|| PathBuf::from("build"))
    }

    /// Language standard
    pub fn standard(&self) -> &str {
        self.standard.as_deref().unwrap_or("c++17")
    }

    /// Validate the section in isolation
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "project.name".to_string(),
                reason: "name cannot be empty".to_string(),
            });
        }

        if !is_valid_name(&self.name) {
            return Err(ConfigError::InvalidValue {
                field: format!("project '{}'", self.name),
                reason: "name may only contain letters, digits, '-' and '_'".to_string(),
            });
        }

        if let Some(ext) = &self.extension {
            if ext.is_empty() || ext.starts_with('.') {
                return Err(ConfigError::InvalidValue {
                    field: format!("project '{}'.extension", self.name),
                    reason: format!("expected a bare extension like \"cpp\", got '{}'", ext),
                });
            }
        }

        if self.dependencies.iter().any(|d| d == &self.name) {
            return Err(ConfigError::InvalidValue {
                field: format!("project '{}'.dependencies", self.name),
                reason: "a project cannot depend on itself".to_string(),
            });
        }

        Ok(())
    }
}

/// Project names become file names, so keep them portable
fn is_valid_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
