//! Kiln Configuration System
//!
//! Provides configuration management for kiln workspaces including:
//! - Workspace manifest (kiln.toml): projects, codegen stage, build profiles
//! - Global user configuration (~/.kiln/config.toml)
//! - Environment variable overrides (KILN_*)
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.kiln/config.toml)
//! 2. Workspace manifest (./kiln.toml)
//! 3. Environment variables (KILN_TOOLCHAIN, KILN_PROFILE, KILN_EXECUTOR, KILN_STALENESS)
//! 4. CLI flags (applied by the caller)
//!
//! # Example
//!
//! ```no_run
//! use kiln_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("{} projects", config.workspace.projects.len());
//! ```

pub mod global;
pub mod loader;
pub mod project;
pub mod workspace;

use std::path::PathBuf;
use thiserror::Error;

/// Name of the workspace manifest file
pub const MANIFEST_FILE: &str = "kiln.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Project '{project}' depends on unknown project '{dependency}'")]
    UnknownDependency { project: String, dependency: String },

    #[error("Project '{0}' is declared more than once")]
    DuplicateProject(String),

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader};
pub use project::{ProjectKind, ProjectSection};
pub use workspace::{
    CodegenSection, ProfileSection, StalenessSetting, WorkspaceManifest, WorkspaceSection,
};
