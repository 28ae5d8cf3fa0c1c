/// Build system error types
use kiln_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Unsupported toolchain: {family} is not available on {platform}")]
    UnsupportedToolchain { platform: String, family: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(
        "Source collision: '{}' and '{}' both compile to object '{object}'",
        first.display(),
        second.display()
    )]
    SourceCollision {
        object: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("{tool} failed with exit code {code}\n{output}")]
    ExternalToolFailure {
        tool: String,
        code: i32,
        output: String,
    },

    #[error("Missing artifact {}: run the {stage} stage first", artifact.display())]
    MissingArtifact { artifact: PathBuf, stage: String },

    #[error("Two build edges produce the same output: {}", output.display())]
    DuplicateOutput { output: PathBuf },

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Project '{project}' depends on unknown project '{dependency}'")]
    UnknownProject { project: String, dependency: String },

    #[error("Source root does not exist: {}", root.display())]
    SourceRootMissing { root: PathBuf },

    #[error("Invalid build graph: {0}")]
    InvalidGraph(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a missing artifact error naming the stage that produces it
    pub fn missing_artifact(artifact: impl Into<PathBuf>, stage: impl Into<String>) -> Self {
        Self::MissingArtifact {
            artifact: artifact.into(),
            stage: stage.into(),
        }
    }

    /// Create an external tool failure
    pub fn tool_failure(tool: impl Into<String>, code: i32, output: impl Into<String>) -> Self {
        Self::ExternalToolFailure {
            tool: tool.into(),
            code,
            output: output.into(),
        }
    }

    /// Process exit code for this failure
    ///
    /// A failing child's code is passed through; everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ExternalToolFailure { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}
