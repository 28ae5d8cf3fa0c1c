//! Kiln build orchestration
//!
//! Turns a workspace of native projects into Ninja build descriptions and
//! drives the external executor over them:
//! - Toolchain resolution per (platform, compiler family)
//! - Source discovery and graph planning
//! - Idempotent, fingerprinted description writing
//! - Staged reflection codegen (metaprogram, then generated sources)
//! - Multi-project composition through published artifacts

pub mod builder;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod fingerprint;
pub mod graph;
pub mod ninja;
pub mod planner;
pub mod platform;
pub mod profile;
pub mod project;
pub mod project_graph;
pub mod reflection;
pub mod settings;
pub mod toolchain;
pub mod writer;

// Re-export main types
pub use builder::{BuildOutcome, BuildStats, Builder};
pub use discovery::{discover_descriptors, discover_sources, SourceFile, SourceKind};
pub use error::{BuildError, BuildResult};
pub use executor::{ExecOutput, Executor};
pub use fingerprint::Fingerprint;
pub use graph::{BuildGraph, BuildNode, DepListing, NodeKind, Rule};
pub use planner::GraphPlanner;
pub use platform::Platform;
pub use profile::{OptLevel, Profile, ProfileConfig, ProfileManager};
pub use project::Project;
pub use project_graph::{ProjectGraph, ProjectReport};
pub use reflection::{CodegenConfig, CodegenReport, CodegenStage, ReflectionPipeline};
pub use settings::{BuildSettings, SettingsOverrides};
pub use toolchain::{
    ArtifactKind, CompileOptions, CompilerFamily, DepsFormat, FlagStyle, LinkOptions,
    ToolchainProfile,
};
pub use writer::{GraphWriter, Staleness, WriteReason, WriteResult};
