//! Native sub-projects
//!
//! A [`Project`] is a `[[project]]` section with every path resolved against
//! the workspace root. It produces one build graph per invocation.

use crate::discovery::{self, SourceFile};
use crate::error::BuildResult;
use crate::graph::BuildGraph;
use crate::ninja::DESCRIPTION_FILE;
use crate::planner::GraphPlanner;
use crate::settings::BuildSettings;
use crate::toolchain::{ArtifactKind, CompileOptions, LinkOptions};
use kiln_config::ProjectSection;
use std::path::{Path, PathBuf};

/// One native project with resolved paths
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub name: String,
    /// Project directory
    pub root: PathBuf,
    pub source_dir: PathBuf,
    /// Source extension, without the dot
    pub extension: String,
    pub kind: ArtifactKind,
    /// Names of projects whose published artifacts are linked in
    pub dependencies: Vec<String>,
    pub compile: CompileOptions,
    pub link: LinkOptions,
    /// Precompiled header
    pub pch: Option<PathBuf>,
    /// Compiles the codegen stage's outputs
    pub generated: bool,
    pub run_args: Vec<String>,
    pub build_dir: PathBuf,
}

impl Project {
    /// Resolve a manifest section against the workspace root
    ///
    /// Include and library directories are workspace-relative; the source,
    /// build and pch paths are relative to the project root.
    pub fn from_section(section: &ProjectSection, workspace_root: &Path) -> Self {
        let root = workspace_root.join(&section.root);

        Self {
            name: section.name.clone(),
            source_dir: root.join(section.source_dir()),
            build_dir: root.join(section.build_dir()),
            pch: section.pch.as_ref().map(|p| root.join(p)),
            root,
            extension: section.extension().to_string(),
            kind: section.kind.into(),
            dependencies: section.dependencies.clone(),
            compile: CompileOptions {
                include_dirs: section
                    .include_dirs
                    .iter()
                    .map(|d| workspace_root.join(d))
                    .collect(),
                defines: section.defines.clone(),
                extra_flags: section.compiler_flags.clone(),
                standard: Some(section.standard().to_string()),
                suppress_warnings: section.suppress_warnings,
            },
            link: LinkOptions {
                library_dirs: section
                    .library_dirs
                    .iter()
                    .map(|d| workspace_root.join(d))
                    .collect(),
                libraries: section.libraries.clone(),
                extra_flags: section.linker_flags.clone(),
            },
            generated: section.generated,
            run_args: section.run_args.clone(),
        }
    }

    /// Where this project's build description lives
    pub fn description_path(&self) -> PathBuf {
        self.build_dir.join(DESCRIPTION_FILE)
    }

    /// Hand-written sources, sorted
    pub fn discover_sources(&self) -> BuildResult<Vec<SourceFile>> {
        discovery::discover_sources(&self.source_dir, &self.extension)
    }

    /// Planner carrying this project's flags
    pub fn planner<'a>(&self, settings: &'a BuildSettings) -> GraphPlanner<'a> {
        let tc = &settings.toolchain;
        let planner = GraphPlanner::new(tc, &self.build_dir)
            .with_compile_args(tc.compile_args(&self.compile, &settings.profile, self.kind))
            .with_link_args(tc.link_args(&self.link, &settings.profile, self.kind));

        match &self.pch {
            Some(header) => planner.with_pch(header),
            None => planner,
        }
    }

    /// Plan this project's graph
    pub fn plan(
        &self,
        settings: &BuildSettings,
        link_inputs: Vec<PathBuf>,
        generated: Vec<SourceFile>,
    ) -> BuildResult<BuildGraph> {
        let sources = self.discover_sources()?;
        self.planner(settings)
            .with_link_inputs(link_inputs)
            .with_generated(generated)
            .plan(&sources, &self.name, self.kind)
    }

    /// Artifact path inside the build directory
    pub fn artifact_path(&self, settings: &BuildSettings) -> PathBuf {
        self.build_dir
            .join(settings.toolchain.artifact_name(&self.name, self.kind))
    }

    /// Artifact path once published to the bin dir
    pub fn published_path(&self, settings: &BuildSettings) -> PathBuf {
        settings
            .bin_dir
            .join(settings.toolchain.artifact_name(&self.name, self.kind))
    }

    /// Published file dependents link against
    ///
    /// The import library for windows shared libraries, the artifact itself
    /// otherwise.
    pub fn linkable_path(&self, settings: &BuildSettings) -> PathBuf {
        settings
            .bin_dir
            .join(settings.toolchain.linkable_name(&self.name, self.kind))
    }

    pub fn is_executable(&self) -> bool {
        self.kind == ArtifactKind::Executable
    }
}
