//! Build orchestration
//!
//! [`Builder`] owns the resolved settings, the project graph and the optional
//! codegen stage, and exposes one method per command-line verb. Every verb
//! runs sequentially and stops at the first failure.

use crate::error::{BuildError, BuildResult};
use crate::executor::{self, Executor};
use crate::project::Project;
use crate::project_graph::{ProjectGraph, ProjectReport};
use crate::reflection::{
    CodegenConfig, CodegenReport, CodegenStage, ReflectionPipeline, CODEGEN_STAGE,
};
use crate::settings::{BuildSettings, SettingsOverrides};
use crate::writer::{GraphWriter, WriteResult};
use kiln_config::Config;
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

/// Build statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildStats {
    /// Projects built and published
    pub projects_built: usize,
    /// Descriptions actually rewritten
    pub descriptions_written: usize,
    /// Time spent in the codegen stages
    pub codegen_time: Duration,
    /// Total build time
    pub total_time: Duration,
}

/// Result of a successful `build`
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    pub codegen: Option<CodegenReport>,
    pub projects: Vec<ProjectReport>,
    pub stats: BuildStats,
}

/// Main builder for orchestrating builds
#[derive(Debug, Clone)]
pub struct Builder {
    settings: BuildSettings,
    projects: ProjectGraph,
    executor: Executor,
    writer: GraphWriter,
    force: bool,
}

impl Builder {
    pub fn new(settings: BuildSettings, projects: ProjectGraph) -> Self {
        Self {
            executor: Executor::new(&settings.executor),
            writer: GraphWriter::new(settings.staleness),
            settings,
            projects,
            force: false,
        }
    }

    /// Builder for a loaded workspace configuration
    pub fn from_config(config: &Config, overrides: &SettingsOverrides) -> BuildResult<Self> {
        let settings = BuildSettings::resolve(config, overrides)?;
        let codegen = config
            .workspace
            .codegen
            .as_ref()
            .map(|section| ReflectionPipeline::new(CodegenConfig::from_section(section, &settings.root)));
        let projects =
            ProjectGraph::from_manifest(&config.workspace, &settings.root)?.with_codegen(codegen);
        Ok(Self::new(settings, projects))
    }

    /// Rewrite descriptions even when they are up to date
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Echo the executor's output
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.executor = self.executor.with_echo(echo);
        self
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    pub fn projects(&self) -> &ProjectGraph {
        &self.projects
    }

    /// Codegen (when any selected project needs it), then the projects
    ///
    /// With a target only that project is built; its dependencies must
    /// already be published.
    pub fn build(&self, target: Option<&str>) -> BuildResult<BuildOutcome> {
        let start = Instant::now();
        let mut stats = BuildStats::default();

        let needs_codegen = match target {
            Some(name) => self.projects.project(name)?.generated,
            None => self.projects.needs_codegen(),
        };

        let codegen = if needs_codegen {
            let codegen_start = Instant::now();
            let report = self.codegen(CodegenStage::Full)?;
            stats.codegen_time = codegen_start.elapsed();
            stats.descriptions_written += usize::from(report.metaprogram_write.was_written())
                + usize::from(report.codegen_write.is_some_and(|w| w.was_written()));
            Some(report)
        } else {
            None
        };

        let projects = match target {
            Some(name) => vec![self.projects.build_project(
                name,
                &self.settings,
                &self.executor,
                &self.writer,
                self.force,
            )?],
            None => self
                .projects
                .build_all(&self.settings, &self.executor, &self.writer, self.force)?,
        };

        stats.projects_built = projects.len();
        stats.descriptions_written += projects.iter().filter(|r| r.write.was_written()).count();
        stats.total_time = start.elapsed();

        info!(
            projects = stats.projects_built,
            written = stats.descriptions_written,
            elapsed_ms = stats.total_time.as_millis() as u64,
            "build finished"
        );
        Ok(BuildOutcome {
            codegen,
            projects,
            stats,
        })
    }

    /// Force-rewrite descriptions without executing anything
    pub fn regen(&self, target: Option<&str>) -> BuildResult<Vec<(String, WriteResult)>> {
        self.selected(target)?
            .into_iter()
            .map(|project| {
                self.projects
                    .write_project(&project.name, &self.settings, &self.writer, true)
                    .map(|result| (project.name.clone(), result))
            })
            .collect()
    }

    /// Clean outputs; returns what had something to clean
    ///
    /// Without a target the codegen stages and their generated sources are
    /// cleaned too, reported as "codegen".
    pub fn clean(&self, target: Option<&str>) -> BuildResult<Vec<String>> {
        let mut cleaned = Vec::new();
        if let (None, Some(pipeline)) = (target, self.projects.codegen()) {
            if pipeline.clean(&self.executor)? {
                cleaned.push(CODEGEN_STAGE.to_string());
            }
        }
        for project in self.selected(target)? {
            if self.projects.clean_project(&project.name, &self.executor)? {
                cleaned.push(project.name.clone());
            }
        }
        Ok(cleaned)
    }

    /// Run a published executable with its configured arguments
    ///
    /// Defaults to the last executable in build order. Runs from the bin dir.
    pub fn run(&self, target: Option<&str>) -> BuildResult<PathBuf> {
        let project = match target {
            Some(name) => self.projects.project(name)?,
            None => self.projects.default_executable().ok_or_else(|| {
                BuildError::Configuration("no executable project to run".to_string())
            })?,
        };
        if !project.is_executable() {
            return Err(BuildError::Configuration(format!(
                "project '{}' is a {}, not an executable",
                project.name, project.kind
            )));
        }

        let program = project.published_path(&self.settings);
        executor::run_artifact(&program, &project.run_args, &self.settings.bin_dir)?;
        Ok(program)
    }

    /// Build precompiled headers only
    ///
    /// Without a target, every project that declares one.
    pub fn pch(&self, target: Option<&str>) -> BuildResult<Vec<PathBuf>> {
        let projects: Vec<&Project> = match target {
            Some(name) => vec![self.projects.project(name)?],
            None => self
                .projects
                .build_order()
                .into_iter()
                .filter(|p| p.pch.is_some())
                .collect(),
        };

        projects
            .into_iter()
            .map(|project| {
                self.projects.build_pch(
                    &project.name,
                    &self.settings,
                    &self.executor,
                    &self.writer,
                    self.force,
                )
            })
            .collect()
    }

    /// Run the reflection pipeline
    pub fn codegen(&self, stage: CodegenStage) -> BuildResult<CodegenReport> {
        let pipeline = self.projects.codegen().ok_or_else(|| {
            BuildError::Configuration("no [codegen] section in the manifest".to_string())
        })?;
        pipeline.run(
            &self.settings,
            &self.executor,
            &self.writer,
            stage,
            self.force,
        )
    }

    fn selected(&self, target: Option<&str>) -> BuildResult<Vec<&Project>> {
        match target {
            Some(name) => Ok(vec![self.projects.project(name)?]),
            None => Ok(self.projects.build_order()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use kiln_config::{GlobalConfig, WorkspaceManifest};

    fn builder(manifest: &str) -> Builder {
        let config = Config {
            workspace: toml::from_str::<WorkspaceManifest>(manifest).unwrap(),
            global: GlobalConfig::default(),
            root: PathBuf::from("/ws"),
        };
        let overrides = SettingsOverrides {
            platform: Some(Platform::Linux),
            ..Default::default()
        };
        Builder::from_config(&config, &overrides).unwrap()
    }

    #[test]
    fn test_codegen_without_section() {
        let builder = builder("");
        assert!(matches!(
            builder.codegen(CodegenStage::Full),
            Err(BuildError::Configuration(_))
        ));
    }

    #[test]
    fn test_run_rejects_library() {
        let builder = builder(
            r#"
[[project]]
name = "engine"
root = "engine"
kind = "shared"
"#,
        );
        assert!(matches!(
            builder.run(Some("engine")),
            Err(BuildError::Configuration(_))
        ));
        assert!(matches!(builder.run(None), Err(BuildError::Configuration(_))));
    }

    #[test]
    fn test_run_missing_artifact() {
        let builder = builder(
            r#"
[[project]]
name = "game"
root = "game"
kind = "executable"
"#,
        );
        assert!(matches!(
            builder.run(None),
            Err(BuildError::MissingArtifact { .. })
        ));
    }
}
