//! Multi-project composition
//!
//! Every project gets its own graph and description. Cross-project edges are
//! dependency names resolved to published artifact paths in the bin dir,
//! never to another project's objects or build targets. A missing dependency
//! artifact is reported, not built implicitly.

use crate::error::{BuildError, BuildResult};
use crate::executor::Executor;
use crate::graph::BuildGraph;
use crate::project::Project;
use crate::reflection::ReflectionPipeline;
use crate::settings::BuildSettings;
use crate::writer::{GraphWriter, WriteResult};
use kiln_config::WorkspaceManifest;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcome of building one project
#[derive(Debug, Clone, Serialize)]
pub struct ProjectReport {
    pub name: String,
    pub description: PathBuf,
    pub write: WriteResult,
    /// Files copied into the bin dir
    pub published: Vec<PathBuf>,
    pub duration: Duration,
}

/// Projects of a workspace and the dependency edges between them
#[derive(Debug, Clone)]
pub struct ProjectGraph {
    projects: Vec<Project>,
    /// Indices into `projects`, dependencies first
    order: Vec<usize>,
    codegen: Option<ReflectionPipeline>,
}

impl ProjectGraph {
    /// Validate names, dependency kinds and cycles, and fix the build order
    pub fn new(projects: Vec<Project>) -> BuildResult<Self> {
        let mut index = HashMap::new();
        for (i, project) in projects.iter().enumerate() {
            if index.insert(project.name.as_str(), i).is_some() {
                return Err(BuildError::Configuration(format!(
                    "project '{}' is declared more than once",
                    project.name
                )));
            }
        }

        for project in &projects {
            for dependency in &project.dependencies {
                let Some(&dep) = index.get(dependency.as_str()) else {
                    return Err(BuildError::UnknownProject {
                        project: project.name.clone(),
                        dependency: dependency.clone(),
                    });
                };
                if !projects[dep].kind.is_library() {
                    return Err(BuildError::Configuration(format!(
                        "project '{}' depends on '{}', which is an {} and cannot be linked",
                        project.name, dependency, projects[dep].kind
                    )));
                }
            }
        }

        let order = build_order(&projects, &index)?;
        Ok(Self {
            projects,
            order,
            codegen: None,
        })
    }

    /// Projects from a manifest, resolved against `root`
    pub fn from_manifest(manifest: &WorkspaceManifest, root: &Path) -> BuildResult<Self> {
        let projects = manifest
            .projects
            .iter()
            .map(|section| Project::from_section(section, root))
            .collect();
        Self::new(projects)
    }

    /// Source of generated sources for projects that compile them
    pub fn with_codegen(mut self, pipeline: Option<ReflectionPipeline>) -> Self {
        self.codegen = pipeline;
        self
    }

    pub fn codegen(&self) -> Option<&ReflectionPipeline> {
        self.codegen.as_ref()
    }

    /// Projects in declaration order
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn project(&self, name: &str) -> BuildResult<&Project> {
        self.projects
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| BuildError::Configuration(format!("no project named '{}'", name)))
    }

    /// Dependencies before dependents; declaration order breaks ties
    pub fn build_order(&self) -> Vec<&Project> {
        self.order.iter().map(|&i| &self.projects[i]).collect()
    }

    /// Whether any project compiles generated sources
    pub fn needs_codegen(&self) -> bool {
        self.projects.iter().any(|p| p.generated)
    }

    /// Default project for `run`: the last executable in build order
    pub fn default_executable(&self) -> Option<&Project> {
        self.build_order()
            .into_iter()
            .rev()
            .find(|p| p.is_executable())
    }

    /// Published linkables of `project`'s dependencies
    ///
    /// With `require`, each one must already be on disk.
    pub fn link_inputs(
        &self,
        project: &Project,
        settings: &BuildSettings,
        require: bool,
    ) -> BuildResult<Vec<PathBuf>> {
        let mut inputs = Vec::with_capacity(project.dependencies.len());
        for name in &project.dependencies {
            let dependency = self.project(name)?;
            let linkable = dependency.linkable_path(settings);
            if require && !linkable.is_file() {
                return Err(BuildError::missing_artifact(
                    linkable,
                    format!("'{}' build", dependency.name),
                ));
            }
            inputs.push(linkable);
        }
        Ok(inputs)
    }

    /// Plan one project's graph
    pub fn plan_project(
        &self,
        project: &Project,
        settings: &BuildSettings,
        require_dependencies: bool,
    ) -> BuildResult<BuildGraph> {
        let link_inputs = self.link_inputs(project, settings, require_dependencies)?;
        let generated = if project.generated {
            match &self.codegen {
                Some(pipeline) => pipeline.generated_sources()?,
                None => {
                    return Err(BuildError::Configuration(format!(
                        "project '{}' compiles generated sources but no codegen stage is configured",
                        project.name
                    )))
                }
            }
        } else {
            Vec::new()
        };

        project.plan(settings, link_inputs, generated)
    }

    /// Write one project's description without executing it
    pub fn write_project(
        &self,
        name: &str,
        settings: &BuildSettings,
        writer: &GraphWriter,
        force: bool,
    ) -> BuildResult<WriteResult> {
        let project = self.project(name)?;
        let graph = self.plan_project(project, settings, false)?;
        writer.write(&graph, &project.description_path(), force)
    }

    /// Build one project and publish its artifact
    pub fn build_project(
        &self,
        name: &str,
        settings: &BuildSettings,
        executor: &Executor,
        writer: &GraphWriter,
        force: bool,
    ) -> BuildResult<ProjectReport> {
        let start = Instant::now();
        let project = self.project(name)?;

        let graph = self.plan_project(project, settings, true)?;
        let description = project.description_path();
        let write = writer.write(&graph, &description, force)?;
        executor.execute(&description)?;
        let published = self.publish(project, settings)?;

        let duration = start.elapsed();
        info!(
            project = %project.name,
            elapsed_ms = duration.as_millis() as u64,
            "project built"
        );
        Ok(ProjectReport {
            name: project.name.clone(),
            description,
            write,
            published,
            duration,
        })
    }

    /// Build every project in order, stopping at the first failure
    pub fn build_all(
        &self,
        settings: &BuildSettings,
        executor: &Executor,
        writer: &GraphWriter,
        force: bool,
    ) -> BuildResult<Vec<ProjectReport>> {
        self.build_order()
            .into_iter()
            .map(|project| self.build_project(&project.name, settings, executor, writer, force))
            .collect()
    }

    /// Build only the precompiled header of one project
    pub fn build_pch(
        &self,
        name: &str,
        settings: &BuildSettings,
        executor: &Executor,
        writer: &GraphWriter,
        force: bool,
    ) -> BuildResult<PathBuf> {
        let project = self.project(name)?;
        let pch = project.planner(settings).pch_path().ok_or_else(|| {
            BuildError::Configuration(format!(
                "project '{}' has no precompiled header",
                project.name
            ))
        })?;

        let graph = self.plan_project(project, settings, false)?;
        let description = project.description_path();
        writer.write(&graph, &description, force)?;
        executor.execute_target(&description, &pch)?;
        info!(project = %project.name, pch = %pch.display(), "precompiled header built");
        Ok(pch)
    }

    /// Clean one project's outputs; `false` when it has no description yet
    pub fn clean_project(&self, name: &str, executor: &Executor) -> BuildResult<bool> {
        let project = self.project(name)?;
        let description = project.description_path();
        if !description.is_file() {
            warn!(project = %project.name, "nothing to clean, no build description");
            return Ok(false);
        }
        executor.clean(&description)?;
        Ok(true)
    }

    /// Copy a built artifact (and its import library) into the bin dir
    fn publish(&self, project: &Project, settings: &BuildSettings) -> BuildResult<Vec<PathBuf>> {
        let tc = &settings.toolchain;
        let mut files = vec![tc.artifact_name(&project.name, project.kind)];
        files.extend(tc.import_library(&project.name, project.kind));

        fs::create_dir_all(&settings.bin_dir).map_err(|e| BuildError::io(&settings.bin_dir, e))?;

        let mut published = Vec::with_capacity(files.len());
        for file in files {
            let built = project.build_dir.join(&file);
            if !built.is_file() {
                return Err(BuildError::missing_artifact(
                    built,
                    format!("'{}' build", project.name),
                ));
            }
            let target = settings.bin_dir.join(&file);
            fs::copy(&built, &target).map_err(|e| BuildError::io(&target, e))?;
            debug!(from = %built.display(), to = %target.display(), "published");
            published.push(target);
        }
        Ok(published)
    }
}

/// Kahn's algorithm over project indices
fn build_order(projects: &[Project], index: &HashMap<&str, usize>) -> BuildResult<Vec<usize>> {
    let mut in_degree: Vec<usize> = projects.iter().map(|p| p.dependencies.len()).collect();
    let mut queue: VecDeque<usize> = (0..projects.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(projects.len());

    while let Some(current) = queue.pop_front() {
        order.push(current);
        let name = projects[current].name.as_str();
        for (dependent, project) in projects.iter().enumerate() {
            let edges = project.dependencies.iter().filter(|d| *d == name).count();
            if edges > 0 {
                in_degree[dependent] -= edges;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }
    }

    if order.len() != projects.len() {
        return Err(BuildError::CircularDependency(find_cycle(projects, index)));
    }
    Ok(order)
}

fn find_cycle(projects: &[Project], index: &HashMap<&str, usize>) -> String {
    fn visit(
        node: usize,
        projects: &[Project],
        index: &HashMap<&str, usize>,
        visited: &mut HashSet<usize>,
        path: &mut Vec<usize>,
    ) -> Option<String> {
        if let Some(start) = path.iter().position(|&p| p == node) {
            let mut names: Vec<&str> = path[start..]
                .iter()
                .map(|&i| projects[i].name.as_str())
                .collect();
            names.push(projects[node].name.as_str());
            return Some(names.join(" -> "));
        }
        if !visited.insert(node) {
            return None;
        }

        path.push(node);
        for dependency in &projects[node].dependencies {
            if let Some(&next) = index.get(dependency.as_str()) {
                if let Some(cycle) = visit(next, projects, index, visited, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        None
    }

    let mut visited = HashSet::new();
    for start in 0..projects.len() {
        if let Some(cycle) = visit(start, projects, index, &mut visited, &mut Vec::new()) {
            return cycle;
        }
    }
    "unknown cycle".to_string()
}
