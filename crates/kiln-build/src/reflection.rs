//! Staged reflection codegen
//!
//! Stage A builds the metaprogram (a normal executable graph). Stage B is a
//! second graph in which that executable is the command: it turns each type
//! descriptor into a generated `.cpp`/`.h` pair. Stage B cannot even be
//! planned until Stage A's artifact is on disk, and the main projects compile
//! the generated sources afterwards.
//!
//! The generator is invoked as `<generator> -f <descriptor dir> <output dir>
//! <file>`, where `<file>` is relative to the descriptor dir, and writes
//! `<output dir>/<file>.cpp` and `<output dir>/<file>.h`.

use crate::discovery::{self, normalized, SourceFile};
use crate::error::{BuildError, BuildResult};
use crate::executor::Executor;
use crate::graph::{BuildGraph, BuildNode, NodeKind, Rule, PHONY};
use crate::ninja::DESCRIPTION_FILE;
use crate::planner::GraphPlanner;
use crate::settings::BuildSettings;
use crate::toolchain::{path_arg, ArtifactKind, CompileOptions, LinkOptions};
use crate::writer::{GraphWriter, WriteResult};
use kiln_config::CodegenSection;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Stage name reported when the metaprogram is missing
pub const METAPROGRAM_STAGE: &str = "metaprogram";
/// Stage name reported when generated sources are missing
pub const CODEGEN_STAGE: &str = "codegen";

const GENERATE_RULE: &str = "generate";

/// Where the codegen stages read and write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenConfig {
    /// Metaprogram artifact base name
    pub name: String,
    /// Metaprogram sources
    pub metaprogram: Vec<PathBuf>,
    pub descriptor_root: PathBuf,
    /// Descriptor extension, without the dot
    pub extension: String,
    /// Receives generated sources and headers
    pub output_dir: PathBuf,
    /// Holds both stages' descriptions and intermediates
    pub build_dir: PathBuf,
}

impl CodegenConfig {
    /// Resolve a `[codegen]` section against the workspace root
    pub fn from_section(section: &CodegenSection, root: &Path) -> Self {
        Self {
            name: section.name().to_string(),
            metaprogram: section.metaprogram.iter().map(|p| root.join(p)).collect(),
            descriptor_root: root.join(&section.descriptors),
            extension: section.extension().to_string(),
            output_dir: root.join(&section.output),
            build_dir: root.join(section.build_dir()),
        }
    }
}

/// How far [`ReflectionPipeline::run`] goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodegenStage {
    /// Build the metaprogram and generate every descriptor
    Full,
    /// Stop once the metaprogram is built
    MetaprogramOnly,
}

/// What a pipeline run did
#[derive(Debug, Clone, Serialize)]
pub struct CodegenReport {
    pub generator: PathBuf,
    pub metaprogram_write: WriteResult,
    /// `None` when Stage B did not run
    pub codegen_write: Option<WriteResult>,
    /// Generated sources confirmed on disk
    pub generated: Vec<PathBuf>,
}

/// Two-stage codegen driver
#[derive(Debug, Clone)]
pub struct ReflectionPipeline {
    config: CodegenConfig,
}

impl ReflectionPipeline {
    pub fn new(config: CodegenConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodegenConfig {
        &self.config
    }

    pub fn metaprogram_dir(&self) -> PathBuf {
        self.config.build_dir.join("metaprogram")
    }

    pub fn codegen_dir(&self) -> PathBuf {
        self.config.build_dir.join("codegen")
    }

    pub fn metaprogram_description(&self) -> PathBuf {
        self.metaprogram_dir().join(DESCRIPTION_FILE)
    }

    pub fn codegen_description(&self) -> PathBuf {
        self.codegen_dir().join(DESCRIPTION_FILE)
    }

    /// Path the metaprogram executable is built to
    pub fn generator_path(&self, settings: &BuildSettings) -> PathBuf {
        self.metaprogram_dir().join(
            settings
                .toolchain
                .artifact_name(&self.config.name, ArtifactKind::Executable),
        )
    }

    /// Stage A graph: the metaprogram as an ordinary executable
    pub fn plan_metaprogram(&self, settings: &BuildSettings) -> BuildResult<BuildGraph> {
        for source in &self.config.metaprogram {
            if !source.is_file() {
                return Err(BuildError::Configuration(format!(
                    "metaprogram source {} does not exist",
                    source.display()
                )));
            }
        }

        let sources: Vec<SourceFile> = self
            .config
            .metaprogram
            .iter()
            .map(SourceFile::implementation)
            .collect();
        let tc = &settings.toolchain;
        let kind = ArtifactKind::Executable;

        GraphPlanner::new(tc, self.metaprogram_dir())
            .with_compile_args(tc.compile_args(&CompileOptions::default(), &settings.profile, kind))
            .with_link_args(tc.link_args(&LinkOptions::default(), &settings.profile, kind))
            .plan(&sources, &self.config.name, kind)
    }

    /// Build the metaprogram and confirm the artifact exists
    pub fn build_metaprogram(
        &self,
        settings: &BuildSettings,
        executor: &Executor,
        writer: &GraphWriter,
        force: bool,
    ) -> BuildResult<PathBuf> {
        self.stage_a(settings, executor, writer, force)
            .map(|(generator, _)| generator)
    }

    fn stage_a(
        &self,
        settings: &BuildSettings,
        executor: &Executor,
        writer: &GraphWriter,
        force: bool,
    ) -> BuildResult<(PathBuf, WriteResult)> {
        let graph = self.plan_metaprogram(settings)?;
        let description = self.metaprogram_description();
        let written = writer.write(&graph, &description, force)?;
        executor.execute(&description)?;

        let generator = self.generator_path(settings);
        if !generator.is_file() {
            return Err(BuildError::missing_artifact(generator, METAPROGRAM_STAGE));
        }
        info!(generator = %generator.display(), "metaprogram ready");
        Ok((generator, written))
    }

    /// Generated source path for a descriptor
    pub fn generated_source(&self, descriptor: &Path) -> PathBuf {
        self.generated_path(descriptor, "cpp")
    }

    /// Generated header path for a descriptor
    pub fn generated_header(&self, descriptor: &Path) -> PathBuf {
        self.generated_path(descriptor, "h")
    }

    fn generated_path(&self, descriptor: &Path, ext: &str) -> PathBuf {
        let relative = self.relative_descriptor(descriptor);
        self.config.output_dir.join(format!("{}.{}", relative, ext))
    }

    fn relative_descriptor(&self, descriptor: &Path) -> String {
        normalized(
            descriptor
                .strip_prefix(&self.config.descriptor_root)
                .unwrap_or(descriptor),
        )
    }

    /// Stage B graph: one generator run per descriptor
    ///
    /// Refuses to plan until `generator` exists.
    pub fn codegen_graph(&self, generator: &Path) -> BuildResult<BuildGraph> {
        if !generator.is_file() {
            return Err(BuildError::missing_artifact(generator, METAPROGRAM_STAGE));
        }

        let descriptors =
            discovery::discover_descriptors(&self.config.descriptor_root, &self.config.extension)?;
        if descriptors.is_empty() {
            warn!(
                root = %self.config.descriptor_root.display(),
                "no type descriptors found"
            );
        }

        let mut graph = BuildGraph::new();
        graph.add_variable("builddir", normalized(&self.codegen_dir()));
        graph.add_variable("generator", path_arg(generator));
        graph.add_variable("descriptor_dir", path_arg(&self.config.descriptor_root));
        graph.add_variable("gendir", path_arg(&self.config.output_dir));
        graph.add_rule(
            Rule::new(GENERATE_RULE, "$generator -f $descriptor_dir $gendir $file")
                .with_description("GEN $out"),
        )?;

        let mut outputs = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let source = self.generated_source(&descriptor.path);
            let header = self.generated_header(&descriptor.path);
            let relative = self.relative_descriptor(&descriptor.path);

            graph.add_node(
                BuildNode::new(NodeKind::CodegenRun, GENERATE_RULE, &source)
                    .with_input(&descriptor.path)
                    .with_implicit_input(generator)
                    .with_implicit_output(&header)
                    .with_variable("file", path_arg(Path::new(&relative))),
            )?;
            outputs.push(source);
        }

        graph.add_node(
            BuildNode::new(NodeKind::Alias, PHONY, self.codegen_dir().join("generated"))
                .with_inputs(outputs),
        )?;

        graph.validate()?;
        Ok(graph)
    }

    /// Run the stages in order, each gated on the previous stage's artifacts
    pub fn run(
        &self,
        settings: &BuildSettings,
        executor: &Executor,
        writer: &GraphWriter,
        stage: CodegenStage,
        force: bool,
    ) -> BuildResult<CodegenReport> {
        let (generator, metaprogram_write) = self.stage_a(settings, executor, writer, force)?;

        if stage == CodegenStage::MetaprogramOnly {
            return Ok(CodegenReport {
                generator,
                metaprogram_write,
                codegen_write: None,
                generated: Vec::new(),
            });
        }

        let graph = self.codegen_graph(&generator)?;
        let description = self.codegen_description();
        let codegen_write = writer.write(&graph, &description, force)?;
        executor.execute(&description)?;

        let mut generated = Vec::new();
        for node in graph.nodes_of_kind(NodeKind::CodegenRun) {
            for output in node.outputs() {
                if !output.is_file() {
                    return Err(BuildError::missing_artifact(output, CODEGEN_STAGE));
                }
            }
            generated.push(node.output.clone());
        }

        self.prune_orphans(&graph)?;
        info!(count = generated.len(), "generated sources ready");
        Ok(CodegenReport {
            generator,
            metaprogram_write,
            codegen_write: Some(codegen_write),
            generated,
        })
    }

    /// Generated sources for the main projects' graphs
    ///
    /// One source per current descriptor, each of which must already have
    /// been generated. Leftovers from deleted descriptors are never returned.
    pub fn generated_sources(&self) -> BuildResult<Vec<SourceFile>> {
        if !self.config.output_dir.is_dir() {
            return Err(BuildError::missing_artifact(
                &self.config.output_dir,
                CODEGEN_STAGE,
            ));
        }

        discovery::discover_descriptors(&self.config.descriptor_root, &self.config.extension)?
            .iter()
            .map(|descriptor| {
                let source = self.generated_source(&descriptor.path);
                if source.is_file() {
                    Ok(SourceFile::implementation(source))
                } else {
                    Err(BuildError::missing_artifact(source, CODEGEN_STAGE))
                }
            })
            .collect()
    }

    /// Remove generated files no current descriptor produces
    fn prune_orphans(&self, graph: &BuildGraph) -> BuildResult<Vec<PathBuf>> {
        let expected: HashSet<PathBuf> = graph
            .nodes_of_kind(NodeKind::CodegenRun)
            .flat_map(|node| node.outputs())
            .cloned()
            .collect();

        let mut removed = Vec::new();
        for ext in ["cpp", "h"] {
            for file in discovery::discover_sources(&self.config.output_dir, ext)? {
                if !expected.contains(&file.path) {
                    fs::remove_file(&file.path).map_err(|e| BuildError::io(&file.path, e))?;
                    debug!(file = %file.path.display(), "removed orphaned generated file");
                    removed.push(file.path);
                }
            }
        }
        Ok(removed)
    }

    /// Clean both stages and drop the generated sources
    ///
    /// `false` when there was nothing to clean.
    pub fn clean(&self, executor: &Executor) -> BuildResult<bool> {
        let mut cleaned = false;
        for description in [self.codegen_description(), self.metaprogram_description()] {
            if description.is_file() {
                executor.clean(&description)?;
                fs::remove_file(&description).map_err(|e| BuildError::io(&description, e))?;
                cleaned = true;
            }
        }

        let output_dir = &self.config.output_dir;
        if output_dir.is_dir() {
            fs::remove_dir_all(output_dir).map_err(|e| BuildError::io(output_dir, e))?;
            cleaned = true;
        }

        if cleaned {
            info!(output = %output_dir.display(), "codegen cleaned");
        }
        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> ReflectionPipeline {
        let section: CodegenSection = toml::from_str(
            r#"
metaprogram = ["types/type_metadata.cpp"]
descriptors = "types/types"
output = "types/generated"
"#,
        )
        .unwrap();
        ReflectionPipeline::new(CodegenConfig::from_section(&section, Path::new("/ws")))
    }

    #[test]
    fn test_config_from_section() {
        let config = pipeline().config().clone();
        assert_eq!(config.name, "type_metadata");
        assert_eq!(config.descriptor_root, PathBuf::from("/ws/types/types"));
        assert_eq!(config.build_dir, PathBuf::from("/ws/types/build"));
    }

    #[test]
    fn test_generated_paths_keep_descriptor_name() {
        let p = pipeline();
        let descriptor = Path::new("/ws/types/types/math/vec.type");
        assert_eq!(
            p.generated_source(descriptor),
            PathBuf::from("/ws/types/generated/math/vec.type.cpp")
        );
        assert_eq!(
            p.generated_header(descriptor),
            PathBuf::from("/ws/types/generated/math/vec.type.h")
        );
    }

    #[test]
    fn test_codegen_graph_requires_generator() {
        let err = pipeline()
            .codegen_graph(Path::new("/ws/types/build/metaprogram/type_metadata.out"))
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingArtifact { .. }));
    }
}
