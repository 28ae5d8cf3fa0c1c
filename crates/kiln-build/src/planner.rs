//! Build graph construction
//!
//! [`GraphPlanner`] turns a discovered source set into the graph for one
//! artifact: one compile node per source, an optional precompiled header,
//! and exactly one link (or archive) node collecting every object in
//! discovery order.

use crate::discovery::{normalized, SourceFile};
use crate::error::{BuildError, BuildResult};
use crate::graph::{BuildGraph, BuildNode, NodeKind};
use crate::toolchain::{path_arg, ArtifactKind, ToolchainProfile, PCH_RULE};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Plans the build graph of one artifact
#[derive(Debug, Clone)]
pub struct GraphPlanner<'a> {
    toolchain: &'a ToolchainProfile,
    build_dir: PathBuf,
    compile_args: Vec<String>,
    link_args: Vec<String>,
    pch: Option<PathBuf>,
    link_inputs: Vec<PathBuf>,
    generated: Vec<SourceFile>,
}

impl<'a> GraphPlanner<'a> {
    pub fn new(toolchain: &'a ToolchainProfile, build_dir: impl Into<PathBuf>) -> Self {
        Self {
            toolchain,
            build_dir: build_dir.into(),
            compile_args: Vec::new(),
            link_args: Vec::new(),
            pch: None,
            link_inputs: Vec::new(),
            generated: Vec::new(),
        }
    }

    pub fn with_compile_args(mut self, args: Vec<String>) -> Self {
        self.compile_args = args;
        self
    }

    pub fn with_link_args(mut self, args: Vec<String>) -> Self {
        self.link_args = args;
        self
    }

    /// Precompile `header` and make every hand-written compile use it
    pub fn with_pch(mut self, header: impl Into<PathBuf>) -> Self {
        self.pch = Some(header.into());
        self
    }

    /// Extra inputs appended to the link node (published dependency artifacts)
    pub fn with_link_inputs(mut self, inputs: Vec<PathBuf>) -> Self {
        self.link_inputs = inputs;
        self
    }

    /// Generated sources compiled alongside the hand-written ones
    pub fn with_generated(mut self, sources: Vec<SourceFile>) -> Self {
        self.generated = sources;
        self
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Output path of the artifact `plan` would produce
    pub fn artifact_path(&self, base: &str, kind: ArtifactKind) -> PathBuf {
        self.build_dir.join(self.toolchain.artifact_name(base, kind))
    }

    /// Output path of the precompiled header, if one is configured
    pub fn pch_path(&self) -> Option<PathBuf> {
        self.pch
            .as_ref()
            .map(|header| self.build_dir.join(self.toolchain.pch_name(header)))
    }

    /// Build the graph for `sources` producing the artifact `base`
    pub fn plan(
        &self,
        sources: &[SourceFile],
        base: &str,
        kind: ArtifactKind,
    ) -> BuildResult<BuildGraph> {
        if sources.is_empty() && self.generated.is_empty() {
            return Err(BuildError::Configuration(format!(
                "no sources to build for '{}'",
                base
            )));
        }

        let units: Vec<(&SourceFile, NodeKind)> = sources
            .iter()
            .map(|s| (s, NodeKind::Compile))
            .chain(self.generated.iter().map(|s| (s, NodeKind::CodegenCompile)))
            .collect();

        self.check_collisions(&units)?;
        if let Some(header) = &self.pch {
            if units.iter().any(|(s, _)| s.path == *header) {
                let pch = self.pch_path().unwrap_or_default();
                return Err(BuildError::CircularDependency(format!(
                    "{} -> {} -> {}",
                    pch.display(),
                    header.display(),
                    pch.display()
                )));
            }
        }

        let tc = self.toolchain;
        let mut graph = BuildGraph::new();
        graph.add_variable("builddir", normalized(&self.build_dir));
        graph.add_variable("cxx", tc.compiler());
        graph.add_variable("ld", tc.linker());
        graph.add_variable("ar", tc.archiver());
        graph.add_variable("compiler_args", self.compile_args.join(" "));
        graph.add_variable("linker_args", self.link_args.join(" "));

        graph.add_rule(tc.compile_rule())?;
        graph.add_rule(tc.link_rule(kind))?;

        // Precompiled header
        let mut pch_use = None;
        let mut extra_link_objects = Vec::new();
        if let (Some(header), Some(pch)) = (&self.pch, self.pch_path()) {
            graph.add_rule(tc.pch_rule())?;
            let mut node = BuildNode::new(NodeKind::Pch, PCH_RULE, &pch).with_input(header);
            if let Some(object) = tc.pch_object(&pch) {
                node = node
                    .with_implicit_output(&object)
                    .with_variable("pch_obj", path_arg(&object));
                extra_link_objects.push(object);
            }
            graph.add_node(node)?;
            pch_use = Some((pch.clone(), tc.pch_use_flags(&pch, header).join(" ")));
        }

        // Compile nodes
        let compile_rule = tc.compile_rule().name;
        let mut objects = Vec::with_capacity(units.len());
        for (source, node_kind) in &units {
            let object = self.build_dir.join(tc.object_name(&source.path));
            let mut node = BuildNode::new(*node_kind, &compile_rule, &object)
                .with_input(&source.path)
                .with_dep_listing(tc.dep_listing(&object));

            if let (NodeKind::Compile, Some((pch, flags))) = (node_kind, &pch_use) {
                node = node
                    .with_implicit_input(pch)
                    .with_variable("pch_flags", flags.clone());
            }

            graph.add_node(node)?;
            objects.push(object);
        }

        // Link node
        let artifact = self.artifact_path(base, kind);
        let link_kind = match kind {
            ArtifactKind::StaticLibrary => NodeKind::Archive,
            _ => NodeKind::Link,
        };
        let mut link = BuildNode::new(link_kind, tc.link_rule(kind).name, &artifact)
            .with_inputs(objects)
            .with_inputs(extra_link_objects)
            .with_inputs(self.link_inputs.iter().cloned());
        if let Some(implib) = tc.import_library(base, kind) {
            let implib = self.build_dir.join(implib);
            link = link
                .with_implicit_output(&implib)
                .with_variable("implib", path_arg(&implib));
        }
        graph.add_node(link)?;

        graph.validate()?;
        debug!(
            artifact = %artifact.display(),
            nodes = graph.len(),
            "planned build graph"
        );
        Ok(graph)
    }

    fn check_collisions(&self, units: &[(&SourceFile, NodeKind)]) -> BuildResult<()> {
        let mut seen: HashMap<String, &Path> = HashMap::new();
        for (source, _) in units {
            let object = self.toolchain.object_name(&source.path);
            if let Some(first) = seen.get(&object) {
                return Err(BuildError::SourceCollision {
                    object,
                    first: first.to_path_buf(),
                    second: source.path.clone(),
                });
            }
            seen.insert(object, &source.path);
        }
        Ok(())
    }
}
