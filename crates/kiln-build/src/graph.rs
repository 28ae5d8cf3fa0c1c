//! In-memory build graph
//!
//! A `BuildGraph` is the DAG of build edges for one description file: the
//! variables and rules it declares and the nodes (edges in Ninja terms) that
//! produce outputs from inputs. Node identity is the output path; the graph
//! refuses a second node for any path already produced.

use crate::error::{BuildError, BuildResult};
use crate::toolchain::DepsFormat;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};

/// Rule name Ninja provides for alias edges
pub const PHONY: &str = "phony";

/// What a node does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Hand-written source to object
    Compile,
    /// Objects to executable or shared library
    Link,
    /// Objects to static library
    Archive,
    /// Generated source to object
    CodegenCompile,
    /// Descriptor through the generator
    CodegenRun,
    /// Header to precompiled header
    Pch,
    /// Phony collection of other outputs
    Alias,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Compile => "compile",
            Self::Link => "link",
            Self::Archive => "archive",
            Self::CodegenCompile => "codegen-compile",
            Self::CodegenRun => "codegen-run",
            Self::Pch => "pch",
            Self::Alias => "alias",
        };
        f.write_str(name)
    }
}

/// Where a compile node's header dependency listing goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepListing {
    pub format: DepsFormat,
    /// Listing file; `None` when the compiler reports on stdout
    pub path: Option<PathBuf>,
}

/// A Ninja rule declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub command: String,
    pub description: Option<String>,
    pub depfile: Option<String>,
    pub deps: Option<DepsFormat>,
}

impl Rule {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            description: None,
            depfile: None,
            deps: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Bind the rule to a header dependency format
    pub fn with_deps(mut self, deps: DepsFormat, depfile: Option<String>) -> Self {
        self.deps = Some(deps);
        self.depfile = depfile;
        self
    }
}

/// One build edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildNode {
    pub output: PathBuf,
    pub kind: NodeKind,
    pub rule: String,
    pub inputs: Vec<PathBuf>,
    pub implicit_inputs: Vec<PathBuf>,
    pub implicit_outputs: Vec<PathBuf>,
    pub dep_listing: Option<DepListing>,
    /// Per-edge variable overrides, in declaration order
    pub variables: Vec<(String, String)>,
}

impl BuildNode {
    pub fn new(kind: NodeKind, rule: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            kind,
            rule: rule.into(),
            inputs: Vec::new(),
            implicit_inputs: Vec::new(),
            implicit_outputs: Vec::new(),
            dep_listing: None,
            variables: Vec::new(),
        }
    }

    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.inputs.push(input.into());
        self
    }

    pub fn with_inputs<I, P>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.inputs.extend(inputs.into_iter().map(Into::into));
        self
    }

    pub fn with_implicit_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.implicit_inputs.push(input.into());
        self
    }

    pub fn with_implicit_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.implicit_outputs.push(output.into());
        self
    }

    pub fn with_dep_listing(mut self, listing: DepListing) -> Self {
        self.dep_listing = Some(listing);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.push((name.into(), value.into()));
        self
    }

    /// Every path this node produces
    pub fn outputs(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.output).chain(self.implicit_outputs.iter())
    }

    /// Every path this node consumes
    pub fn all_inputs(&self) -> impl Iterator<Item = &PathBuf> {
        self.inputs.iter().chain(self.implicit_inputs.iter())
    }
}

/// Build graph for one description file
#[derive(Debug, Clone, Default)]
pub struct BuildGraph {
    variables: Vec<(String, String)>,
    rules: Vec<Rule>,
    nodes: Vec<BuildNode>,
    /// Every output path (explicit or implicit) to the index of its node
    outputs: HashMap<PathBuf, usize>,
}

impl BuildGraph {
    /// Create a new empty build graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a top-level variable, replacing an earlier value of the same name
    pub fn add_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.variables.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.variables.push((name, value)),
        }
    }

    /// Declare a rule
    pub fn add_rule(&mut self, rule: Rule) -> BuildResult<()> {
        if rule.name == PHONY || self.rule(&rule.name).is_some() {
            return Err(BuildError::InvalidGraph(format!(
                "rule '{}' is declared twice",
                rule.name
            )));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Add a node; its outputs must not be produced by any existing node
    pub fn add_node(&mut self, node: BuildNode) -> BuildResult<()> {
        let rule = self.rule(&node.rule);
        if node.rule != PHONY && rule.is_none() {
            return Err(BuildError::InvalidGraph(format!(
                "node {} uses undeclared rule '{}'",
                node.output.display(),
                node.rule
            )));
        }

        // The listing a node declares must be the one its rule asks ninja to read.
        if let Some(listing) = &node.dep_listing {
            if rule.and_then(|r| r.deps) != Some(listing.format) {
                return Err(BuildError::InvalidGraph(format!(
                    "node {} declares a {} dependency listing its rule does not read",
                    node.output.display(),
                    listing.format.as_str()
                )));
            }
        }

        let mut seen = HashSet::new();
        for output in node.outputs() {
            if self.outputs.contains_key(output) || !seen.insert(output) {
                return Err(BuildError::DuplicateOutput {
                    output: output.clone(),
                });
            }
        }

        let index = self.nodes.len();
        for output in node.outputs() {
            self.outputs.insert(output.clone(), index);
        }
        self.nodes.push(node);
        Ok(())
    }

    pub fn variables(&self) -> &[(String, String)] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn nodes(&self) -> &[BuildNode] {
        &self.nodes
    }

    /// Find the node producing `output` (explicitly or implicitly)
    pub fn node(&self, output: &Path) -> Option<&BuildNode> {
        self.outputs.get(output).map(|&i| &self.nodes[i])
    }

    /// Nodes of one kind, in insertion order
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &BuildNode> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Explicit inputs that no node produces, sorted
    pub fn sources(&self) -> Vec<&Path> {
        let sources: BTreeSet<&Path> = self
            .nodes
            .iter()
            .flat_map(|n| n.inputs.iter())
            .filter(|p| !self.outputs.contains_key(*p))
            .map(PathBuf::as_path)
            .collect();
        sources.into_iter().collect()
    }

    /// The single node whose outputs nothing else consumes
    pub fn terminal(&self) -> BuildResult<&BuildNode> {
        let consumed: HashSet<usize> = self
            .nodes
            .iter()
            .flat_map(|n| n.all_inputs())
            .filter_map(|p| self.outputs.get(p).copied())
            .collect();

        let terminals: Vec<&BuildNode> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| !consumed.contains(i))
            .map(|(_, n)| n)
            .collect();

        match terminals.as_slice() {
            [single] => Ok(single),
            [] => Err(BuildError::InvalidGraph(
                "graph has no terminal node".to_string(),
            )),
            many => Err(BuildError::InvalidGraph(format!(
                "graph has {} terminal nodes: {}",
                many.len(),
                many.iter()
                    .map(|n| n.output.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Validate the graph: acyclic with exactly one terminal
    pub fn validate(&self) -> BuildResult<()> {
        if let Some(cycle) = self.find_cycle() {
            return Err(BuildError::CircularDependency(cycle));
        }
        self.terminal()?;
        Ok(())
    }

    /// Compute a topological order using Kahn's algorithm
    ///
    /// Producers come before consumers; independent nodes keep insertion order.
    pub fn topological_order(&self) -> BuildResult<Vec<&BuildNode>> {
        let dependencies = self.node_dependencies();
        let mut in_degree: Vec<usize> = dependencies.iter().map(Vec::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (consumer, producers) in dependencies.iter().enumerate() {
            for &producer in producers {
                dependents[producer].push(consumer);
            }
        }

        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(index) = queue.pop_front() {
            result.push(&self.nodes[index]);
            for &dependent in &dependents[index] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if result.len() != self.nodes.len() {
            let cycle = self
                .find_cycle()
                .unwrap_or_else(|| "unknown cycle".to_string());
            return Err(BuildError::CircularDependency(cycle));
        }

        Ok(result)
    }

    /// For each node, the distinct nodes producing its inputs
    fn node_dependencies(&self) -> Vec<Vec<usize>> {
        self.nodes
            .iter()
            .map(|node| {
                let mut producers: Vec<usize> = node
                    .all_inputs()
                    .filter_map(|p| self.outputs.get(p).copied())
                    .collect();
                producers.sort_unstable();
                producers.dedup();
                producers
            })
            .collect()
    }

    /// Find a cycle in the graph (for error reporting)
    fn find_cycle(&self) -> Option<String> {
        let dependencies = self.node_dependencies();
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for index in 0..self.nodes.len() {
            if let Some(cycle) =
                self.dfs_find_cycle(index, &dependencies, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(cycle);
            }
        }
        None
    }

    /// DFS to find a cycle
    fn dfs_find_cycle(
        &self,
        index: usize,
        dependencies: &[Vec<usize>],
        visited: &mut HashSet<usize>,
        rec_stack: &mut HashSet<usize>,
        path: &mut Vec<usize>,
    ) -> Option<String> {
        if rec_stack.contains(&index) {
            path.push(index);
            let start = path.iter().position(|&i| i == index).unwrap_or(0);
            let cycle = path[start..]
                .iter()
                .map(|&i| self.nodes[i].output.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Some(cycle);
        }

        if !visited.insert(index) {
            return None;
        }

        rec_stack.insert(index);
        path.push(index);

        for &dep in &dependencies[index] {
            if let Some(cycle) = self.dfs_find_cycle(dep, dependencies, visited, rec_stack, path) {
                return Some(cycle);
            }
        }

        rec_stack.remove(&index);
        path.pop();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_rule() -> BuildGraph {
        let mut graph = BuildGraph::new();
        graph.add_rule(Rule::new("cc", "cc $in -o $out")).unwrap();
        graph
    }

    #[test]
    fn test_empty_graph_has_no_terminal() {
        let graph = BuildGraph::new();
        assert!(graph.is_empty());
        assert!(graph.terminal().is_err());
        assert!(graph.topological_order().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_output_rejected() {
        let mut graph = graph_with_rule();
        graph
            .add_node(BuildNode::new(NodeKind::Compile, "cc", "out/a.o").with_input("a.cpp"))
            .unwrap();
        let err = graph
            .add_node(BuildNode::new(NodeKind::Compile, "cc", "out/a.o").with_input("b/a.cpp"))
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateOutput { .. }));
    }

    #[test]
    fn test_implicit_output_counts_as_identity() {
        let mut graph = graph_with_rule();
        graph
            .add_node(
                BuildNode::new(NodeKind::Link, "cc", "out/app.dll")
                    .with_implicit_output("out/app.lib"),
            )
            .unwrap();
        assert!(graph.node(Path::new("out/app.lib")).is_some());
        assert!(graph
            .add_node(BuildNode::new(NodeKind::Archive, "cc", "out/app.lib"))
            .is_err());
    }

    #[test]
    fn test_undeclared_rule_rejected() {
        let mut graph = BuildGraph::new();
        assert!(matches!(
            graph.add_node(BuildNode::new(NodeKind::Compile, "cc", "a.o")),
            Err(BuildError::InvalidGraph(_))
        ));
    }

    #[test]
    fn test_topological_order_keeps_insertion_order() {
        let mut graph = graph_with_rule();
        graph
            .add_node(
                BuildNode::new(NodeKind::Link, "cc", "app")
                    .with_inputs(["b.o", "a.o"]),
            )
            .unwrap();
        graph
            .add_node(BuildNode::new(NodeKind::Compile, "cc", "b.o").with_input("b.cpp"))
            .unwrap();
        graph
            .add_node(BuildNode::new(NodeKind::Compile, "cc", "a.o").with_input("a.cpp"))
            .unwrap();

        let order: Vec<_> = graph
            .topological_order()
            .unwrap()
            .into_iter()
            .map(|n| n.output.clone())
            .collect();
        assert_eq!(
            order,
            vec![PathBuf::from("b.o"), PathBuf::from("a.o"), PathBuf::from("app")]
        );
        assert_eq!(graph.terminal().unwrap().output, PathBuf::from("app"));
    }

    #[test]
    fn test_cycle_detected_with_path() {
        let mut graph = graph_with_rule();
        graph
            .add_node(BuildNode::new(NodeKind::Compile, "cc", "a").with_input("b"))
            .unwrap();
        graph
            .add_node(BuildNode::new(NodeKind::Compile, "cc", "b").with_input("a"))
            .unwrap();

        match graph.validate() {
            Err(BuildError::CircularDependency(cycle)) => {
                assert!(cycle.contains(" -> "));
            }
            other => panic!("Expected CircularDependency, got {:?}", other),
        }
        assert!(graph.topological_order().is_err());
    }

    #[test]
    fn test_two_terminals_invalid() {
        let mut graph = graph_with_rule();
        graph
            .add_node(BuildNode::new(NodeKind::Compile, "cc", "a.o").with_input("a.cpp"))
            .unwrap();
        graph
            .add_node(BuildNode::new(NodeKind::Compile, "cc", "b.o").with_input("b.cpp"))
            .unwrap();
        assert!(matches!(
            graph.validate(),
            Err(BuildError::InvalidGraph(_))
        ));
    }

    #[test]
    fn test_sources_sorted_and_exclude_outputs() {
        let mut graph = graph_with_rule();
        graph
            .add_node(BuildNode::new(NodeKind::Compile, "cc", "z.o").with_input("z.cpp"))
            .unwrap();
        graph
            .add_node(BuildNode::new(NodeKind::Compile, "cc", "a.o").with_input("a.cpp"))
            .unwrap();
        graph
            .add_node(BuildNode::new(NodeKind::Link, "cc", "app").with_inputs(["z.o", "a.o"]))
            .unwrap();
        assert_eq!(
            graph.sources(),
            vec![Path::new("a.cpp"), Path::new("z.cpp")]
        );
    }

    #[test]
    fn test_add_variable_replaces() {
        let mut graph = BuildGraph::new();
        graph.add_variable("cxx", "g++");
        graph.add_variable("ar", "ar");
        graph.add_variable("cxx", "clang++");
        assert_eq!(graph.variable("cxx"), Some("clang++"));
        assert_eq!(graph.variables().len(), 2);
    }
}
