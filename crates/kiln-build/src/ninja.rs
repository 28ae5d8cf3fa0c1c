//! Ninja description rendering
//!
//! Turns a [`BuildGraph`] into the text `ninja` reads. Rendering is a pure
//! function of the graph, so equal graphs give byte-identical files.

use crate::fingerprint::Fingerprint;
use crate::graph::{BuildGraph, BuildNode, Rule};
use std::fmt::Write;
use std::path::Path;

/// Default description file name
pub const DESCRIPTION_FILE: &str = "build.ninja";

const HEADER: &str = "# This file is generated by kiln. Do not edit.";

/// Render a graph with its fingerprint header
pub fn render(graph: &BuildGraph, fingerprint: &Fingerprint) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "{}", HEADER);
    let _ = writeln!(out, "{}", fingerprint.header_line());
    out.push('\n');
    out.push_str(&render_body(graph));
    out
}

/// Everything below the header; this is what the fingerprint covers
pub fn render_body(graph: &BuildGraph) -> String {
    let mut out = String::new();

    if !graph.variables().is_empty() {
        for (name, value) in graph.variables() {
            let _ = writeln!(out, "{} = {}", name, escape_value(value));
        }
        out.push('\n');
    }

    for rule in graph.rules() {
        render_rule(&mut out, rule);
        out.push('\n');
    }

    for node in graph.nodes() {
        render_node(&mut out, node);
    }

    if let Ok(terminal) = graph.terminal() {
        let _ = writeln!(out, "\ndefault {}", escape_path(&terminal.output));
    }

    out
}

fn render_rule(out: &mut String, rule: &Rule) {
    let _ = writeln!(out, "rule {}", rule.name);
    let _ = writeln!(out, "  command = {}", single_line(&rule.command));
    if let Some(description) = &rule.description {
        let _ = writeln!(out, "  description = {}", single_line(description));
    }
    if let Some(depfile) = &rule.depfile {
        let _ = writeln!(out, "  depfile = {}", depfile);
    }
    if let Some(deps) = rule.deps {
        let _ = writeln!(out, "  deps = {}", deps.as_str());
    }
}

fn render_node(out: &mut String, node: &BuildNode) {
    let mut line = format!("build {}", escape_path(&node.output));
    if !node.implicit_outputs.is_empty() {
        line.push_str(" |");
        for output in &node.implicit_outputs {
            line.push(' ');
            line.push_str(&escape_path(output));
        }
    }
    line.push_str(": ");
    line.push_str(&node.rule);
    for input in &node.inputs {
        line.push(' ');
        line.push_str(&escape_path(input));
    }
    if !node.implicit_inputs.is_empty() {
        line.push_str(" |");
        for input in &node.implicit_inputs {
            line.push(' ');
            line.push_str(&escape_path(input));
        }
    }
    let _ = writeln!(out, "{}", line);

    for (name, value) in &node.variables {
        let _ = writeln!(out, "  {} = {}", name, escape_value(value));
    }
}

/// Escape a path for a `build` line
pub fn escape_path(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '$' => escaped.push_str("$$"),
            ' ' => escaped.push_str("$ "),
            ':' => escaped.push_str("$:"),
            '\n' => escaped.push(' '),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Escape a variable value; only `$` is special there
pub fn escape_value(value: &str) -> String {
    single_line(value).replace('$', "$$")
}

fn single_line(text: &str) -> String {
    if text.contains('\n') {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;
    use crate::toolchain::DepsFormat;
    use std::path::PathBuf;

    #[test]
    fn test_escape_path() {
        assert_eq!(escape_path(Path::new("a b/c$d")), "a$ b/c$$d");
        assert_eq!(escape_path(Path::new("C:/src/x.cpp")), "C$:/src/x.cpp");
    }

    #[test]
    fn test_escape_value() {
        assert_eq!(escape_value("-Wl,-rpath,$ORIGIN"), "-Wl,-rpath,$$ORIGIN");
        assert_eq!(escape_value("-I a\n  -I b"), "-I a -I b");
    }

    #[test]
    fn test_render_layout() {
        let mut graph = BuildGraph::new();
        graph.add_variable("cxx", "g++");
        graph
            .add_rule(
                Rule::new("compile", "$cxx -MD -MF $out.d -c $in -o $out")
                    .with_deps(DepsFormat::Gcc, Some("$out.d".to_string())),
            )
            .unwrap();
        graph.add_rule(Rule::new("link", "$cxx -o $out $in")).unwrap();
        graph
            .add_node(
                BuildNode::new(NodeKind::Compile, "compile", "build/main.o")
                    .with_input("src/main.cpp")
                    .with_implicit_input("build/pch.h.gch")
                    .with_variable("pch_flags", "-include build/pch.h"),
            )
            .unwrap();
        graph
            .add_node(
                BuildNode::new(NodeKind::Link, "link", "build/app.out")
                    .with_input(PathBuf::from("build/main.o")),
            )
            .unwrap();

        let fp = Fingerprint::of_graph(&graph);
        let text = render(&graph, &fp);
        let expected = format!(
            "{}\n{}\n\ncxx = g++\n\n\
             rule compile\n  command = $cxx -MD -MF $out.d -c $in -o $out\n  depfile = $out.d\n  deps = gcc\n\n\
             rule link\n  command = $cxx -o $out $in\n\n\
             build build/main.o: compile src/main.cpp | build/pch.h.gch\n  pch_flags = -include build/pch.h\n\
             build build/app.out: link build/main.o\n\n\
             default build/app.out\n",
            HEADER,
            fp.header_line()
        );
        pretty_assertions::assert_eq!(text, expected);
    }
}
