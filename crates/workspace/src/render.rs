//! Text renderings of the project graph

use crate::graph::ProjectGraph;
use ripple_core::Error;
use std::collections::HashSet;
use std::fmt::Write;
use std::str::FromStr;

/// Supported graph output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphFormat {
    /// `name: dep, dep`
    #[default]
    Text,
    /// `dep -> name`, one edge per line
    Ansi,
    Dot,
    Mermaid,
}

impl FromStr for GraphFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(GraphFormat::Text),
            "ansi" => Ok(GraphFormat::Ansi),
            "dot" => Ok(GraphFormat::Dot),
            "mermaid" => Ok(GraphFormat::Mermaid),
            other => Err(Error::configuration(format!(
                "unknown graph format '{other}' (expected text, ansi, dot or mermaid)"
            ))),
        }
    }
}

/// Trait for rendering project dependency graphs
pub trait GraphFormatter {
    fn format_graph(&self, graph: &ProjectGraph) -> String;
}

pub struct TextFormatter;
pub struct AnsiFormatter;
pub struct DotFormatter;
pub struct MermaidFormatter;

impl GraphFormatter for TextFormatter {
    fn format_graph(&self, graph: &ProjectGraph) -> String {
        let mut output = String::new();
        for project in graph.projects() {
            let deps = if project.deps.is_empty() {
                "none".to_string()
            } else {
                project.deps.join(", ")
            };
            let _ = writeln!(output, "{}: {deps}", project.name);
        }
        output
    }
}

impl GraphFormatter for AnsiFormatter {
    fn format_graph(&self, graph: &ProjectGraph) -> String {
        let mut output = String::new();
        for (from, to) in edges(graph) {
            let _ = writeln!(output, "{from} -> {to}");
        }
        output
    }
}

impl GraphFormatter for DotFormatter {
    fn format_graph(&self, graph: &ProjectGraph) -> String {
        let mut output = String::from("digraph G {\n");
        for project in graph.projects() {
            if project.deps.is_empty() {
                let _ = writeln!(output, "  \"{}\"", escape_dot(&project.name));
            }
        }
        for (from, to) in edges(graph) {
            let _ = writeln!(output, "  \"{}\" -> \"{}\"", escape_dot(from), escape_dot(to));
        }
        output.push_str("}\n");
        output
    }
}

impl MermaidFormatter {
    fn node_id(id: &str) -> String {
        id.replace(|c: char| !c.is_ascii_alphanumeric() && c != '_', "_")
    }

    fn node(id: &str) -> String {
        format!("{}[\"{}\"]", Self::node_id(id), id.replace('"', "'"))
    }
}

impl GraphFormatter for MermaidFormatter {
    fn format_graph(&self, graph: &ProjectGraph) -> String {
        let mut output = String::from("graph TD\n");
        for project in graph.projects() {
            if project.deps.is_empty() {
                let _ = writeln!(output, "  {}", Self::node(&project.name));
            }
        }
        for (from, to) in edges(graph) {
            let _ = writeln!(output, "  {} --> {}", Self::node(from), Self::node(to));
        }
        output
    }
}

/// Dependency edges `(dep, dependent)` in registry order, without duplicates
fn edges(graph: &ProjectGraph) -> Vec<(&str, &str)> {
    let mut seen = HashSet::new();
    graph
        .projects()
        .flat_map(|p| p.deps.iter().map(move |d| (d.as_str(), p.name.as_str())))
        .filter(|edge| seen.insert(*edge))
        .collect()
}

fn escape_dot(id: &str) -> String {
    id.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Render the whole graph in the requested format
pub fn render_graph(graph: &ProjectGraph, format: GraphFormat) -> String {
    match format {
        GraphFormat::Text => TextFormatter.format_graph(graph),
        GraphFormat::Ansi => AnsiFormatter.format_graph(graph),
        GraphFormat::Dot => DotFormatter.format_graph(graph),
        GraphFormat::Mermaid => MermaidFormatter.format_graph(graph),
    }
}
