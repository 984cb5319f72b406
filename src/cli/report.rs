//! Terminal rendering of resolutions.
//!
//! # Tree format
//!
//! ```text
//! app/1.0
//! ├── boost/1.80 Build
//! │   └── zlib/1.2.11 Cache
//! ├── zlib/1.2.11 Cache (*)
//! └── cmake/3.20 [build] Download
//!
//! (*) = already shown above
//! ```
//!
//! Advisories (range resolutions, overrides, skipped remotes, unused
//! `--build` patterns) go to stderr so JSON output stays parseable.

use anyhow::Result;
use colored::{ColoredString, Colorize};
use petgraph::graph::NodeIndex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write;
use tracing::debug;

use crate::graph::{
    BinaryStatus, DepsGraph, EdgeKind, EvalContext, NodeId, PackageId, RecipeKind, Resolution, ResolutionEvent,
    ResolutionReport,
};

/// Print the events a user should see. Chatty events only reach the debug log.
pub fn print_events(report: &ResolutionReport) {
    for event in report.events() {
        match event {
            ResolutionEvent::VersionRangeSolved {
                requirer,
                range,
                resolved,
                remote,
            } => eprintln!(
                "{} {} required by {} resolved to {} in remote '{}'",
                "Version range".cyan(),
                range,
                requirer,
                resolved.bold(),
                remote
            ),
            ResolutionEvent::RequirementOverridden {
                requirer,
                from,
                to,
            } => eprintln!("{}: {}: requirement {} overridden to {}", "warning".yellow(), requirer, from, to),
            ResolutionEvent::RemoteSkipped {
                remote,
                reason,
            } => eprintln!("{}: Remote '{}' skipped: {}", "warning".yellow(), remote, reason),
            ResolutionEvent::UnmatchedBuildPattern {
                pattern,
            } => eprintln!("{}: No package matching '{}' pattern found.", "warning".yellow(), pattern),
            ResolutionEvent::BuildRequireAdded {
                node,
                reference,
                from_profile,
            } => debug!("Build requirement {} added to {} (profile: {})", reference, node, from_profile),
            ResolutionEvent::BinaryEvaluated {
                node,
                status,
                package_id,
            } => debug!(
                "{}: {} ({})",
                node,
                status,
                package_id.as_ref().map_or("unknown id", PackageId::as_str)
            ),
            ResolutionEvent::LockNodeAdded {
                id,
            } => debug!("Node {} added to the lock", id),
        }
    }
}

fn colored_status(status: BinaryStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        BinaryStatus::MustBuild => text.yellow(),
        BinaryStatus::Cached => text.green(),
        BinaryStatus::Download => text.blue(),
        BinaryStatus::Editable => text.magenta(),
        BinaryStatus::Missing => text.red().bold(),
        BinaryStatus::Skip | BinaryStatus::Unknown => text.bright_black(),
    }
}

/// Render the graph below its root. Nodes reached twice are expanded once.
#[must_use]
pub fn render_tree(graph: &DepsGraph) -> String {
    let Some(root) = graph.root() else {
        return "Empty graph\n".to_string();
    };

    let mut printer = TreePrinter {
        graph,
        out: String::new(),
        displayed: HashSet::from([root]),
        duplicates: false,
    };
    let _ = writeln!(printer.out, "{}", graph[root].display_name().cyan().bold());
    printer.print_children(root, "");

    if printer.duplicates {
        let _ = writeln!(printer.out, "\n{}", "(*) = already shown above".bright_black());
    }
    printer.out
}

struct TreePrinter<'a> {
    graph: &'a DepsGraph,
    out: String,
    displayed: HashSet<NodeIndex>,
    duplicates: bool,
}

impl TreePrinter<'_> {
    fn print_children(&mut self, index: NodeIndex, prefix: &str) {
        let children = self.graph.dependencies(index);
        for (i, (edge, child)) in children.iter().enumerate() {
            let is_last = i == children.len() - 1;
            let connector = if is_last { "└── " } else { "├── " };
            let node = &self.graph[*child];

            let mut line = format!("{prefix}{connector}{}", node.display_name().cyan());
            if edge.kind == EdgeKind::Build {
                line.push_str(&format!(" {}", "[build]".bright_black()));
            } else if edge.private {
                line.push_str(&format!(" {}", "[private]".bright_black()));
            }
            line.push_str(&format!(" {}", colored_status(node.binary)));

            let duplicate = !self.displayed.insert(*child);
            if duplicate {
                self.duplicates = true;
                line.push_str(&format!(" {}", "(*)".bright_black()));
            }
            let _ = writeln!(self.out, "{line}");

            if !duplicate {
                let child_prefix = if is_last { format!("{prefix}    ") } else { format!("{prefix}│   ") };
                self.print_children(*child, &child_prefix);
            }
        }
    }
}

#[derive(Serialize)]
struct JsonResolution<'a> {
    root_reference: Option<String>,
    nodes: Vec<JsonNode>,
    events: &'a ResolutionReport,
}

#[derive(Serialize)]
struct JsonNode {
    id: NodeId,
    name: String,
    reference: Option<String>,
    kind: RecipeKind,
    context: String,
    binary: BinaryStatus,
    package_id: Option<PackageId>,
    recipe_remote: Option<String>,
    binary_remote: Option<String>,
    requires: Vec<NodeId>,
    build_requires: Vec<NodeId>,
    public_closure: Vec<String>,
}

/// Every node, dependencies first, with the events of the resolution.
pub fn render_json(resolution: &Resolution) -> Result<String> {
    let graph = &resolution.graph;
    let ids = |nodes: Vec<NodeIndex>| -> Vec<NodeId> { nodes.into_iter().map(|dep| graph[dep].id).collect() };

    let nodes = graph
        .ordered_iterate(None)
        .into_iter()
        .map(|index| {
            let node = &graph[index];
            JsonNode {
                id: node.id,
                name: node.display_name(),
                reference: node.reference.as_ref().map(|reference| reference.full_str()),
                kind: node.kind,
                context: match node.context {
                    EvalContext::Host => "host".to_string(),
                    EvalContext::BuildOf(id) => format!("build:{id}"),
                },
                binary: node.binary,
                package_id: node.package_id.clone(),
                recipe_remote: node.recipe_remote.clone(),
                binary_remote: node.binary_remote.clone(),
                requires: ids(graph.requires_of(index)),
                build_requires: ids(graph.build_requires_of(index)),
                public_closure: node.public_closure.keys().cloned().collect(),
            }
        })
        .collect();

    let json = JsonResolution {
        root_reference: resolution.root_reference.as_ref().map(|reference| reference.full_str()),
        nodes,
        events: &resolution.report,
    };
    Ok(serde_json::to_string_pretty(&json)?)
}
