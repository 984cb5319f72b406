//! Deterministic ordering of public closures.

use indexmap::IndexMap;
use petgraph::graph::NodeIndex;
use std::collections::HashMap;

use super::DepsGraph;

/// Sort every node's public closure by inverse level.
///
/// Closer dependencies (lower inverse level) come first. Entries on the same
/// level keep their discovery order, so the result only depends on the
/// declaration order of requirements. A node never appears in its own closure.
pub fn order_closures(graph: &mut DepsGraph) {
    let levels: HashMap<NodeIndex, usize> = graph
        .inverse_levels()
        .into_iter()
        .enumerate()
        .flat_map(|(level, nodes)| nodes.into_iter().map(move |index| (index, level)))
        .collect();

    let indices: Vec<NodeIndex> = graph.indices().collect();
    for index in indices {
        let mut entries: Vec<(String, NodeIndex)> = graph[index]
            .public_closure
            .iter()
            .filter(|(_, dependency)| **dependency != index)
            .map(|(name, dependency)| (name.clone(), *dependency))
            .collect();
        entries.sort_by_key(|(_, dependency)| levels.get(dependency).copied().unwrap_or(usize::MAX));
        graph[index].public_closure = entries.into_iter().collect::<IndexMap<_, _>>();
    }
}
