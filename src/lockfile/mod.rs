//! Graph locks: reproducible resolutions.
//!
//! A [`GraphLock`] records, for every node id of a resolved graph, the exact
//! reference, the package id and which node ids it required. A later
//! resolution given the lock pins every requirement to the locked reference
//! and reuses the locked id, so the same inputs always produce the same ids.
//!
//! [`GraphLock::update_check`] reconciles a new graph with the lock: nodes
//! that now resolve differently are an error (the lock is never silently
//! rewritten), missing details are completed and new nodes are appended.
//!
//! # File format
//!
//! ```toml
//! # Auto-generated lockfile - DO NOT EDIT
//! version = 1
//! root_reference = "app/1.0"
//!
//! [profile.settings]
//! os = "Linux"
//!
//! [graph_lock]
//! root = "0"
//!
//! [graph_lock.nodes.0]
//! requires = ["1"]
//!
//! [graph_lock.nodes.1]
//! ref = "zlib/1.2.11#r1"
//! package_id = "9f1c..."
//! build_requires = ["2"]
//! ```
//!
//! Fields this version does not know are kept on load and written back.

pub mod info;
pub mod io;

pub use info::GraphInfo;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::constants::LOCKFILE_VERSION;
use crate::core::CpkgError;
use crate::graph::{DepsGraph, EdgeKind, NodeId, PackageId};
use crate::model::{Profile, Reference};

/// Locked state of one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphLockNode {
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_id: Option<PackageId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_requires: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipe_requires: Vec<Reference>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

impl GraphLockNode {
    fn from_graph(graph: &DepsGraph, index: petgraph::graph::NodeIndex) -> Self {
        let node = &graph[index];
        Self {
            reference: node.reference.clone(),
            package_id: node.package_id.clone(),
            requires: graph.requires_of(index).into_iter().map(|dep| graph[dep].id).collect(),
            build_requires: graph
                .build_requires_of(index)
                .into_iter()
                .map(|dep| graph[dep].id)
                .collect(),
            recipe_requires: node.recipe.recipe_requires.clone(),
            extra: BTreeMap::new(),
        }
    }
}

/// Node id keyed lock of one resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphLock {
    pub root: NodeId,
    #[serde(default)]
    pub nodes: BTreeMap<NodeId, GraphLockNode>,
}

/// What [`GraphLock::update_check`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockCheck {
    /// Graph nodes the lock did not have.
    pub added: Vec<NodeId>,
    /// Locked nodes whose missing revision, package id or build
    /// requirements were filled in.
    pub completed: Vec<NodeId>,
}

impl GraphLock {
    /// Lock every node of `graph`.
    #[must_use]
    pub fn seed(graph: &DepsGraph) -> Self {
        let root = graph.root().map(|index| graph[index].id).unwrap_or_default();
        let nodes = graph
            .indices()
            .map(|index| (graph[index].id, GraphLockNode::from_graph(graph, index)))
            .collect();
        Self {
            root,
            nodes,
        }
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&GraphLockNode> {
        self.nodes.get(&id)
    }

    /// Highest id in use.
    #[must_use]
    pub fn max_id(&self) -> Option<NodeId> {
        self.nodes.keys().next_back().copied().max(Some(self.root))
    }

    /// The node `parent` required under `name` through an edge of `kind`.
    #[must_use]
    pub fn locked_child(&self, parent: NodeId, name: &str, kind: EdgeKind) -> Option<(NodeId, &Reference)> {
        let parent = self.nodes.get(&parent)?;
        let children = match kind {
            EdgeKind::Requires => &parent.requires,
            EdgeKind::Build => &parent.build_requires,
        };
        children.iter().find_map(|id| {
            let reference = self.nodes.get(id)?.reference.as_ref()?;
            (reference.name == name).then_some((*id, reference))
        })
    }

    /// Recipe requirements locked for the root.
    #[must_use]
    pub fn root_recipe_requires(&self) -> &[Reference] {
        self.nodes.get(&self.root).map_or(&[], |node| node.recipe_requires.as_slice())
    }

    /// Reconcile `graph` with the lock.
    ///
    /// # Errors
    ///
    /// [`CpkgError::LockInconsistency`] when a locked node now has another
    /// identity, another revision or another set of build requirements.
    /// Nodes whose build requirements were not expanded this time are not
    /// compared on them, and a lock taken without build requirements gains
    /// them.
    pub fn update_check(&mut self, graph: &DepsGraph) -> Result<LockCheck> {
        let mut check = LockCheck::default();
        let root = graph.root();

        for index in graph.indices() {
            let node = &graph[index];
            let Some(locked) = self.nodes.get_mut(&node.id) else {
                self.nodes.insert(node.id, GraphLockNode::from_graph(graph, index));
                check.added.push(node.id);
                continue;
            };

            let inconsistent = |reason: String| -> anyhow::Error {
                CpkgError::LockInconsistency {
                    node_id: node.id.to_string(),
                    reason,
                }
                .into()
            };

            let mut completed = false;
            if let Some(resolved) = &node.reference {
                match &mut locked.reference {
                    Some(locked_ref) => {
                        if !locked_ref.same_identity(resolved) {
                            return Err(inconsistent(format!(
                                "locked as {locked_ref} but resolved to {resolved}"
                            )));
                        }
                        if let (Some(a), Some(b)) = (&locked_ref.revision, &resolved.revision)
                            && a != b
                        {
                            return Err(inconsistent(format!(
                                "{resolved} locked at revision {a} but resolved revision {b}"
                            )));
                        }
                        if locked_ref.revision.is_none() && resolved.revision.is_some() {
                            locked_ref.revision.clone_from(&resolved.revision);
                            completed = true;
                        }
                    }
                    None => {
                        locked.reference = Some(resolved.clone());
                        completed = true;
                    }
                }
            } else if let Some(locked_ref) = &locked.reference
                && Some(index) != root
            {
                return Err(inconsistent(format!("locked as {locked_ref} but resolved to nothing")));
            }

            let build_order: Vec<NodeId> =
                graph.build_requires_of(index).into_iter().map(|dep| graph[dep].id).collect();
            let resolved_build: BTreeSet<NodeId> = build_order.iter().copied().collect();
            let locked_build: BTreeSet<NodeId> = locked.build_requires.iter().copied().collect();
            if locked_build.is_empty() && !resolved_build.is_empty() {
                locked.build_requires = build_order;
                completed = true;
            } else if !resolved_build.is_empty() && resolved_build != locked_build {
                return Err(inconsistent(format!(
                    "build requirements changed from {} to {}",
                    format_ids(&locked_build),
                    format_ids(&resolved_build)
                )));
            }

            if locked.package_id.is_none() && node.package_id.is_some() {
                locked.package_id.clone_from(&node.package_id);
                completed = true;
            }
            if completed {
                check.completed.push(node.id);
            }
        }
        Ok(check)
    }
}

fn format_ids(ids: &BTreeSet<NodeId>) -> String {
    let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
    format!("[{}]", ids.join(", "))
}

/// A lock persisted with the profile that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLockFile {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_reference: Option<Reference>,
    #[serde(default)]
    pub profile: Profile,
    pub graph_lock: GraphLock,
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

impl GraphLockFile {
    #[must_use]
    pub fn new(profile: Profile, root_reference: Option<Reference>, graph_lock: GraphLock) -> Self {
        Self {
            version: LOCKFILE_VERSION,
            profile,
            root_reference,
            graph_lock,
            extra: BTreeMap::new(),
        }
    }
}
