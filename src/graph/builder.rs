//! Graph construction: turns requirements into nodes and edges.
//!
//! Requirements are resolved depth first in declaration order. For each one
//! the builder:
//!
//! 1. applies downstream overrides (requirements declared closer to the root
//!    pin transitive requirements of the same name)
//! 2. pins it to the locked reference and node id, when a lock is given
//! 3. rejects it when its name is already on the path from the root
//! 4. reuses the node already resolved for the name in the same evaluation
//!    context, or fails with a conflict when that node does not satisfy it
//! 5. otherwise resolves the version, fetches the recipe once per reference
//!    and recurses into the new node
//!
//! After a node's requirements are processed its public closure is computed.

use anyhow::Result;
use indexmap::IndexMap;
use petgraph::graph::NodeIndex;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, trace};

use super::events::{ResolutionEvent, ResolutionReport};
use super::node::{Edge, EdgeKind, EvalContext, Node, RecipeKind};
use super::{DepsGraph, Subgraph};
use crate::core::CpkgError;
use crate::loader::RecipeLoader;
use crate::lockfile::GraphLock;
use crate::model::{BuildRequires, Reference, Requirement};
use crate::remote::{FetchedRecipe, RecipeRegistry};

/// Requirements declared downstream of a node, by name.
type Overrides = IndexMap<String, Requirement>;

/// Builds and extends a [`DepsGraph`].
///
/// One builder serves a whole resolution so its recipe cache spans the
/// initial graph and every build-requirement extension.
pub struct GraphBuilder<'a> {
    loader: &'a dyn RecipeLoader,
    registry: &'a RecipeRegistry,
    editables: &'a IndexMap<String, PathBuf>,
    lock: Option<&'a GraphLock>,
    update: bool,
    recipe_cache: HashMap<Reference, FetchedRecipe>,
    added: Vec<NodeIndex>,
}

impl<'a> GraphBuilder<'a> {
    /// `editables` maps a reference (without revision) to the folder its
    /// recipe is loaded from.
    pub fn new(
        loader: &'a dyn RecipeLoader,
        registry: &'a RecipeRegistry,
        editables: &'a IndexMap<String, PathBuf>,
    ) -> Self {
        Self {
            loader,
            registry,
            editables,
            lock: None,
            update: false,
            recipe_cache: HashMap::new(),
            added: Vec::new(),
        }
    }

    /// Pin resolution to a previous lock.
    #[must_use]
    pub const fn with_lock(mut self, lock: Option<&'a GraphLock>) -> Self {
        self.lock = lock;
        self
    }

    /// Prefer remote indexes and the newest candidates.
    #[must_use]
    pub const fn with_update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    /// Number of distinct references (revision included) fetched so far.
    #[must_use]
    pub fn fetched_recipes(&self) -> usize {
        self.recipe_cache.len()
    }

    /// Build the graph of `root` and its regular requirements.
    pub fn load_graph(&mut self, root: Node, report: &mut ResolutionReport) -> Result<DepsGraph> {
        let mut graph = DepsGraph::new();
        if let Some(lock) = self.lock {
            // Fresh ids must not collide with locked ones.
            if let Some(max) = lock.max_id() {
                graph.reserve_id(max);
            }
        }

        self.added.clear();
        let root = graph.add_root(root);
        self.expand_node(&mut graph, root, &Overrides::new(), report)?;
        self.added.clear();
        debug!("Initial graph has {} nodes", graph.len());
        Ok(graph)
    }

    /// Resolve `build_requires` as build requirements of `at`, in the
    /// evaluation context of `at`'s build tree. Returns the nodes added.
    pub fn extend_build_requires(
        &mut self,
        graph: &mut DepsGraph,
        at: NodeIndex,
        build_requires: &BuildRequires,
        report: &mut ResolutionReport,
    ) -> Result<Subgraph> {
        self.added.clear();
        for reference in build_requires.values() {
            let requirement = Requirement::from_reference(reference)?;
            self.resolve_requirement(
                graph,
                at,
                requirement,
                EdgeKind::Build,
                &Overrides::new(),
                report,
            )?;
        }
        Ok(self.added.drain(..).collect())
    }

    fn expand_node(
        &mut self,
        graph: &mut DepsGraph,
        index: NodeIndex,
        downstream: &Overrides,
        report: &mut ResolutionReport,
    ) -> Result<()> {
        let requirements: Vec<Requirement> = graph[index].recipe.requires.iter().cloned().collect();

        // Downstream declarations win over this node's own ones.
        let mut overrides = downstream.clone();
        for requirement in &requirements {
            overrides
                .entry(requirement.name().to_string())
                .or_insert_with(|| requirement.clone());
        }

        for requirement in requirements {
            if requirement.is_override {
                continue;
            }
            self.resolve_requirement(graph, index, requirement, EdgeKind::Requires, &overrides, report)?;
        }

        let mut closure = IndexMap::new();
        for (edge, dependency) in graph.dependencies(index) {
            if edge.kind != EdgeKind::Requires || edge.private {
                continue;
            }
            closure.insert(graph[dependency].name().to_string(), dependency);
            for (name, transitive) in &graph[dependency].public_closure {
                closure.entry(name.clone()).or_insert(*transitive);
            }
        }
        closure.retain(|_, dependency| *dependency != index);
        graph[index].public_closure = closure;
        Ok(())
    }

    fn resolve_requirement(
        &mut self,
        graph: &mut DepsGraph,
        requirer: NodeIndex,
        mut requirement: Requirement,
        kind: EdgeKind,
        overrides: &Overrides,
        report: &mut ResolutionReport,
    ) -> Result<()> {
        let requirer_node = &graph[requirer];
        let requirer_id = requirer_node.id;
        let requirer_display = requirer_node.display_name();
        let context = match kind {
            EdgeKind::Requires => requirer_node.context,
            EdgeKind::Build => EvalContext::BuildOf(requirer_id),
        };

        if let Some(down) = overrides.get(requirement.name())
            && (down.reference != requirement.reference || down.range != requirement.range)
        {
            report.push(ResolutionEvent::RequirementOverridden {
                requirer: requirer_display.clone(),
                from: requirement.reference.to_string(),
                to: down.reference.to_string(),
            });
            requirement.reference = down.reference.clone();
            requirement.range = down.range.clone();
        }

        let mut locked_id = None;
        if let Some((id, locked)) =
            self.lock.and_then(|lock| lock.locked_child(requirer_id, requirement.name(), kind))
        {
            trace!("{} pinned by lock to {} (node {id})", requirement, locked.full_str());
            requirement = Requirement {
                reference: locked.clone(),
                range: None,
                private: requirement.private,
                is_override: false,
            };
            locked_id = Some(id);
        }

        let name = requirement.name().to_string();
        let requirer_node = &graph[requirer];
        if requirer_node.name() == name || requirer_node.ancestors.contains(&name) {
            let mut chain: Vec<&str> = requirer_node.ancestors.iter().map(String::as_str).collect();
            chain.push(requirer_node.name());
            let start = chain.iter().position(|n| *n == name).unwrap_or(0);
            let mut chain = chain[start..].to_vec();
            chain.push(name.as_str());
            return Err(CpkgError::CyclicDependency {
                chain: chain.join(" -> "),
            }
            .into());
        }

        let edge = match kind {
            EdgeKind::Requires => Edge::requires(requirement.private),
            EdgeKind::Build => Edge::build(),
        };

        if let Some(existing) = graph.find(&name, context) {
            let existing_node = &graph[existing];
            let compatible =
                existing_node.reference.as_ref().is_some_and(|r| requirement.accepts(r));
            if !compatible {
                let required_by: Vec<String> =
                    graph.dependents(existing).into_iter().map(|i| graph[i].display_name()).collect();
                return Err(CpkgError::Conflict {
                    name,
                    existing: existing_node.display_name(),
                    existing_required_by: required_by.join(", "),
                    requested: requirement.reference.to_string(),
                    requirer: requirer_display,
                }
                .into());
            }
            if graph.reaches(existing, requirer) {
                return Err(CpkgError::CyclicDependency {
                    chain: format!(
                        "{requirer_display} -> {} -> ... -> {requirer_display}",
                        existing_node.display_name()
                    ),
                }
                .into());
            }
            trace!("Reusing {} for {}", existing_node.display_name(), requirer_display);
            graph.add_edge(requirer, existing, edge);
            return Ok(());
        }

        let reference = match &requirement.range {
            Some(_) => {
                let (resolved, remote) = self
                    .registry
                    .resolve_range(&requirement, self.update, report)?
                    .ok_or_else(|| CpkgError::NoMatchingVersion {
                        requirement: requirement.reference.to_string(),
                        requirer: requirer_display.clone(),
                    })?;
                report.push(ResolutionEvent::VersionRangeSolved {
                    requirer: requirer_display.clone(),
                    range: requirement.reference.to_string(),
                    resolved: resolved.to_string(),
                    remote,
                });
                resolved
            }
            None => requirement.reference.clone(),
        };

        let editables = self.editables;
        let editable = editables.get(&reference.without_revision().to_string());
        let (recipe, kind, remote) = match editable {
            Some(path) => {
                debug!("Using editable {} from {}", reference, path.display());
                (self.loader.load_editable(path)?, RecipeKind::Editable, None)
            }
            None => {
                let fetched = self.fetch(&reference, report)?;
                (fetched.recipe, RecipeKind::Regular, Some(fetched.remote))
            }
        };

        if locked_id.is_none()
            && let Some(wanted) = &reference.revision
            && recipe.revision.as_ref() != Some(wanted)
        {
            return Err(CpkgError::RecipeNotFound {
                reference: reference.full_str(),
                suggestion: None,
            }
            .into());
        }

        let mut node_reference = reference.without_revision();
        node_reference.revision.clone_from(&recipe.revision);

        let id = match locked_id {
            Some(id) if graph.node_by_id(id).is_none() => id,
            _ => graph.allocate_id()?,
        };
        let requirer_node = &graph[requirer];
        let mut ancestors = requirer_node.ancestors.clone();
        if !requirer_node.name().is_empty() {
            ancestors.push(requirer_node.name().to_string());
        }

        let mut node = Node::new(id, Some(node_reference), recipe, kind);
        node.context = context;
        node.recipe_remote = remote;
        node.ancestors = ancestors;
        let index = graph.add_node(node);
        graph.add_edge(requirer, index, edge);
        self.added.push(index);

        let child_overrides = match edge.kind {
            EdgeKind::Requires => overrides.clone(),
            EdgeKind::Build => Overrides::new(),
        };
        self.expand_node(graph, index, &child_overrides, report)
    }

    fn fetch(&mut self, reference: &Reference, report: &mut ResolutionReport) -> Result<FetchedRecipe> {
        if let Some(fetched) = self.recipe_cache.get(reference) {
            return Ok(fetched.clone());
        }
        let fetched = self.registry.fetch(reference, self.update, report)?;
        self.recipe_cache.insert(reference.clone(), fetched.clone());
        Ok(fetched)
    }
}
