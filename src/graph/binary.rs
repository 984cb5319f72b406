//! Binary analysis: which nodes need a build and which binary they use.

use anyhow::Result;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::build_mode::BuildMode;
use super::events::{ResolutionEvent, ResolutionReport};
use super::node::{BinaryStatus, PackageId, RecipeKind};
use super::{DepsGraph, Subgraph};
use crate::model::Profile;
use crate::remote::RecipeRegistry;
use crate::version::coerce_version;

/// Decides binary status and package id of the nodes of a subgraph.
///
/// Called once per expansion round over the nodes that round added.
/// Implementations must be idempotent: nodes already decided are left as is.
pub trait BinaryAnalyzer {
    fn evaluate(
        &self,
        graph: &mut DepsGraph,
        subgraph: &Subgraph,
        build_mode: &mut BuildMode,
        update: bool,
        registry: &RecipeRegistry,
        report: &mut ResolutionReport,
    ) -> Result<()>;
}

/// How dependencies contribute to a package id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageIdMode {
    /// Dependency name and major version only.
    #[default]
    Semver,
    /// Full dependency reference and package id. A node whose dependency is
    /// rebuilt cannot know its own id until that build happens.
    Full,
}

/// Hash based [`BinaryAnalyzer`].
///
/// The package id is the SHA-256 of the node identity, the profile settings
/// the recipe declares, its effective options and its dependencies.
#[derive(Debug, Clone)]
pub struct PackageIdAnalyzer {
    profile: Profile,
    mode: PackageIdMode,
}

impl PackageIdAnalyzer {
    #[must_use]
    pub const fn new(profile: Profile, mode: PackageIdMode) -> Self {
        Self {
            profile,
            mode,
        }
    }

    /// `None` when the id depends on a binary that does not exist yet.
    fn compute_package_id(&self, graph: &DepsGraph, index: NodeIndex) -> Option<PackageId> {
        let node = &graph[index];
        let mut hasher = Sha256::new();
        hasher.update(b"[reference]\n");
        hasher.update(node.display_name().as_bytes());

        hasher.update(b"\n[settings]\n");
        for name in &node.recipe.settings {
            if let Some(value) = self.profile.settings.get(name) {
                hasher.update(format!("{name}={value}\n").as_bytes());
            }
        }

        hasher.update(b"[options]\n");
        for (option, default) in &node.recipe.options {
            let value = self.profile.option_value(
                node.name(),
                option,
                Some(default.as_str()),
                node.is_consumer(),
            );
            hasher.update(format!("{option}={}\n", value.unwrap_or_default()).as_bytes());
        }

        // Direct requirements plus what they expose, sorted by name.
        let mut dependencies = BTreeMap::new();
        for dependency in graph.requires_of(index) {
            dependencies.insert(graph[dependency].name().to_string(), dependency);
            for (name, transitive) in &graph[dependency].public_closure {
                dependencies.entry(name.clone()).or_insert(*transitive);
            }
        }

        hasher.update(b"[requires]\n");
        for dependency in dependencies.values() {
            let dependency = &graph[*dependency];
            let line = match self.mode {
                PackageIdMode::Semver => {
                    let reference = dependency.reference.as_ref()?;
                    let major = coerce_version(&reference.version)
                        .map_or_else(|| reference.version.clone(), |v| format!("{}.Y.Z", v.major));
                    format!("{}/{major}", reference.name)
                }
                PackageIdMode::Full => {
                    if dependency.binary == BinaryStatus::MustBuild {
                        return None;
                    }
                    let reference = dependency.reference.as_ref()?;
                    let package_id = dependency.package_id.as_ref()?;
                    format!("{}:{package_id}", reference.full_str())
                }
            };
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }

        Some(PackageId::new(hex::encode(hasher.finalize())))
    }
}

impl BinaryAnalyzer for PackageIdAnalyzer {
    fn evaluate(
        &self,
        graph: &mut DepsGraph,
        subgraph: &Subgraph,
        build_mode: &mut BuildMode,
        update: bool,
        registry: &RecipeRegistry,
        report: &mut ResolutionReport,
    ) -> Result<()> {
        for index in graph.ordered_iterate(Some(subgraph)) {
            if graph[index].binary != BinaryStatus::Unknown {
                continue;
            }
            match graph[index].kind {
                RecipeKind::Virtual => {
                    graph[index].binary = BinaryStatus::Skip;
                    continue;
                }
                RecipeKind::Consumer => {
                    // The consumer is built by the user; only its id is needed.
                    graph[index].package_id = self.compute_package_id(graph, index);
                    continue;
                }
                RecipeKind::Editable => {
                    graph[index].package_id = self.compute_package_id(graph, index);
                    graph[index].binary = BinaryStatus::Editable;
                    continue;
                }
                RecipeKind::Regular => {}
            }

            let package_id = self.compute_package_id(graph, index);
            let node = &graph[index];
            let reference = node.display_name();
            let policy = node.recipe.build_policy;
            let dependency_rebuilt = graph
                .neighbors(index)
                .into_iter()
                .any(|dep| graph[dep].binary == BinaryStatus::MustBuild);

            let mut remote = None;
            let status = if build_mode.forced(node.name(), &reference, policy)
                || (build_mode.cascade() && dependency_rebuilt)
            {
                BinaryStatus::MustBuild
            } else if let Some(package_id) = &package_id {
                let found = match &node.reference {
                    Some(node_reference) => {
                        registry.find_binary(node_reference, package_id, update, report)?
                    }
                    None => None,
                };
                match found {
                    Some((name, true)) => {
                        remote = Some(name);
                        BinaryStatus::Cached
                    }
                    Some((name, false)) => {
                        remote = Some(name);
                        BinaryStatus::Download
                    }
                    None if build_mode.allowed(policy) => BinaryStatus::MustBuild,
                    None => BinaryStatus::Missing,
                }
            } else if build_mode.allowed(policy) {
                BinaryStatus::MustBuild
            } else {
                // Undecided until its dependencies are built.
                BinaryStatus::Unknown
            };

            report.push(ResolutionEvent::BinaryEvaluated {
                node: reference,
                status,
                package_id: package_id.clone(),
            });
            let node = &mut graph[index];
            node.package_id = package_id;
            node.binary = status;
            node.binary_remote = remote;
        }
        Ok(())
    }
}
