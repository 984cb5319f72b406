//! Build-requirement expansion.
//!
//! Build requirements are only needed by nodes that will be built (or whose
//! build need is still undecided) and by the consumer root. Each expansion
//! round extends the graph at such a node, asks the binary analyzer about the
//! added nodes and recurses into them.
//!
//! Profile rules are applied in two ways. A rule naming a tool the recipe
//! already declares replaces the declared version in place. A rule naming a
//! new tool adds it, but the subtree it pulls in is expanded without any
//! profile rules, otherwise a rule like `&!` would match the tool it just
//! added and never stop.

use anyhow::Result;
use std::collections::HashSet;
use tracing::debug;

use super::binary::BinaryAnalyzer;
use super::build_mode::BuildMode;
use super::builder::GraphBuilder;
use super::events::{ResolutionEvent, ResolutionReport};
use super::node::{BinaryStatus, RecipeKind};
use super::{DepsGraph, Subgraph};
use crate::model::{BuildRequires, BuildRequiresPolicy, Settings};
use crate::remote::RecipeRegistry;

pub struct BuildRequiresExpander<'a, 'b> {
    builder: &'b mut GraphBuilder<'a>,
    analyzer: &'b dyn BinaryAnalyzer,
    registry: &'b RecipeRegistry,
    build_mode: &'b mut BuildMode,
    settings: &'b Settings,
    update: bool,
    apply: bool,
}

impl<'a, 'b> BuildRequiresExpander<'a, 'b> {
    pub fn new(
        builder: &'b mut GraphBuilder<'a>,
        analyzer: &'b dyn BinaryAnalyzer,
        registry: &'b RecipeRegistry,
        build_mode: &'b mut BuildMode,
        settings: &'b Settings,
    ) -> Self {
        Self {
            builder,
            analyzer,
            registry,
            build_mode,
            settings,
            update: false,
            apply: true,
        }
    }

    #[must_use]
    pub const fn with_update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    /// When disabled only the binary analysis runs.
    #[must_use]
    pub const fn with_build_requires(mut self, apply: bool) -> Self {
        self.apply = apply;
        self
    }

    /// Evaluate binaries of `subgraph`, then add the build requirements of
    /// its nodes, recursing into every subgraph added.
    pub fn expand(
        &mut self,
        graph: &mut DepsGraph,
        subgraph: &Subgraph,
        policy: &BuildRequiresPolicy,
        report: &mut ResolutionReport,
    ) -> Result<()> {
        self.analyzer.evaluate(graph, subgraph, self.build_mode, self.update, self.registry, report)?;
        if !self.apply {
            return Ok(());
        }

        for index in graph.ordered_iterate(Some(subgraph)) {
            let node = &graph[index];
            if node.kind == RecipeKind::Virtual {
                continue;
            }
            let needs_build = matches!(node.binary, BinaryStatus::MustBuild | BinaryStatus::Editable);
            if !needs_build && !node.is_consumer() && node.package_id.is_some() {
                continue;
            }

            let printed = node.display_name();
            let mut package_build_requires = node.recipe.evaluate_build_requirements(self.settings)?;
            let mut overridden = HashSet::new();
            let mut profile_build_requires = BuildRequires::new();
            for (pattern, references) in policy.iter() {
                if !pattern.matches(node.is_consumer(), &printed) {
                    continue;
                }
                for reference in references {
                    if package_build_requires.contains(&reference.name) {
                        debug!("Profile sets {} for {}", reference, printed);
                        package_build_requires.add(reference.clone());
                        overridden.insert(reference.name.clone());
                    } else if reference.name != node.name() {
                        profile_build_requires.add(reference.clone());
                    }
                }
            }

            if !package_build_requires.is_empty() {
                for reference in package_build_requires.values() {
                    report.push(ResolutionEvent::BuildRequireAdded {
                        node: printed.clone(),
                        reference: reference.to_string(),
                        from_profile: overridden.contains(&reference.name),
                    });
                }
                let added =
                    self.builder.extend_build_requires(graph, index, &package_build_requires, report)?;
                self.expand(graph, &added, policy, report)?;
            }

            if !profile_build_requires.is_empty() {
                for reference in profile_build_requires.values() {
                    report.push(ResolutionEvent::BuildRequireAdded {
                        node: printed.clone(),
                        reference: reference.to_string(),
                        from_profile: true,
                    });
                }
                let added =
                    self.builder.extend_build_requires(graph, index, &profile_build_requires, report)?;
                self.expand(graph, &added, &BuildRequiresPolicy::empty(), report)?;
            }
        }
        Ok(())
    }
}
