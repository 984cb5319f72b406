//! Resolution entry point.
//!
//! [`GraphManager::load_graph`] turns a [`GraphRequest`] into a
//! [`Resolution`]:
//!
//! 1. load the root recipe (the user's recipe, or a virtual recipe wrapping
//!    references)
//! 2. build the graph of regular requirements
//! 3. expand build requirements and analyze binaries
//! 4. order public closures
//! 5. seed a new lock, or reconcile the graph with the given one

use anyhow::Result;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::binary::BinaryAnalyzer;
use super::build_mode::BuildMode;
use super::builder::GraphBuilder;
use super::closure::order_closures;
use super::events::{ResolutionEvent, ResolutionReport};
use super::expander::BuildRequiresExpander;
use super::node::{Node, NodeId, RecipeKind};
use super::{DepsGraph, Subgraph};
use crate::constants::LOCKFILE_NAME;
use crate::core::CpkgError;
use crate::loader::{ConsumerOptions, RecipeLoader};
use crate::lockfile::{GraphInfo, GraphLock, GraphLockFile};
use crate::model::{Profile, Recipe, Reference, Requirement};
use crate::remote::RecipeRegistry;

/// What the graph is resolved for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootTarget {
    /// A recipe file, or a folder containing one.
    Path(PathBuf),
    /// One package reference.
    Reference(Reference),
    /// Several package references resolved together.
    References(Vec<Reference>),
}

/// Inputs of one resolution.
#[derive(Debug, Clone)]
pub struct GraphRequest {
    pub target: RootTarget,
    /// Identity overrides for a [`RootTarget::Path`] recipe.
    pub consumer: ConsumerOptions,
    /// Package under test: required by the consumer in place of any
    /// requirement of the same name.
    pub create_reference: Option<Reference>,
    pub profile: Profile,
    /// `--build` values.
    pub build_patterns: Vec<String>,
    pub update: bool,
    pub lock: Option<GraphLock>,
    pub apply_build_requires: bool,
}

impl GraphRequest {
    #[must_use]
    pub fn new(target: RootTarget, profile: Profile) -> Self {
        Self {
            target,
            consumer: ConsumerOptions::default(),
            create_reference: None,
            profile,
            build_patterns: Vec::new(),
            update: false,
            lock: None,
            apply_build_requires: true,
        }
    }

    #[must_use]
    pub fn with_build_patterns<S: Into<String>>(mut self, patterns: impl IntoIterator<Item = S>) -> Self {
        self.build_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_lock(mut self, lock: Option<GraphLock>) -> Self {
        self.lock = lock;
        self
    }

    #[must_use]
    pub const fn with_update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    #[must_use]
    pub const fn with_build_requires(mut self, apply: bool) -> Self {
        self.apply_build_requires = apply;
        self
    }

    #[must_use]
    pub fn with_create_reference(mut self, reference: Reference) -> Self {
        self.create_reference = Some(reference);
        self
    }

    #[must_use]
    pub fn with_consumer(mut self, consumer: ConsumerOptions) -> Self {
        self.consumer = consumer;
        self
    }
}

/// Output of [`GraphManager::load_graph`].
#[derive(Debug)]
pub struct Resolution {
    pub graph: DepsGraph,
    /// The new lock, or the given lock reconciled with the graph.
    pub lock: GraphLock,
    pub report: ResolutionReport,
    pub root_reference: Option<Reference>,
}

/// A consumer recipe loaded with the state of a previous install.
#[derive(Debug, Clone)]
pub struct LocalConsumer {
    pub recipe: Recipe,
    /// The locked profile when the install folder has a lock.
    pub profile: Profile,
    pub options: ConsumerOptions,
}

/// Runs resolutions against one set of collaborators.
pub struct GraphManager<'a> {
    loader: &'a dyn RecipeLoader,
    registry: &'a RecipeRegistry,
    analyzer: &'a dyn BinaryAnalyzer,
    editables: IndexMap<String, PathBuf>,
    revisions_enabled: bool,
}

impl<'a> GraphManager<'a> {
    pub fn new(
        loader: &'a dyn RecipeLoader,
        registry: &'a RecipeRegistry,
        analyzer: &'a dyn BinaryAnalyzer,
    ) -> Self {
        Self {
            loader,
            registry,
            analyzer,
            editables: IndexMap::new(),
            revisions_enabled: false,
        }
    }

    /// Packages developed in place, keyed by reference without revision.
    #[must_use]
    pub fn with_editables(mut self, editables: IndexMap<String, PathBuf>) -> Self {
        self.editables = editables;
        self
    }

    #[must_use]
    pub const fn with_revisions(mut self, enabled: bool) -> Self {
        self.revisions_enabled = enabled;
        self
    }

    /// Resolve the full graph of `request`.
    ///
    /// Nothing is written: persisting the lock is up to the caller, once the
    /// resolution succeeded.
    pub fn load_graph(&self, request: GraphRequest) -> Result<Resolution> {
        let GraphRequest {
            target,
            consumer,
            create_reference,
            profile,
            build_patterns,
            update,
            lock,
            apply_build_requires,
        } = request;

        let mut build_mode = BuildMode::new(build_patterns.as_slice())?;
        let mut report = ResolutionReport::new();

        let (recipe, kind, root_reference) = match &target {
            RootTarget::References(references) => {
                for reference in references {
                    self.check_revision(reference)?;
                }
                (self.loader.load_virtual(references, &profile)?, RecipeKind::Virtual, None)
            }
            RootTarget::Reference(reference) => {
                self.check_revision(reference)?;
                let recipe = self.loader.load_virtual(std::slice::from_ref(reference), &profile)?;
                (recipe, RecipeKind::Virtual, Some(reference.clone()))
            }
            RootTarget::Path(path) => {
                let mut options = consumer;
                if let Some(lock) = &lock
                    && create_reference.is_none()
                {
                    options.locked_recipe_requires = lock.root_recipe_requires().to_vec();
                }
                let mut recipe = self.loader.load_consumer(path, &profile, &options)?;
                if let Some(created) = &create_reference {
                    // The test recipe keeps its own name and version but
                    // lives in the tested package's user and channel.
                    debug!("Testing {} with {}", created, path.display());
                    recipe.requires.replace(Requirement::from_reference(created)?);
                    recipe.user.clone_from(&created.user);
                    recipe.channel.clone_from(&created.channel);
                }
                let reference = recipe.reference();
                (recipe, RecipeKind::Consumer, reference)
            }
        };

        let root_id = lock.as_ref().map_or(NodeId(0), |lock| lock.root);
        let root = Node::new(root_id, None, recipe, kind);

        let mut graph = {
            let mut builder = GraphBuilder::new(self.loader, self.registry, &self.editables)
                .with_lock(lock.as_ref())
                .with_update(update);
            let mut graph = builder.load_graph(root, &mut report)?;

            let everything: Subgraph = graph.indices().collect();
            BuildRequiresExpander::new(
                &mut builder,
                self.analyzer,
                self.registry,
                &mut build_mode,
                &profile.settings,
            )
            .with_update(update)
            .with_build_requires(apply_build_requires)
            .expand(&mut graph, &everything, &profile.build_requires, &mut report)?;
            debug!("Fetched {} recipes", builder.fetched_recipes());
            graph
        };
        order_closures(&mut graph);

        let lock = match lock {
            Some(mut lock) => {
                let check = lock.update_check(&graph)?;
                for id in check.added {
                    report.push(ResolutionEvent::LockNodeAdded {
                        id,
                    });
                }
                lock
            }
            None => GraphLock::seed(&graph),
        };

        for pattern in build_mode.unmatched_patterns() {
            report.push(ResolutionEvent::UnmatchedBuildPattern {
                pattern,
            });
        }

        info!("Resolved {} packages", graph.len().saturating_sub(1));
        Ok(Resolution {
            graph,
            lock,
            report,
            root_reference,
        })
    }

    /// Load the user's recipe the way a previous install into `info_folder`
    /// did: same root identity, same profile, same locked recipe
    /// requirements. Without install state, `fallback` is the profile.
    pub fn load_consumer_recipe(
        &self,
        path: &Path,
        info_folder: Option<&Path>,
        fallback: &Profile,
    ) -> Result<LocalConsumer> {
        let mut options = ConsumerOptions::default();
        let mut profile = fallback.clone();

        if let Some(folder) = info_folder {
            let info = GraphInfo::load(folder)?;
            if let Some(lockfile) = GraphLockFile::load(&folder.join(LOCKFILE_NAME))? {
                debug!("Using locked profile from {}", folder.display());
                options.locked_recipe_requires = lockfile.graph_lock.root_recipe_requires().to_vec();
                profile = lockfile.profile;
            }
            if let Some(info) = info {
                options.name = info.name;
                options.version = info.version;
                options.user = info.user;
                options.channel = info.channel;
                profile.options.extend(info.options);
            }
        }

        let recipe = self.loader.load_consumer(path, &profile, &options)?;
        Ok(LocalConsumer {
            recipe,
            profile,
            options,
        })
    }

    fn check_revision(&self, reference: &Reference) -> Result<()> {
        if reference.revision.is_some() && !self.revisions_enabled {
            return Err(CpkgError::RevisionsDisabled {
                reference: reference.full_str(),
            }
            .into());
        }
        Ok(())
    }
}
