//! cpkg - dependency graph resolution for a source package manager
//!
//! Given a root (the user's recipe, or a list of package references), a
//! profile and the configured indexes, cpkg computes the full dependency
//! graph: the regular requirements of every package, the build requirements
//! of the packages that must be built, and the binary status of each node.
//! The result can be locked so later resolutions reproduce it exactly.
//!
//! # Resolution pipeline
//!
//! 1. [`loader`] turns recipe files into [`model::Recipe`] values
//! 2. [`graph::GraphBuilder`] expands regular requirements depth first,
//!    applying downstream overrides, solving version ranges through
//!    [`remote::RecipeRegistry`] and detecting conflicts and cycles
//! 3. [`graph::BuildRequiresExpander`] asks the [`graph::BinaryAnalyzer`]
//!    which nodes must be built and attaches their build requirements in a
//!    per-node build context
//! 4. [`lockfile::GraphLock`] seeds or reconciles the lock
//!
//! [`graph::GraphManager`] runs the whole pipeline for a
//! [`graph::GraphRequest`].
//!
//! # Modules
//!
//! - [`cli`] - `graph` and `lock` commands
//! - [`config`] - global configuration (`~/.cpkg/config.toml`)
//! - [`constants`] - file names and reserved values
//! - [`core`] - [`core::CpkgError`] and user-facing error rendering
//! - [`graph`] - the resolution engine
//! - [`loader`] - recipe loading
//! - [`lockfile`] - graph locks and install-folder state
//! - [`model`] - references, requirements, recipes and profiles
//! - [`remote`] - recipe and binary indexes
//! - [`utils`] - filesystem and platform helpers
//! - [`version`] - version coercion and range expressions

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod graph;
pub mod loader;
pub mod lockfile;
pub mod model;
pub mod remote;
pub mod utils;
pub mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
