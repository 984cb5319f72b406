//! Test utilities for cpkg.
//!
//! - [`InMemoryIndex`]: a [`RecipeIndex`](crate::remote::RecipeIndex) holding
//!   recipes and binaries in memory, with fetch counting and failure injection
//! - [`recipe`]: shorthand for a recipe with requirements
//! - [`DirectoryFixture`]: on-disk recipe indexes, profiles and configs
//!
//! ```rust,no_run
//! use cpkg::remote::RecipeRegistry;
//! use cpkg::test_utils::{InMemoryIndex, recipe};
//!
//! let index = InMemoryIndex::local("cache")
//!     .with_recipe(recipe("liba/1.0", &["zlib/1.2.11"]))
//!     .with_recipe(recipe("zlib/1.2.11", &[]));
//! let fetches = index.fetch_counter();
//! let registry = RecipeRegistry::new().with_index(index);
//! ```

pub mod fixtures;

pub use fixtures::DirectoryFixture;

use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::graph::PackageId;
use crate::model::{Recipe, Reference, Requirement};
use crate::remote::{Candidate, RecipeIndex, RemoteError};

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`; without either nothing is
/// logged.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Recipe for `reference` with the given requirements.
///
/// # Panics
///
/// On invalid references.
#[must_use]
pub fn recipe(reference: &str, requires: &[&str]) -> Recipe {
    let reference = Reference::parse(reference).expect("valid test reference");
    let mut recipe = Recipe::for_reference(&reference);
    for requirement in requires {
        let requirement = Requirement::parse(requirement).expect("valid test requirement");
        recipe
            .requires
            .add(&reference.to_string(), requirement)
            .expect("no duplicate test requirement");
    }
    recipe
}

/// How an [`InMemoryIndex`] fails every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFailure {
    Unreachable,
    Fatal,
}

/// Shared count of fetches per reference (without revision).
#[derive(Debug, Clone, Default)]
pub struct FetchCounter(Arc<Mutex<HashMap<String, usize>>>);

impl FetchCounter {
    /// Fetches of `reference`, e.g. `"zlib/1.2.11"`.
    ///
    /// # Panics
    ///
    /// When the counter lock is poisoned.
    #[must_use]
    pub fn count(&self, reference: &str) -> usize {
        self.0.lock().expect("fetch counter").get(reference).copied().unwrap_or(0)
    }

    /// Fetches of every reference.
    ///
    /// # Panics
    ///
    /// When the counter lock is poisoned.
    #[must_use]
    pub fn total(&self) -> usize {
        self.0.lock().expect("fetch counter").values().sum()
    }

    fn record(&self, reference: &Reference) {
        *self.0.lock().expect("fetch counter").entry(reference.to_string()).or_insert(0) += 1;
    }
}

/// Recipe index backed by memory.
#[derive(Debug, Clone)]
pub struct InMemoryIndex {
    name: String,
    local: bool,
    recipes: IndexMap<String, Recipe>,
    binaries: HashSet<(String, PackageId)>,
    failure: Option<RemoteFailure>,
    fetches: FetchCounter,
}

impl InMemoryIndex {
    /// A local cache index.
    #[must_use]
    pub fn local(name: &str) -> Self {
        Self::new(name, true)
    }

    /// A remote index.
    #[must_use]
    pub fn remote(name: &str) -> Self {
        Self::new(name, false)
    }

    fn new(name: &str, local: bool) -> Self {
        Self {
            name: name.to_string(),
            local,
            recipes: IndexMap::new(),
            binaries: HashSet::new(),
            failure: None,
            fetches: FetchCounter::default(),
        }
    }

    /// Add a recipe. It needs a name and a version.
    ///
    /// # Panics
    ///
    /// When the recipe has no reference.
    #[must_use]
    pub fn with_recipe(mut self, recipe: Recipe) -> Self {
        let reference = recipe.reference().expect("test recipe needs name and version");
        self.recipes.insert(reference.without_revision().to_string(), recipe);
        self
    }

    /// Publish a binary of `reference`.
    #[must_use]
    pub fn with_binary(mut self, reference: &Reference, package_id: PackageId) -> Self {
        self.binaries.insert((reference.without_revision().to_string(), package_id));
        self
    }

    /// Fail every request.
    #[must_use]
    pub const fn failing(mut self, failure: RemoteFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Handle on the fetch counts, usable after the index moved into a
    /// registry.
    #[must_use]
    pub fn fetch_counter(&self) -> FetchCounter {
        self.fetches.clone()
    }

    fn check(&self) -> Result<(), RemoteError> {
        match self.failure {
            Some(RemoteFailure::Unreachable) => {
                Err(RemoteError::Unreachable(format!("{}: connection refused", self.name)))
            }
            Some(RemoteFailure::Fatal) => Err(RemoteError::Fatal("internal server error".to_string())),
            None => Ok(()),
        }
    }
}

impl RecipeIndex for InMemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_local(&self) -> bool {
        self.local
    }

    fn search(
        &self,
        name: &str,
        user: Option<&str>,
        channel: Option<&str>,
    ) -> Result<Vec<Candidate>, RemoteError> {
        self.check()?;
        Ok(self
            .recipes
            .values()
            .filter_map(|recipe| {
                let reference = recipe.reference()?;
                let matches = reference.name == name
                    && reference.user.as_deref() == user
                    && reference.channel.as_deref() == channel;
                matches.then(|| Candidate {
                    reference,
                    revision_time: recipe.revision_time,
                })
            })
            .collect())
    }

    fn fetch(&self, reference: &Reference) -> Result<Recipe, RemoteError> {
        self.check()?;
        let key = reference.without_revision();
        self.fetches.record(&key);
        self.recipes
            .get(&key.to_string())
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(key.to_string()))
    }

    fn has_binary(&self, reference: &Reference, package_id: &PackageId) -> Result<bool, RemoteError> {
        self.check()?;
        Ok(self.binaries.contains(&(reference.without_revision().to_string(), package_id.clone())))
    }

    fn package_names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.recipes.values().filter_map(|recipe| recipe.name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }
}
