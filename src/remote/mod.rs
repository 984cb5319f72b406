//! Recipe indexes ("remotes") and the registry that queries them in order.
//!
//! Transport and caching of recipes are not part of the graph engine: it only
//! sees the [`RecipeIndex`] trait. The registry distinguishes failures that
//! let it try the next index ([`RemoteError::NotFound`],
//! [`RemoteError::Unreachable`]) from those that abort the resolution
//! ([`RemoteError::Fatal`]). Retrying is left to each index.

pub mod directory;

pub use directory::DirectoryIndex;

use anyhow::Result;
use std::cmp::Ordering;
use strsim::levenshtein;
use thiserror::Error;
use tracing::{debug, trace};

use crate::core::CpkgError;
use crate::graph::events::{ResolutionEvent, ResolutionReport};
use crate::graph::node::PackageId;
use crate::model::{Recipe, Reference, Requirement};
use crate::version::compare_versions;

/// Failure reported by a [`RecipeIndex`].
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The index does not have the item.
    #[error("not found: {0}")]
    NotFound(String),
    /// The index cannot be reached right now.
    #[error("unreachable: {0}")]
    Unreachable(String),
    /// The index answered with an error that must stop the resolution.
    #[error("{0}")]
    Fatal(String),
}

/// A version available in an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Reference including the revision when the index knows it.
    pub reference: Reference,
    pub revision_time: Option<u64>,
}

/// A source of recipes and binaries.
pub trait RecipeIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Local indexes are consulted before remote ones unless updating.
    fn is_local(&self) -> bool;

    /// Every version of `name` with the given user and channel.
    fn search(
        &self,
        name: &str,
        user: Option<&str>,
        channel: Option<&str>,
    ) -> std::result::Result<Vec<Candidate>, RemoteError>;

    /// The recipe of `reference` (revision ignored).
    fn fetch(&self, reference: &Reference) -> std::result::Result<Recipe, RemoteError>;

    fn has_binary(
        &self,
        reference: &Reference,
        package_id: &PackageId,
    ) -> std::result::Result<bool, RemoteError>;

    /// Package names known to the index, for suggestions.
    fn package_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A recipe together with the index that provided it.
#[derive(Debug, Clone)]
pub struct FetchedRecipe {
    pub recipe: Recipe,
    pub remote: String,
}

/// Ordered collection of indexes.
#[derive(Default)]
pub struct RecipeRegistry {
    indexes: Vec<Box<dyn RecipeIndex>>,
}

impl std::fmt::Debug for RecipeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.indexes.iter().map(|index| index.name()).collect();
        f.debug_struct("RecipeRegistry").field("indexes", &names).finish()
    }
}

impl RecipeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, index: impl RecipeIndex + 'static) {
        self.indexes.push(Box::new(index));
    }

    #[must_use]
    pub fn with_index(mut self, index: impl RecipeIndex + 'static) -> Self {
        self.push(index);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Indexes in query order: local ones first, or remote ones first when
    /// checking for updates. Declaration order is kept within each group.
    fn ordered(&self, update: bool) -> Vec<&dyn RecipeIndex> {
        let mut ordered: Vec<&dyn RecipeIndex> = self.indexes.iter().map(AsRef::as_ref).collect();
        ordered.sort_by_key(|index| index.is_local() == update);
        ordered
    }

    /// Fetch the recipe of `reference` from the first index that has it.
    ///
    /// When `reference` carries a revision the first index holding that
    /// revision wins. If none does, the first index holding any revision is
    /// used and the caller compares revisions.
    ///
    /// # Errors
    ///
    /// [`CpkgError::RecipeNotFound`] when no index has it (with a "did you
    /// mean" suggestion when a similar name exists), [`CpkgError::RemoteFatal`]
    /// when an index fails fatally.
    pub fn fetch(
        &self,
        reference: &Reference,
        update: bool,
        report: &mut ResolutionReport,
    ) -> Result<FetchedRecipe> {
        let wanted = reference.revision.as_deref();
        let plain = reference.without_revision();
        let mut fallback: Option<FetchedRecipe> = None;
        for index in self.ordered(update) {
            match index.fetch(&plain) {
                Ok(recipe) if wanted.is_none() || recipe.revision.as_deref() == wanted => {
                    debug!("Fetched {} from '{}'", reference.full_str(), index.name());
                    return Ok(FetchedRecipe {
                        recipe,
                        remote: index.name().to_string(),
                    });
                }
                Ok(recipe) => {
                    trace!(
                        "'{}' has {} at revision {:?}",
                        index.name(),
                        plain,
                        recipe.revision.as_deref().unwrap_or("none")
                    );
                    if fallback.is_none() {
                        fallback = Some(FetchedRecipe {
                            recipe,
                            remote: index.name().to_string(),
                        });
                    }
                }
                Err(error) => skip_or_abort(index, error, report)?,
            }
        }

        fallback.ok_or_else(|| {
            CpkgError::RecipeNotFound {
                reference: plain.to_string(),
                suggestion: self.suggest(&plain.name),
            }
            .into()
        })
    }

    /// Highest version satisfying a range requirement.
    ///
    /// The first index (in query order) with a satisfying candidate wins;
    /// when updating, every index is searched and the best overall candidate
    /// wins. Equal versions are ordered by revision time. Returns `None`
    /// when nothing matches.
    pub fn resolve_range(
        &self,
        requirement: &Requirement,
        update: bool,
        report: &mut ResolutionReport,
    ) -> Result<Option<(Reference, String)>> {
        let wanted = &requirement.reference;
        let mut best: Option<(Candidate, String)> = None;
        for index in self.ordered(update) {
            let candidates =
                match index.search(&wanted.name, wanted.user.as_deref(), wanted.channel.as_deref()) {
                    Ok(candidates) => candidates,
                    Err(error) => {
                        skip_or_abort(index, error, report)?;
                        continue;
                    }
                };

            for candidate in candidates.into_iter().filter(|c| requirement.accepts(&c.reference)) {
                let better = best
                    .as_ref()
                    .is_none_or(|(current, _)| compare_candidates(&candidate, current).is_gt());
                if better {
                    best = Some((candidate, index.name().to_string()));
                }
            }

            if best.is_some() && !update {
                break;
            }
        }

        Ok(best.map(|(candidate, remote)| (candidate.reference, remote)))
    }

    /// First index holding the binary `package_id` of `reference`, local
    /// indexes first. Returns the index name and whether it is local.
    pub fn find_binary(
        &self,
        reference: &Reference,
        package_id: &PackageId,
        update: bool,
        report: &mut ResolutionReport,
    ) -> Result<Option<(String, bool)>> {
        for index in self.ordered(update) {
            match index.has_binary(reference, package_id) {
                Ok(true) => return Ok(Some((index.name().to_string(), index.is_local()))),
                Ok(false) => {}
                Err(error) => skip_or_abort(index, error, report)?,
            }
        }
        Ok(None)
    }

    fn suggest(&self, name: &str) -> Option<String> {
        self.indexes
            .iter()
            .flat_map(|index| index.package_names())
            .filter(|known| known != name)
            .map(|known| (levenshtein(name, &known), known))
            .filter(|(distance, _)| *distance <= name.len().max(2) / 2)
            .min()
            .map(|(_, known)| known)
    }
}

fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    compare_versions(&a.reference.version, &b.reference.version)
        .then(a.revision_time.unwrap_or(0).cmp(&b.revision_time.unwrap_or(0)))
}

fn skip_or_abort(
    index: &dyn RecipeIndex,
    error: RemoteError,
    report: &mut ResolutionReport,
) -> Result<()> {
    match error {
        RemoteError::Fatal(reason) => Err(CpkgError::RemoteFatal {
            remote: index.name().to_string(),
            reason,
        }
        .into()),
        RemoteError::NotFound(_) => Ok(()),
        RemoteError::Unreachable(reason) => {
            report.push(ResolutionEvent::RemoteSkipped {
                remote: index.name().to_string(),
                reason,
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InMemoryIndex, RemoteFailure};

    fn registry() -> RecipeRegistry {
        let local = InMemoryIndex::local("cache")
            .with_recipe(Recipe::new("B", "1.5"))
            .with_recipe(Recipe::new("zlib", "1.2.11"));
        let remote = InMemoryIndex::remote("center")
            .with_recipe(Recipe::new("B", "1.9"))
            .with_recipe(Recipe::new("B", "2.0"));
        RecipeRegistry::new().with_index(remote).with_index(local)
    }

    #[test]
    fn test_range_prefers_local_unless_update() {
        let registry = registry();
        let requirement = Requirement::parse("B/[>=1.0 <2.0]").unwrap();
        let mut report = ResolutionReport::new();

        let (reference, remote) =
            registry.resolve_range(&requirement, false, &mut report).unwrap().unwrap();
        assert_eq!((reference.version.as_str(), remote.as_str()), ("1.5", "cache"));

        let (reference, remote) =
            registry.resolve_range(&requirement, true, &mut report).unwrap().unwrap();
        assert_eq!((reference.version.as_str(), remote.as_str()), ("1.9", "center"));
    }

    #[test]
    fn test_range_ties_broken_by_revision_time() {
        let mut older = Recipe::new("B", "1.9");
        older.revision = Some("old".to_string());
        older.revision_time = Some(10);
        let mut newer = Recipe::new("B", "1.9");
        newer.revision = Some("new".to_string());
        newer.revision_time = Some(20);
        let registry = RecipeRegistry::new()
            .with_index(InMemoryIndex::remote("first").with_recipe(older))
            .with_index(InMemoryIndex::remote("second").with_recipe(newer));

        let requirement = Requirement::parse("B/[>=1.0]").unwrap();
        let (reference, remote) = registry
            .resolve_range(&requirement, true, &mut ResolutionReport::new())
            .unwrap()
            .unwrap();
        assert_eq!(reference.revision.as_deref(), Some("new"));
        assert_eq!(remote, "second");
    }

    #[test]
    fn test_fetch_prefers_index_with_requested_revision() {
        let mut first = Recipe::new("zlib", "1.2.11");
        first.revision = Some("r2".to_string());
        let mut second = Recipe::new("zlib", "1.2.11");
        second.revision = Some("r1".to_string());
        let registry = RecipeRegistry::new()
            .with_index(InMemoryIndex::remote("center").with_recipe(first))
            .with_index(InMemoryIndex::remote("mirror").with_recipe(second));
        let mut report = ResolutionReport::new();

        let pinned = Reference::new("zlib", "1.2.11").with_revision("r1");
        let fetched = registry.fetch(&pinned, false, &mut report).unwrap();
        assert_eq!(fetched.remote, "mirror");
        assert_eq!(fetched.recipe.revision.as_deref(), Some("r1"));

        // Unknown revision: the first index answers and the caller compares.
        let missing = Reference::new("zlib", "1.2.11").with_revision("r9");
        let fetched = registry.fetch(&missing, false, &mut report).unwrap();
        assert_eq!(fetched.remote, "center");

        let plain = registry.fetch(&Reference::new("zlib", "1.2.11"), false, &mut report).unwrap();
        assert_eq!(plain.remote, "center");
    }

    #[test]
    fn test_fetch_not_found_suggests_name() {
        let err = registry()
            .fetch(&Reference::new("zlibb", "1.2.11"), false, &mut ResolutionReport::new())
            .unwrap_err();
        match err.downcast_ref::<CpkgError>() {
            Some(CpkgError::RecipeNotFound {
                suggestion,
                ..
            }) => assert_eq!(suggestion.as_deref(), Some("zlib")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unreachable_is_skipped_and_fatal_aborts() {
        let registry = RecipeRegistry::new()
            .with_index(InMemoryIndex::remote("down").failing(RemoteFailure::Unreachable))
            .with_index(InMemoryIndex::remote("up").with_recipe(Recipe::new("zlib", "1.2.11")));
        let mut report = ResolutionReport::new();
        let fetched = registry.fetch(&Reference::new("zlib", "1.2.11"), false, &mut report).unwrap();
        assert_eq!(fetched.remote, "up");
        assert!(matches!(
            report.events().next(),
            Some(ResolutionEvent::RemoteSkipped { remote, .. }) if remote == "down"
        ));

        let registry = RecipeRegistry::new()
            .with_index(InMemoryIndex::remote("broken").failing(RemoteFailure::Fatal))
            .with_index(InMemoryIndex::remote("up").with_recipe(Recipe::new("zlib", "1.2.11")));
        let err = registry
            .fetch(&Reference::new("zlib", "1.2.11"), false, &mut ResolutionReport::new())
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<CpkgError>(), Some(CpkgError::RemoteFatal { .. })));
    }
}
