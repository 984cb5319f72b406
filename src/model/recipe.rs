//! Loaded package definitions.

use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::profile::Settings;
use super::reference::Reference;
use super::requirement::{BuildRequires, Requirements};
use crate::core::CpkgError;

/// Callback name reported when a build-requirements hook fails.
pub const BUILD_REQUIREMENTS_CALLBACK: &str = "build_requirements";

/// When a recipe asks to be built from sources regardless of `--build`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPolicy {
    /// Build when no binary is available.
    Missing,
    /// Always build.
    Always,
}

/// A recipe's own code for adjusting its build requirements.
///
/// Hooks run during build-requirement expansion with the active profile
/// settings and may add or replace entries. Any error is reported as a
/// [`CpkgError::RecipeEvaluation`] naming the recipe.
///
/// Closures implement this trait directly:
///
/// ```rust
/// use cpkg::model::{BuildRequires, Recipe, Reference, Settings};
///
/// let recipe = Recipe::new("app", "1.0").with_hook(|settings: &Settings, br: &mut BuildRequires| -> anyhow::Result<()> {
///     if settings.get("os").map(String::as_str) == Some("Windows") {
///         br.add(Reference::new("nasm", "2.15"));
///     }
///     Ok(())
/// });
/// assert!(recipe.has_hook());
/// ```
pub trait BuildRequirementsHook: Send + Sync {
    /// Mutate `build_requires` in place.
    fn build_requirements(&self, settings: &Settings, build_requires: &mut BuildRequires) -> Result<()>;
}

impl<F> BuildRequirementsHook for F
where
    F: Fn(&Settings, &mut BuildRequires) -> Result<()> + Send + Sync,
{
    fn build_requirements(&self, settings: &Settings, build_requires: &mut BuildRequires) -> Result<()> {
        self(settings, build_requires)
    }
}

/// Package definition produced by a [`RecipeLoader`](crate::loader::RecipeLoader)
/// or fetched from a [`RecipeIndex`](crate::remote::RecipeIndex).
///
/// Consumer recipes may leave `name` and `version` unset; every recipe that
/// lives in an index has both.
#[derive(Clone, Default)]
pub struct Recipe {
    pub name: Option<String>,
    pub version: Option<String>,
    pub user: Option<String>,
    pub channel: Option<String>,
    pub revision: Option<String>,
    /// Seconds since the epoch when the revision was published. Breaks ties
    /// between equal versions during range resolution.
    pub revision_time: Option<u64>,
    pub requires: Requirements,
    pub build_requires: BuildRequires,
    /// Shared recipe code reused by this recipe; pinned by the lock.
    pub recipe_requires: Vec<Reference>,
    /// Names of the profile settings this recipe's binaries depend on.
    pub settings: Vec<String>,
    /// Default option values.
    pub options: IndexMap<String, String>,
    pub build_policy: Option<BuildPolicy>,
    hook: Option<Arc<dyn BuildRequirementsHook>>,
}

impl Recipe {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            version: Some(version.into()),
            ..Self::default()
        }
    }

    /// Recipe with no identity, as used for virtual roots.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Recipe carrying the identity of `reference`.
    #[must_use]
    pub fn for_reference(reference: &Reference) -> Self {
        Self {
            name: Some(reference.name.clone()),
            version: Some(reference.version.clone()),
            user: reference.user.clone(),
            channel: reference.channel.clone(),
            revision: reference.revision.clone(),
            ..Self::default()
        }
    }

    /// Attach a build-requirements hook.
    #[must_use]
    pub fn with_hook(mut self, hook: impl BuildRequirementsHook + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn set_hook(&mut self, hook: Arc<dyn BuildRequirementsHook>) {
        self.hook = Some(hook);
    }

    #[must_use]
    pub fn has_hook(&self) -> bool {
        self.hook.is_some()
    }

    /// The recipe's reference when it has a name and a version.
    #[must_use]
    pub fn reference(&self) -> Option<Reference> {
        let (name, version) = (self.name.as_ref()?, self.version.as_ref()?);
        let mut reference = Reference::new(name.clone(), version.clone());
        if let (Some(user), Some(channel)) = (&self.user, &self.channel) {
            reference = reference.with_user_channel(user.clone(), channel.clone());
        }
        reference.revision.clone_from(&self.revision);
        Some(reference)
    }

    /// Name used in messages: the reference, the bare name, or `consumer`.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (self.reference(), &self.name) {
            (Some(reference), _) => reference.to_string(),
            (None, Some(name)) => name.clone(),
            (None, None) => "consumer".to_string(),
        }
    }

    /// Declared build requirements after running the hook, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CpkgError::RecipeEvaluation`] when the hook fails.
    pub fn evaluate_build_requirements(&self, settings: &Settings) -> Result<BuildRequires> {
        let mut build_requires = self.build_requires.clone();
        if let Some(hook) = &self.hook {
            hook.build_requirements(settings, &mut build_requires).map_err(|e| {
                CpkgError::RecipeEvaluation {
                    recipe: self.display_name(),
                    callback: BUILD_REQUIREMENTS_CALLBACK.to_string(),
                    reason: format!("{e:#}"),
                }
            })?;
        }
        Ok(build_requires)
    }
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipe")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("user", &self.user)
            .field("channel", &self.channel)
            .field("revision", &self.revision)
            .field("requires", &self.requires)
            .field("build_requires", &self.build_requires)
            .field("recipe_requires", &self.recipe_requires)
            .field("build_policy", &self.build_policy)
            .field("has_hook", &self.hook.is_some())
            .finish_non_exhaustive()
    }
}
