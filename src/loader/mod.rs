//! Recipe loading.
//!
//! The graph engine never interprets recipe files itself; it asks a
//! [`RecipeLoader`] for [`Recipe`] values. [`TomlRecipeLoader`] is the loader
//! used by the CLI and reads declarative `cpkg.toml` files.

pub mod toml_loader;

pub use toml_loader::{TomlRecipeLoader, parse_recipe};

use anyhow::Result;
use std::path::Path;

use crate::model::{Profile, Recipe, Reference};

/// Identity overrides and lock inputs for loading a consumer recipe.
#[derive(Debug, Clone, Default)]
pub struct ConsumerOptions {
    /// The recipe is a test consumer for a package being created.
    pub test: bool,
    pub name: Option<String>,
    pub version: Option<String>,
    pub user: Option<String>,
    pub channel: Option<String>,
    /// Recipe-code requirements pinned by an existing lock. Entries replace the
    /// recipe's declared `recipe_requires` of the same name.
    pub locked_recipe_requires: Vec<Reference>,
}

/// Produces recipes for the graph builder.
pub trait RecipeLoader {
    /// Load the user's own recipe from a file or a directory containing one.
    fn load_consumer(&self, path: &Path, profile: &Profile, options: &ConsumerOptions)
    -> Result<Recipe>;

    /// Synthesize the recipe of a virtual root requiring `references`.
    fn load_virtual(&self, references: &[Reference], profile: &Profile) -> Result<Recipe>;

    /// Load the recipe of an editable package from its working folder.
    fn load_editable(&self, path: &Path) -> Result<Recipe>;
}
