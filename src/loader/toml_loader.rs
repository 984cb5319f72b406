//! Declarative `cpkg.toml` recipes.
//!
//! ```toml
//! [package]
//! name = "app"
//! version = "1.0"
//! user = "demo"
//! channel = "stable"
//! build_policy = "missing"
//! settings = ["os", "build_type"]
//!
//! [requirements]
//! requires = [
//!     "A/1.0@demo/stable",
//!     { ref = "zlib/[>=1.2 <1.3]@demo/stable", private = true },
//!     { ref = "openssl/1.1.1k@demo/stable", override = true },
//! ]
//! build_requires = ["cmake/3.16"]
//! recipe_requires = ["helpers/0.1@demo/stable"]
//!
//! [options]
//! shared = false
//!
//! [[build_requirements]]
//! when = { os = "Windows" }
//! requires = ["nasm/2.15"]
//! ```
//!
//! `[[build_requirements]]` rules become the recipe's build-requirements hook:
//! each rule whose `when` settings all equal the profile's adds its references.

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::{ConsumerOptions, RecipeLoader};
use crate::constants::RECIPE_FILE;
use crate::core::CpkgError;
use crate::model::{
    BuildPolicy, BuildRequirementsHook, BuildRequires, Profile, Recipe, Reference, Requirement,
    Settings,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecipeFile {
    #[serde(default)]
    package: PackageSection,
    #[serde(default)]
    requirements: RequirementsSection,
    #[serde(default)]
    options: IndexMap<String, toml::Value>,
    #[serde(default)]
    build_requirements: Vec<ConditionalRule>,
}

#[derive(Debug, Default, Deserialize)]
struct PackageSection {
    name: Option<String>,
    version: Option<String>,
    user: Option<String>,
    channel: Option<String>,
    revision: Option<String>,
    revision_time: Option<u64>,
    build_policy: Option<BuildPolicy>,
    #[serde(default)]
    settings: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RequirementsSection {
    #[serde(default)]
    requires: Vec<RequirementEntry>,
    #[serde(default)]
    build_requires: Vec<String>,
    #[serde(default)]
    recipe_requires: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RequirementEntry {
    Simple(String),
    Detailed {
        #[serde(rename = "ref")]
        reference: String,
        #[serde(default)]
        private: bool,
        #[serde(default, rename = "override")]
        is_override: bool,
    },
}

#[derive(Debug, Deserialize)]
struct ConditionalRule {
    #[serde(default)]
    when: IndexMap<String, String>,
    requires: Vec<String>,
}

/// Build-requirements hook compiled from `[[build_requirements]]` rules.
#[derive(Debug)]
struct ConditionalBuildRequires {
    rules: Vec<(IndexMap<String, String>, Vec<Reference>)>,
}

impl BuildRequirementsHook for ConditionalBuildRequires {
    fn build_requirements(&self, settings: &Settings, build_requires: &mut BuildRequires) -> Result<()> {
        for (when, references) in &self.rules {
            let mut matched = true;
            for (setting, expected) in when {
                let Some(actual) = settings.get(setting) else {
                    bail!("setting '{setting}' is not defined in the profile");
                };
                matched &= actual == expected;
            }
            if matched {
                build_requires.merge(references.iter().cloned());
            }
        }
        Ok(())
    }
}

/// Parse a recipe file's content. `origin` names the file in errors.
pub fn parse_recipe(content: &str, origin: &str) -> Result<Recipe> {
    let file: RecipeFile = toml::from_str(content).map_err(|e| CpkgError::RecipeParse {
        file: origin.to_string(),
        reason: e.message().trim().to_string(),
    })?;

    let package = file.package;
    if package.user.is_some() != package.channel.is_some() {
        return Err(CpkgError::RecipeParse {
            file: origin.to_string(),
            reason: "user and channel must be set together".to_string(),
        }
        .into());
    }

    let mut recipe = Recipe::default();
    recipe.name = package.name;
    recipe.version = package.version;
    recipe.user = package.user;
    recipe.channel = package.channel;
    recipe.revision = package.revision;
    recipe.revision_time = package.revision_time;
    recipe.build_policy = package.build_policy;
    recipe.settings = package.settings;
    let display = recipe.display_name();

    for entry in file.requirements.requires {
        let requirement = match entry {
            RequirementEntry::Simple(text) => Requirement::parse(&text)?,
            RequirementEntry::Detailed {
                reference,
                private,
                is_override,
            } => Requirement {
                private,
                is_override,
                ..Requirement::parse(&reference)?
            },
        };
        recipe.requires.add(&display, requirement)?;
    }
    for text in &file.requirements.build_requires {
        recipe.build_requires.add_str(text)?;
    }
    recipe.recipe_requires = file
        .requirements
        .recipe_requires
        .iter()
        .map(|text| Reference::parse(text))
        .collect::<Result<_>>()?;

    recipe.options = file
        .options
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::String(text) => text,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect();

    if !file.build_requirements.is_empty() {
        let mut rules = Vec::with_capacity(file.build_requirements.len());
        for rule in file.build_requirements {
            let references =
                rule.requires.iter().map(|text| Reference::parse(text)).collect::<Result<_>>()?;
            rules.push((rule.when, references));
        }
        recipe.set_hook(Arc::new(ConditionalBuildRequires {
            rules,
        }));
    }

    Ok(recipe)
}

/// Loads `cpkg.toml` recipes from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlRecipeLoader;

impl TomlRecipeLoader {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Read and parse a recipe file, or the recipe file inside a directory.
    pub fn load_path(path: &Path) -> Result<Recipe> {
        let file = recipe_file_path(path);
        let content = std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read recipe: {}", file.display()))?;
        parse_recipe(&content, &file.display().to_string())
    }
}

fn recipe_file_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(RECIPE_FILE)
    } else {
        path.to_path_buf()
    }
}

fn apply_identity(
    slot: &mut Option<String>,
    given: Option<&String>,
    what: &str,
    origin: &Path,
) -> Result<()> {
    match (slot.as_ref(), given) {
        (Some(declared), Some(given)) if declared != given => Err(CpkgError::RecipeParse {
            file: origin.display().to_string(),
            reason: format!("recipe declares {what} '{declared}' but '{given}' was requested"),
        }
        .into()),
        (_, Some(given)) => {
            *slot = Some(given.clone());
            Ok(())
        }
        _ => Ok(()),
    }
}

impl RecipeLoader for TomlRecipeLoader {
    fn load_consumer(
        &self,
        path: &Path,
        _profile: &Profile,
        options: &ConsumerOptions,
    ) -> Result<Recipe> {
        let mut recipe = Self::load_path(path)?;
        apply_identity(&mut recipe.name, options.name.as_ref(), "name", path)?;
        apply_identity(&mut recipe.version, options.version.as_ref(), "version", path)?;
        // user/channel are not declared for consumers in most recipes; the
        // request wins when both are given.
        if let (Some(user), Some(channel)) = (&options.user, &options.channel) {
            recipe.user = Some(user.clone());
            recipe.channel = Some(channel.clone());
        }

        for locked in &options.locked_recipe_requires {
            if let Some(slot) = recipe.recipe_requires.iter_mut().find(|r| r.name == locked.name) {
                debug!("Using locked recipe requirement {}", locked.full_str());
                *slot = locked.clone();
            }
        }

        if options.test {
            debug!("Loaded test consumer {}", path.display());
        }
        Ok(recipe)
    }

    fn load_virtual(&self, references: &[Reference], _profile: &Profile) -> Result<Recipe> {
        let mut recipe = Recipe::anonymous();
        for reference in references {
            recipe.requires.add("virtual", Requirement::from_reference(reference)?)?;
        }
        Ok(recipe)
    }

    fn load_editable(&self, path: &Path) -> Result<Recipe> {
        Self::load_path(path)
    }
}
