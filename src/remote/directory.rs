//! Filesystem-backed recipe index.
//!
//! ```text
//! <root>/
//! └── zlib/
//!     └── 1.2.11/
//!         └── demo/          # user, or "_" when absent
//!             └── stable/    # channel, or "_" when absent
//!                 ├── cpkg.toml
//!                 └── packages/
//!                     └── <package_id>/
//! ```

use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::WalkDir;

use super::{Candidate, RecipeIndex, RemoteError};
use crate::constants::{NO_USER_CHANNEL, PACKAGES_DIR, RECIPE_FILE};
use crate::graph::node::PackageId;
use crate::loader::parse_recipe;
use crate::model::{Recipe, Reference};

/// Recipe index stored in a directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryIndex {
    name: String,
    root: PathBuf,
    local: bool,
}

impl DirectoryIndex {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, local: bool) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            local,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder holding the recipe of `reference`.
    #[must_use]
    pub fn recipe_folder(&self, reference: &Reference) -> PathBuf {
        self.root
            .join(&reference.name)
            .join(&reference.version)
            .join(reference.user.as_deref().unwrap_or(NO_USER_CHANNEL))
            .join(reference.channel.as_deref().unwrap_or(NO_USER_CHANNEL))
    }

    /// Folder of one binary package of `reference`.
    #[must_use]
    pub fn package_folder(&self, reference: &Reference, package_id: &PackageId) -> PathBuf {
        self.recipe_folder(reference).join(PACKAGES_DIR).join(package_id.as_str())
    }

    fn read_recipe(&self, file: &Path) -> Result<Recipe, RemoteError> {
        let content = std::fs::read_to_string(file).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RemoteError::NotFound(file.display().to_string()),
            _ => RemoteError::Unreachable(format!("{}: {e}", file.display())),
        })?;
        parse_recipe(&content, &file.display().to_string())
            .map_err(|e| RemoteError::Fatal(format!("{e:#}")))
    }
}

fn slot(value: Option<&str>) -> &str {
    value.unwrap_or(NO_USER_CHANNEL)
}

impl RecipeIndex for DirectoryIndex {
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
        let package_root = self.root.join(name);
        if !package_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for entry in WalkDir::new(&package_root)
            .min_depth(4)
            .max_depth(4)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.file_name() != RECIPE_FILE {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&package_root) else {
                continue;
            };
            let parts: Vec<String> =
                relative.iter().map(|part| part.to_string_lossy().into_owned()).collect();
            let [version, found_user, found_channel, _] = parts.as_slice() else {
                continue;
            };
            if found_user != slot(user) || found_channel != slot(channel) {
                continue;
            }

            trace!("Candidate {}/{} in '{}'", name, version, self.name);
            let recipe = self.read_recipe(entry.path())?;
            let mut reference = Reference::new(name, version.clone());
            if let (Some(user), Some(channel)) = (user, channel) {
                reference = reference.with_user_channel(user, channel);
            }
            reference.revision = recipe.revision;
            candidates.push(Candidate {
                reference,
                revision_time: recipe.revision_time,
            });
        }
        Ok(candidates)
    }

    fn fetch(&self, reference: &Reference) -> Result<Recipe, RemoteError> {
        let mut recipe = self.read_recipe(&self.recipe_folder(reference).join(RECIPE_FILE))?;
        // Index layout is authoritative for the identity.
        recipe.name = Some(reference.name.clone());
        recipe.version = Some(reference.version.clone());
        recipe.user.clone_from(&reference.user);
        recipe.channel.clone_from(&reference.channel);
        Ok(recipe)
    }

    fn has_binary(&self, reference: &Reference, package_id: &PackageId) -> Result<bool, RemoteError> {
        Ok(self.package_folder(reference, package_id).is_dir())
    }

    fn package_names(&self) -> Vec<String> {
        std::fs::read_dir(&self.root)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|entry| entry.path().is_dir())
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }
}
