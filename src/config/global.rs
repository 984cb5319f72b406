//! Global configuration (`~/.cpkg/config.toml`).
//!
//! # File Format
//!
//! ```toml
//! # Local recipe and binary cache, consulted first
//! cache_dir = "~/.cpkg/data"
//! revisions_enabled = false
//! default_profile = "~/.cpkg/profiles/default.toml"
//! package_id_mode = "semver"
//!
//! # Remote indexes, consulted in order after the cache
//! [[remotes]]
//! name = "center"
//! path = "/srv/cpkg/center"
//!
//! # Packages developed in place: reference -> recipe folder
//! [editables]
//! "zlib/1.2.11@demo/stable" = "~/src/zlib"
//! ```
//!
//! Every field is optional. Paths go through `~` and environment variable
//! expansion.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::CONFIG_ENV;
use crate::graph::PackageIdMode;
use crate::model::{Profile, Reference};
use crate::remote::{DirectoryIndex, RecipeRegistry};
use crate::utils::{get_home_dir, resolve_path};

/// Name of the local cache index.
const CACHE_INDEX: &str = "cache";

/// A remote recipe index stored in a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Local cache folder. Defaults to `~/.cpkg/data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,

    /// Accept references pinned to a recipe revision.
    #[serde(default)]
    pub revisions_enabled: bool,

    /// Profile used when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,

    #[serde(default)]
    pub package_id_mode: PackageIdMode,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remotes: Vec<RemoteConfig>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub editables: IndexMap<String, String>,
}

impl GlobalConfig {
    /// Load from the default location, or defaults when there is no file.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` when given, otherwise from the default location.
    /// A missing file yields the defaults.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse global config from {}", path.display()))
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize global config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write global config to {}", path.display()))
    }

    /// `$CPKG_CONFIG`, or `~/.cpkg/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        Ok(get_home_dir()?.join(".cpkg").join("config.toml"))
    }

    pub fn cache_path(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => resolve_path(dir),
            None => Ok(get_home_dir()?.join(".cpkg").join("data")),
        }
    }

    /// Registry with the local cache followed by the remotes in declaration
    /// order.
    pub fn registry(&self) -> Result<RecipeRegistry> {
        let mut registry = RecipeRegistry::new();
        registry.push(DirectoryIndex::new(CACHE_INDEX, self.cache_path()?, true));
        for remote in &self.remotes {
            let path = resolve_path(&remote.path)
                .with_context(|| format!("Invalid path for remote '{}'", remote.name))?;
            registry.push(DirectoryIndex::new(remote.name.clone(), path, false));
        }
        Ok(registry)
    }

    /// Editable packages keyed by their reference without revision.
    pub fn editable_paths(&self) -> Result<IndexMap<String, PathBuf>> {
        self.editables
            .iter()
            .map(|(reference, path)| {
                let reference = Reference::parse(reference)
                    .with_context(|| format!("Invalid editable reference '{reference}'"))?;
                Ok((reference.without_revision().to_string(), resolve_path(path)?))
            })
            .collect()
    }

    /// The profile named on the command line, else the configured default,
    /// else an empty profile.
    pub fn profile(&self, explicit: Option<&Path>) -> Result<Profile> {
        let path = match (explicit, &self.default_profile) {
            (Some(path), _) => path.to_path_buf(),
            (None, Some(default)) => resolve_path(default)?,
            (None, None) => return Ok(Profile::default()),
        };
        Profile::load(&path)
    }
}
