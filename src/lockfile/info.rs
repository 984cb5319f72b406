//! `graph_info.toml`: identity and options of the root recipe in an install
//! folder.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::GRAPH_INFO_FILE;
use crate::graph::Node;
use crate::model::Profile;
use crate::utils::fs::atomic_write;

/// Root name, version, user, channel and options recorded by a previous
/// install, so later local commands resolve the consumer recipe the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Effective option values of the root recipe.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub options: IndexMap<String, String>,
}

impl GraphInfo {
    /// Record the resolved `root` under `profile`.
    #[must_use]
    pub fn from_root(root: &Node, profile: &Profile) -> Self {
        let recipe = &root.recipe;
        let options = recipe
            .options
            .iter()
            .filter_map(|(option, default)| {
                profile
                    .option_value(root.name(), option, Some(default.as_str()), true)
                    .map(|value| (option.clone(), value.to_string()))
            })
            .collect();
        Self {
            name: recipe.name.clone(),
            version: recipe.version.clone(),
            user: recipe.user.clone(),
            channel: recipe.channel.clone(),
            options,
        }
    }

    /// Read the file from `folder`, `None` when it does not exist.
    pub fn load(folder: &Path) -> Result<Option<Self>> {
        let path = folder.join(GRAPH_INFO_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let info = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(info))
    }

    pub fn save(&self, folder: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        atomic_write(&folder.join(GRAPH_INFO_FILE), content.as_bytes())
    }
}
