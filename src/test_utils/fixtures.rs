//! On-disk fixtures: directory indexes, consumer recipes, profiles and
//! configs inside one temporary directory.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::{GlobalConfig, RemoteConfig};
use crate::constants::RECIPE_FILE;
use crate::graph::PackageId;
use crate::model::Reference;
use crate::remote::DirectoryIndex;

/// Temporary workspace with directory indexes under `indexes/<name>`.
///
/// ```rust,no_run
/// use cpkg::test_utils::DirectoryFixture;
///
/// # fn example() -> anyhow::Result<()> {
/// let fixture = DirectoryFixture::new()?;
/// fixture.add_recipe("cache", "zlib/1.2.11", "")?;
/// let app = fixture.write("app/cpkg.toml", "[requirements]\nrequires = [\"zlib/1.2.11\"]\n")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DirectoryFixture {
    temp: TempDir,
}

impl DirectoryFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp: TempDir::new().context("Failed to create temp dir")?,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    #[must_use]
    pub fn index_root(&self, index: &str) -> PathBuf {
        self.temp.path().join("indexes").join(index)
    }

    #[must_use]
    pub fn index(&self, index: &str, local: bool) -> DirectoryIndex {
        DirectoryIndex::new(index, self.index_root(index), local)
    }

    /// Store a recipe in `index`. Returns the recipe file.
    pub fn add_recipe(&self, index: &str, reference: &str, content: &str) -> Result<PathBuf> {
        let reference = Reference::parse(reference)?;
        let folder = self.index(index, true).recipe_folder(&reference);
        fs::create_dir_all(&folder)?;
        let file = folder.join(RECIPE_FILE);
        fs::write(&file, content)?;
        Ok(file)
    }

    /// Publish a binary of `reference` in `index`.
    pub fn add_binary(&self, index: &str, reference: &str, package_id: &PackageId) -> Result<()> {
        let reference = Reference::parse(reference)?;
        fs::create_dir_all(self.index(index, true).package_folder(&reference, package_id))?;
        Ok(())
    }

    /// Write a file relative to the fixture root.
    pub fn write(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.temp.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Config using index `cache` as local cache and `remotes` in order.
    #[must_use]
    pub fn config(&self, remotes: &[&str]) -> GlobalConfig {
        GlobalConfig {
            cache_dir: Some(self.index_root("cache").display().to_string()),
            remotes: remotes
                .iter()
                .map(|name| RemoteConfig {
                    name: (*name).to_string(),
                    path: self.index_root(name).display().to_string(),
                })
                .collect(),
            ..GlobalConfig::default()
        }
    }

    /// Write `config` to `config.toml` in the fixture root.
    pub fn write_config(&self, config: &GlobalConfig) -> Result<PathBuf> {
        let content = toml::to_string_pretty(config)?;
        self.write("config.toml", &content)
    }
}
