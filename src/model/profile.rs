//! Profiles: settings, option overrides and the build-requirements policy.
//!
//! ```toml
//! [settings]
//! os = "Linux"
//! build_type = "Release"
//!
//! [options]
//! "zlib:shared" = "True"
//!
//! [build_requires]
//! "&" = ["cmake/3.20"]
//! "&!" = ["ninja/1.10"]
//! "boost/*" = ["b2/4.5"]
//! ```
//!
//! The `[build_requires]` table keeps its declaration order: patterns are
//! applied top to bottom, so a later pattern overriding the same tool wins.

use anyhow::{Context, Result};
use glob::Pattern;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::reference::Reference;
use crate::constants::{CONSUMER_PATTERN, NON_CONSUMER_PATTERN};
use crate::core::CpkgError;

/// Profile settings, in declaration order.
pub type Settings = IndexMap<String, String>;

/// Which nodes a build-requirements policy entry applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfilePattern {
    /// `&`: only the consumer root.
    Consumer,
    /// `&!`: every node except the consumer root.
    NonConsumer,
    /// Glob matched against the node's printed reference.
    Glob(Pattern),
}

impl ProfilePattern {
    /// Parse a policy key.
    ///
    /// # Errors
    ///
    /// Returns [`CpkgError::InvalidPolicy`] for empty keys and invalid globs.
    pub fn parse(pattern: &str) -> Result<Self> {
        match pattern.trim() {
            "" => Err(CpkgError::InvalidPolicy {
                pattern: pattern.to_string(),
                reason: "empty pattern".to_string(),
            }
            .into()),
            CONSUMER_PATTERN => Ok(Self::Consumer),
            NON_CONSUMER_PATTERN => Ok(Self::NonConsumer),
            glob => Pattern::new(glob).map(Self::Glob).map_err(|e| {
                anyhow::Error::from(CpkgError::InvalidPolicy {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
            }),
        }
    }

    /// Whether a node matches this pattern.
    #[must_use]
    pub fn matches(&self, is_consumer: bool, printed_reference: &str) -> bool {
        match self {
            Self::Consumer => is_consumer,
            Self::NonConsumer => !is_consumer,
            Self::Glob(pattern) => pattern.matches(printed_reference),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Consumer => CONSUMER_PATTERN,
            Self::NonConsumer => NON_CONSUMER_PATTERN,
            Self::Glob(pattern) => pattern.as_str(),
        }
    }
}

impl fmt::Display for ProfilePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered list of `(pattern, references)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IndexMap<String, Vec<String>>", into = "IndexMap<String, Vec<String>>")]
pub struct BuildRequiresPolicy {
    entries: Vec<(ProfilePattern, Vec<Reference>)>,
}

impl BuildRequiresPolicy {
    /// Policy with no entries. Used on expansion branches introduced purely
    /// by the profile so a blanket pattern does not match what it just added.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append an entry, parsing pattern and references.
    pub fn push(&mut self, pattern: &str, references: &[&str]) -> Result<()> {
        let parsed = ProfilePattern::parse(pattern)?;
        let references = parse_references(pattern, references.iter().copied())?;
        self.entries.push((parsed, references));
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProfilePattern, &[Reference])> {
        self.entries.iter().map(|(pattern, refs)| (pattern, refs.as_slice()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_references<'a>(
    pattern: &str,
    references: impl Iterator<Item = &'a str>,
) -> Result<Vec<Reference>> {
    references
        .map(|text| {
            Reference::parse(text).map_err(|e| {
                anyhow::Error::from(CpkgError::InvalidPolicy {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
            })
        })
        .collect()
}

impl TryFrom<IndexMap<String, Vec<String>>> for BuildRequiresPolicy {
    type Error = anyhow::Error;

    fn try_from(table: IndexMap<String, Vec<String>>) -> Result<Self> {
        let mut policy = Self::empty();
        for (pattern, references) in &table {
            let references: Vec<&str> = references.iter().map(String::as_str).collect();
            policy.push(pattern, &references)?;
        }
        Ok(policy)
    }
}

impl From<BuildRequiresPolicy> for IndexMap<String, Vec<String>> {
    fn from(policy: BuildRequiresPolicy) -> Self {
        let mut table = Self::new();
        for (pattern, references) in policy.entries {
            table
                .entry(pattern.as_str().to_string())
                .or_insert_with(Vec::new)
                .extend(references.iter().map(Reference::full_str));
        }
        table
    }
}

/// Settings, option overrides and the build-requirements policy applied to
/// one resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub settings: Settings,
    /// Option overrides. `pkg:option` keys apply to one package; bare keys
    /// apply to the consumer.
    #[serde(default)]
    pub options: IndexMap<String, String>,
    #[serde(default)]
    pub build_requires: BuildRequiresPolicy,
}

impl Profile {
    /// Parse a profile from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`CpkgError::ProfileParse`] for TOML errors and
    /// [`CpkgError::InvalidPolicy`] for malformed `[build_requires]` entries.
    pub fn parse(content: &str, origin: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct RawProfile {
            #[serde(default)]
            settings: Settings,
            #[serde(default)]
            options: IndexMap<String, String>,
            #[serde(default)]
            build_requires: IndexMap<String, Vec<String>>,
        }

        let raw: RawProfile = toml::from_str(content).map_err(|e| CpkgError::ProfileParse {
            file: origin.to_string(),
            reason: e.message().trim().to_string(),
        })?;
        Ok(Self {
            settings: raw.settings,
            options: raw.options,
            build_requires: BuildRequiresPolicy::try_from(raw.build_requires)?,
        })
    }

    /// Load a profile file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile: {}", path.display()))?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Effective value of `option` for `package`, the profile override first.
    #[must_use]
    pub fn option_value<'a>(
        &'a self,
        package: &str,
        option: &str,
        default: Option<&'a str>,
        is_consumer: bool,
    ) -> Option<&'a str> {
        self.options
            .get(&format!("{package}:{option}"))
            .or_else(|| is_consumer.then(|| self.options.get(option)).flatten())
            .map(String::as_str)
            .or(default)
    }
}
