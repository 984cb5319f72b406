//! Declared requirements and the ordered containers that hold them.

use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::reference::{Reference, split_reference};
use crate::core::CpkgError;
use crate::version::VersionRange;

/// A requirement as declared by a recipe or a profile.
///
/// The version slot either names one version (`zlib/1.2.11`) or a bracketed
/// range (`zlib/[>=1.2 <1.3]`). For ranges, [`reference`](Self::reference)
/// carries the raw bracketed text as its version until the graph builder
/// resolves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub reference: Reference,
    pub range: Option<VersionRange>,
    /// Used by the requirer, but hidden from the requirer's consumers.
    pub private: bool,
    /// Pins transitive requirements of the same name instead of adding an edge.
    pub is_override: bool,
}

impl Requirement {
    /// Parse `name/<version|[range]>[@user/channel][#revision]`.
    pub fn parse(text: &str) -> Result<Self> {
        let (_, version, ..) = split_reference(text)?;
        let version = version.trim();
        if let Some(inner) = version.strip_prefix('[') {
            let inner = inner.strip_suffix(']').ok_or_else(|| CpkgError::InvalidReference {
                reference: text.to_string(),
                reason: "unterminated version range".to_string(),
            })?;
            let range = VersionRange::parse(inner)?;
            // Validate name/user/channel with a placeholder version.
            let (name, _, user, channel, revision) = split_reference(text)?;
            let placeholder = match (user, channel) {
                (Some(user), Some(channel)) => format!("{name}/0@{user}/{channel}"),
                _ => format!("{name}/0"),
            };
            let mut reference = Reference::parse(&placeholder)?;
            reference.version = format!("[{}]", range.as_str());
            reference.revision = revision.map(str::to_string);
            Ok(Self {
                reference,
                range: Some(range),
                private: false,
                is_override: false,
            })
        } else {
            Ok(Self::exact(Reference::parse(text)?))
        }
    }

    /// Turn a reference whose version may be a bracketed range (as found in
    /// build requirements) into a requirement.
    pub fn from_reference(reference: &Reference) -> Result<Self> {
        match reference.version.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
            Some(inner) => Ok(Self {
                reference: reference.clone(),
                range: Some(VersionRange::parse(inner)?),
                private: false,
                is_override: false,
            }),
            None => Ok(Self::exact(reference.clone())),
        }
    }

    /// Requirement on exactly one reference.
    #[must_use]
    pub const fn exact(reference: Reference) -> Self {
        Self {
            reference,
            range: None,
            private: false,
            is_override: false,
        }
    }

    /// Package name of the requirement.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.reference.name
    }

    /// Whether a concrete reference satisfies this requirement.
    ///
    /// Exact requirements need the same identity (and the same revision when
    /// the requirement pins one); range requirements need equal name, user and
    /// channel plus a version inside the range.
    #[must_use]
    pub fn accepts(&self, candidate: &Reference) -> bool {
        match &self.range {
            None => {
                self.reference.same_identity(candidate)
                    && match (&self.reference.revision, &candidate.revision) {
                        (Some(wanted), Some(found)) => wanted == found,
                        _ => true,
                    }
            }
            Some(range) => {
                self.reference.name == candidate.name
                    && self.reference.user == candidate.user
                    && self.reference.channel == candidate.channel
                    && range.satisfies(&candidate.version)
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference)
    }
}

/// Ordered `name → Requirement` collection of a recipe's regular requirements.
///
/// Declaring the same name twice is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    items: IndexMap<String, Requirement>,
}

impl Requirements {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a requirement, failing when its name is already declared.
    pub fn add(&mut self, recipe: &str, requirement: Requirement) -> Result<()> {
        let name = requirement.name().to_string();
        if self.items.contains_key(&name) {
            return Err(CpkgError::DuplicateRequirement {
                recipe: recipe.to_string(),
                name,
            }
            .into());
        }
        self.items.insert(name, requirement);
        Ok(())
    }

    /// Replace the requirement of the same name in place, or append it.
    pub fn replace(&mut self, requirement: Requirement) {
        self.items.insert(requirement.name().to_string(), requirement);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Requirement> {
        self.items.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.items.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Ordered `name → Reference` map of build-time requirements.
///
/// [`add`](Self::add) has override-on-add semantics: a later reference with an
/// already present name replaces the value but keeps the original position.
/// This is how a profile centralises one version of a build tool across every
/// recipe that declares it.
///
/// # Examples
///
/// ```rust
/// use cpkg::model::{BuildRequires, Reference};
///
/// let mut build_requires = BuildRequires::new();
/// build_requires.add(Reference::new("cmake", "3.16"));
/// build_requires.add(Reference::new("ninja", "1.10"));
/// build_requires.add(Reference::new("cmake", "3.20"));
///
/// let names: Vec<String> = build_requires.values().map(|r| r.to_string()).collect();
/// assert_eq!(names, ["cmake/3.20", "ninja/1.10"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildRequires {
    items: IndexMap<String, Reference>,
}

impl BuildRequires {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, or replace in place when the name is already present.
    pub fn add(&mut self, reference: Reference) {
        // IndexMap::insert keeps the slot of an existing key.
        self.items.insert(reference.name.clone(), reference);
    }

    /// Parse and [`add`](Self::add) a textual reference.
    pub fn add_str(&mut self, reference: &str) -> Result<()> {
        self.add(Reference::parse(reference)?);
        Ok(())
    }

    /// [`add`](Self::add) every reference in order.
    pub fn merge<I>(&mut self, references: I)
    where
        I: IntoIterator<Item = Reference>,
    {
        for reference in references {
            self.add(reference);
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Reference> {
        self.items.get(name)
    }

    pub fn values(&self) -> impl Iterator<Item = &Reference> {
        self.items.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<Reference> for BuildRequires {
    fn from_iter<I: IntoIterator<Item = Reference>>(iter: I) -> Self {
        let mut build_requires = Self::new();
        build_requires.merge(iter);
        build_requires
    }
}

impl fmt::Display for BuildRequires {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.values().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join(", "))
    }
}
