//! `--build` policy.
//!
//! | Pattern | Meaning |
//! |---------|---------|
//! | `never` | never build, not even missing binaries (exclusive) |
//! | `missing` | build packages without an available binary |
//! | `cascade` | rebuild packages whose dependencies are rebuilt |
//! | `*` or empty | build every package |
//! | anything else | glob matched against the package name or reference |

use anyhow::Result;
use glob::Pattern;
use std::collections::HashSet;

use crate::core::CpkgError;
use crate::model::BuildPolicy;

#[derive(Debug, Clone, Default)]
pub struct BuildMode {
    never: bool,
    missing: bool,
    cascade: bool,
    all: bool,
    patterns: Vec<Pattern>,
    matched: HashSet<String>,
}

impl BuildMode {
    /// Parse the `--build` values.
    ///
    /// # Errors
    ///
    /// [`CpkgError::InvalidBuildMode`] when `never` is combined with other
    /// values or a glob is invalid.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut mode = Self::default();
        for pattern in patterns {
            match pattern.as_ref().trim() {
                "never" => mode.never = true,
                "missing" => mode.missing = true,
                "cascade" => mode.cascade = true,
                "" | "*" => mode.all = true,
                glob => {
                    let compiled = Pattern::new(glob).map_err(|e| CpkgError::InvalidBuildMode {
                        reason: format!("invalid pattern '{glob}': {e}"),
                    })?;
                    mode.patterns.push(compiled);
                }
            }
        }

        if mode.never && (mode.missing || mode.cascade || mode.all || !mode.patterns.is_empty()) {
            return Err(CpkgError::InvalidBuildMode {
                reason: "'never' cannot be combined with other build values".to_string(),
            }
            .into());
        }
        Ok(mode)
    }

    #[must_use]
    pub const fn cascade(&self) -> bool {
        self.cascade
    }

    /// Whether the node must be built regardless of available binaries.
    /// Matching patterns are recorded as used.
    pub fn forced(&mut self, name: &str, reference: &str, policy: Option<BuildPolicy>) -> bool {
        if self.never {
            return false;
        }
        if self.all || policy == Some(BuildPolicy::Always) {
            return true;
        }

        let mut forced = false;
        for pattern in &self.patterns {
            if pattern.matches(name) || pattern.matches(reference) {
                self.matched.insert(pattern.as_str().to_string());
                forced = true;
            }
        }
        forced
    }

    /// Whether the node may be built when no binary is available.
    #[must_use]
    pub fn allowed(&self, policy: Option<BuildPolicy>) -> bool {
        !self.never && (self.missing || policy == Some(BuildPolicy::Missing))
    }

    /// Package patterns that never matched a node.
    #[must_use]
    pub fn unmatched_patterns(&self) -> Vec<String> {
        self.patterns
            .iter()
            .map(Pattern::as_str)
            .filter(|pattern| !self.matched.contains(*pattern))
            .map(str::to_string)
            .collect()
    }
}
