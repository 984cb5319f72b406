//! Version range expressions used inside requirement brackets.
//!
//! A range is written between square brackets in a requirement, e.g.
//! `zlib/[>=1.2 <1.3]@demo/stable`. The bracket contents follow these rules:
//!
//! - comparators are separated by spaces or commas and must all hold
//! - `||` separates alternatives, any of which may hold
//! - a bare version (`1.2`) means "any `1.2.x`"
//! - `*` accepts every numeric version
//!
//! Prerelease versions only match when a comparator names a prerelease of the
//! same `major.minor.patch`, following [`semver::VersionReq`] semantics.

use anyhow::Result;
use regex::Regex;
use semver::VersionReq;
use std::fmt;
use std::sync::OnceLock;

use super::coerce_version;
use crate::core::CpkgError;

/// A parsed version range: a disjunction of semver requirements.
#[derive(Debug, Clone)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<VersionReq>,
}

fn operator_spacing() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(>=|<=|>|<|=|~|\^)\s+").expect("static regex is valid"))
}

impl VersionRange {
    /// Parse the contents of a range (without the surrounding brackets).
    ///
    /// # Errors
    ///
    /// Returns [`CpkgError::InvalidVersionRange`] for empty expressions or
    /// comparators that are not valid semver requirements.
    pub fn parse(expression: &str) -> Result<Self> {
        let raw = expression.trim();
        if raw.is_empty() {
            return Err(CpkgError::InvalidVersionRange {
                range: expression.to_string(),
                reason: "empty range expression".to_string(),
            }
            .into());
        }

        let mut alternatives = Vec::new();
        for alternative in raw.split("||") {
            let compact = operator_spacing().replace_all(alternative.trim(), "$1");
            let comparators: Vec<String> = compact
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|c| !c.is_empty())
                .map(normalize_comparator)
                .collect();

            if comparators.is_empty() {
                return Err(CpkgError::InvalidVersionRange {
                    range: raw.to_string(),
                    reason: "empty alternative around '||'".to_string(),
                }
                .into());
            }

            let req = VersionReq::parse(&comparators.join(", ")).map_err(|e| {
                CpkgError::InvalidVersionRange {
                    range: raw.to_string(),
                    reason: e.to_string(),
                }
            })?;
            alternatives.push(req);
        }

        Ok(Self {
            raw: raw.to_string(),
            alternatives,
        })
    }

    /// Whether a version string satisfies the range.
    ///
    /// Versions that cannot be coerced to semver never satisfy a range.
    #[must_use]
    pub fn satisfies(&self, version: &str) -> bool {
        let Some(version) = coerce_version(version) else {
            return false;
        };
        self.alternatives.iter().any(|req| req.matches(&version))
    }

    /// The expression as written, without brackets.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn normalize_comparator(comparator: &str) -> String {
    let starts_with_operator =
        comparator.starts_with(['>', '<', '=', '~', '^']) || comparator.contains('*');
    if starts_with_operator || comparator.ends_with(".x") || comparator.ends_with(".X") {
        comparator.to_string()
    } else {
        format!("={comparator}")
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.raw)
    }
}

impl PartialEq for VersionRange {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for VersionRange {}
