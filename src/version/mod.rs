//! Version parsing and comparison for package references.
//!
//! Package versions in compiled-language ecosystems rarely follow strict
//! semantic versioning: `3.20`, `1.2.11` and `2` are all common. This module
//! coerces such strings into [`semver::Version`] so they can be ordered and
//! matched against [`range::VersionRange`] expressions.
//!
//! # Coercion Rules
//!
//! | Input | Coerced |
//! |-------|---------|
//! | `2` | `2.0.0` |
//! | `3.20` | `3.20.0` |
//! | `1.2.11` | `1.2.11` |
//! | `1.2.3.4` | `1.2.3+4` |
//! | `1.0-beta` | `1.0.0-beta` |
//! | `v1.4` | `1.4.0` |
//! | `develop` | not a version (excluded from range solving) |

pub mod range;

pub use range::VersionRange;

use semver::{BuildMetadata, Prerelease, Version};

/// Coerce a package version string into a semantic version.
///
/// Returns `None` when the string has no numeric core (branch-like versions
/// such as `develop`), which callers treat as "never matches a range".
///
/// # Examples
///
/// ```rust
/// use cpkg::version::coerce_version;
///
/// assert_eq!(coerce_version("3.20").unwrap().to_string(), "3.20.0");
/// assert!(coerce_version("develop").is_none());
/// ```
#[must_use]
pub fn coerce_version(text: &str) -> Option<Version> {
    let text = text.trim().trim_start_matches(['v', 'V']);
    if text.is_empty() {
        return None;
    }

    let (core, prerelease) = match text.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (text, None),
    };
    let (core, build) = match core.split_once('+') {
        Some((core, build)) => (core, Some(build)),
        None => (core, None),
    };

    let mut numbers = Vec::new();
    for part in core.split('.') {
        numbers.push(part.parse::<u64>().ok()?);
    }
    if numbers.is_empty() {
        return None;
    }

    let mut version = Version::new(
        numbers[0],
        numbers.get(1).copied().unwrap_or(0),
        numbers.get(2).copied().unwrap_or(0),
    );

    if let Some(pre) = prerelease {
        version.pre = Prerelease::new(pre).ok()?;
    }

    // Fourth and later components are kept as build metadata so they still
    // take part in ordering.
    let mut extra: Vec<String> = numbers.iter().skip(3).map(u64::to_string).collect();
    if let Some(build) = build {
        extra.push(build.to_string());
    }
    if !extra.is_empty() {
        version.build = BuildMetadata::new(&extra.join(".")).ok()?;
    }

    Some(version)
}

/// Compare two version strings, falling back to lexical order for
/// non-numeric versions. Numeric versions sort after non-numeric ones.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    match (coerce_version(a), coerce_version(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_coerce_short_versions() {
        assert_eq!(coerce_version("2").unwrap(), Version::new(2, 0, 0));
        assert_eq!(coerce_version("3.20").unwrap(), Version::new(3, 20, 0));
        assert_eq!(coerce_version("1.2.11").unwrap(), Version::new(1, 2, 11));
        assert_eq!(coerce_version("v1.4").unwrap(), Version::new(1, 4, 0));
    }

    #[test]
    fn test_coerce_prerelease_and_extra_components() {
        let beta = coerce_version("1.0-beta").unwrap();
        assert_eq!(beta.pre.as_str(), "beta");

        let four = coerce_version("1.2.3.4").unwrap();
        assert_eq!(four.build.as_str(), "4");
        assert!(four > Version::new(1, 2, 3));
    }

    #[test]
    fn test_non_numeric_versions() {
        assert!(coerce_version("develop").is_none());
        assert!(coerce_version("").is_none());
        assert!(coerce_version("1.x").is_none());
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.9", "1.10"), Ordering::Less);
        assert_eq!(compare_versions("2.0", "develop"), Ordering::Greater);
        assert_eq!(compare_versions("alpha", "beta"), Ordering::Less);
    }
}
