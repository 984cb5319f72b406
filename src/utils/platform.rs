//! Home directory lookup and user path expansion.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// The user's home directory.
pub fn get_home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| {
        let platform_help = if cfg!(windows) {
            "On Windows: Check that the USERPROFILE environment variable is set"
        } else {
            "On Unix/Linux: Check that the HOME environment variable is set"
        };
        anyhow::anyhow!("Could not determine home directory.\n\n{platform_help}")
    })
}

/// Expand `~` and environment variables in a user supplied path.
///
/// ```rust,no_run
/// use cpkg::utils::resolve_path;
///
/// # fn example() -> anyhow::Result<()> {
/// let remote = resolve_path("~/.cpkg/data")?;
/// let profile = resolve_path("$CPKG_HOME/profiles/default.toml")?;
/// # Ok(())
/// # }
/// ```
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full_with_context(
        path,
        || dirs::home_dir().map(|home| home.to_string_lossy().into_owned()),
        |var| std::env::var(var).map(Some),
    )
    .with_context(|| format!("Failed to expand path: {path}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_paths_are_unchanged() {
        assert_eq!(resolve_path("/opt/cpkg/data").unwrap(), PathBuf::from("/opt/cpkg/data"));
        assert_eq!(resolve_path("relative/dir").unwrap(), PathBuf::from("relative/dir"));
    }

    #[test]
    fn test_tilde_expands_to_home() {
        let home = get_home_dir().unwrap();
        assert_eq!(resolve_path("~/profiles").unwrap(), home.join("profiles"));
    }

    #[test]
    fn test_unknown_variable_fails() {
        assert!(resolve_path("$CPKG_SURELY_UNDEFINED_VARIABLE/x").is_err());
    }
}
