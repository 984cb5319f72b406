//! Error handling for cpkg
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`CpkgError`]) so callers and tests can match on
//!    the exact failure (a version conflict, a cycle, a lock mismatch, ...)
//! 2. **User-friendly messages** ([`ErrorContext`]) with actionable suggestions
//!    for the CLI
//!
//! Library code returns [`anyhow::Result`] and raises [`CpkgError`] variants,
//! adding `.context(...)` where a file or a recipe is involved. The CLI converts
//! whatever bubbles up with [`user_friendly_error`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use cpkg::core::{CpkgError, user_friendly_error};
//!
//! let error = anyhow::Error::from(CpkgError::CyclicDependency {
//!     chain: "app -> liba -> app".to_string(),
//! });
//! assert!(error.downcast_ref::<CpkgError>().is_some());
//! user_friendly_error(error).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for cpkg operations.
///
/// # Error Categories
///
/// ## Graph resolution
/// - [`Conflict`](Self::Conflict) - two requirements for one package cannot be reconciled
/// - [`CyclicDependency`](Self::CyclicDependency) - a requirement chain returns to an ancestor
/// - [`NoMatchingVersion`](Self::NoMatchingVersion) - no candidate satisfies a version range
/// - [`RecipeNotFound`](Self::RecipeNotFound) - no index knows the requested reference
/// - [`RecipeEvaluation`](Self::RecipeEvaluation) - a recipe callback failed
///
/// ## Policy and input
/// - [`InvalidPolicy`](Self::InvalidPolicy) - malformed profile build-requirements policy
/// - [`InvalidReference`](Self::InvalidReference) / [`InvalidVersionRange`](Self::InvalidVersionRange)
/// - [`InvalidBuildMode`](Self::InvalidBuildMode) - contradictory `--build` patterns
///
/// ## Reproducibility
/// - [`LockInconsistency`](Self::LockInconsistency) - resolution disagrees with the lock
/// - [`RevisionsDisabled`](Self::RevisionsDisabled) - a revision was given with revisions off
#[derive(Error, Debug)]
pub enum CpkgError {
    /// Two requirements for the same package resolve to versions that cannot be reconciled.
    #[error(
        "Conflict in {requirer}: requirement '{requested}' conflicts with already defined \
         '{existing}' (required by {existing_required_by})"
    )]
    Conflict {
        /// Package name in conflict
        name: String,
        /// Reference of the node already in the graph
        existing: String,
        /// Nodes that required the existing node
        existing_required_by: String,
        /// The new, incompatible requirement
        requested: String,
        /// Node declaring the new requirement
        requirer: String,
    },

    /// A requirement chain returns to one of its ancestors.
    #[error("Circular dependency detected: {chain}")]
    CyclicDependency {
        /// Names along the cycle, closing on the repeated one
        chain: String,
    },

    /// Malformed build-requirements pattern or policy entry in a profile.
    #[error("Invalid build-requirements policy '{pattern}': {reason}")]
    InvalidPolicy {
        /// The offending pattern
        pattern: String,
        /// Why it was rejected
        reason: String,
    },

    /// A freshly resolved node disagrees with the lock entry of the same id.
    #[error("Lockfile mismatch for node {node_id}: {reason}")]
    LockInconsistency {
        /// Node id in the lock
        node_id: String,
        /// What differs
        reason: String,
    },

    /// A recipe's own callback failed.
    #[error("{recipe}: Error in {callback}() method: {reason}")]
    RecipeEvaluation {
        /// Recipe display name
        recipe: String,
        /// Name of the failing callback
        callback: String,
        /// Underlying failure
        reason: String,
    },

    /// A reference string could not be parsed.
    #[error("Invalid reference '{reference}': {reason}")]
    InvalidReference {
        /// The text that failed to parse
        reference: String,
        /// Why it failed
        reason: String,
    },

    /// A version range expression could not be parsed.
    #[error("Invalid version range '{range}': {reason}")]
    InvalidVersionRange {
        /// The range text
        range: String,
        /// Why it failed
        reason: String,
    },

    /// A recipe declares the same requirement name twice.
    #[error("Duplicated requirement '{name}' in recipe {recipe}")]
    DuplicateRequirement {
        /// Recipe display name
        recipe: String,
        /// Duplicated package name
        name: String,
    },

    /// No configured index provides the requested recipe.
    #[error("Unable to find '{reference}' in any configured remote")]
    RecipeNotFound {
        /// The requested reference
        reference: String,
        /// Closest known name, when one exists
        suggestion: Option<String>,
    },

    /// No available version satisfies a range requirement.
    #[error("Version range '{requirement}' required by '{requirer}' could not be resolved")]
    NoMatchingVersion {
        /// The requirement as written
        requirement: String,
        /// Node declaring it
        requirer: String,
    },

    /// A remote reported an error that must abort resolution.
    #[error("Remote '{remote}' failed: {reason}")]
    RemoteFatal {
        /// Remote name
        remote: String,
        /// Failure description
        reason: String,
    },

    /// A reference carries a revision while revisions are disabled.
    #[error("Revisions not enabled in the client, specify a reference without revision: {reference}")]
    RevisionsDisabled {
        /// The offending reference
        reference: String,
    },

    /// The `--build` pattern list is contradictory.
    #[error("Invalid build mode: {reason}")]
    InvalidBuildMode {
        /// Why it was rejected
        reason: String,
    },

    /// Lock file parsing error.
    #[error("Invalid lockfile syntax in {file}")]
    LockfileParse {
        /// Path to the lock file
        file: String,
        /// Parser message
        reason: String,
    },

    /// Profile parsing error.
    #[error("Invalid profile syntax in {file}: {reason}")]
    ProfileParse {
        /// Path to the profile
        file: String,
        /// Parser message
        reason: String,
    },

    /// Recipe file parsing error.
    #[error("Invalid recipe file {file}: {reason}")]
    RecipeParse {
        /// Path to the recipe
        file: String,
        /// Parser message
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

/// Error context wrapper that provides user-friendly error information.
///
/// When displayed, errors show the main message in red, optional details in
/// yellow and an optional suggestion in green.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying cpkg error
    pub error: CpkgError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: CpkgError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] suitable for the CLI.
///
/// [`CpkgError`]s anywhere in the chain get tailored suggestions; everything
/// else is rendered with its full cause chain.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let error = match error.downcast::<CpkgError>() {
        Ok(cpkg_error) => return create_error_context(cpkg_error),
        Err(error) => error,
    };

    // A CpkgError wrapped under .context() still deserves its suggestion
    let mut message = error.to_string();
    if let Some(inner) = error.chain().find_map(|cause| cause.downcast_ref::<CpkgError>()) {
        let ctx = create_error_context(CpkgError::Other {
            message: format!("{message}: {inner}"),
        });
        let suggestion = suggestion_for(inner);
        return match suggestion {
            Some(suggestion) => ctx.with_suggestion(suggestion),
            None => ctx,
        };
    }

    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(CpkgError::Other {
        message,
    })
}

fn suggestion_for(error: &CpkgError) -> Option<String> {
    let suggestion = match error {
        CpkgError::Conflict {
            name, ..
        } => format!(
            "Declare '{name}' with an explicit version (or an override requirement) in the consumer recipe"
        ),
        CpkgError::CyclicDependency {
            ..
        } => "Review the recipes along the chain and remove the circular requirement".to_string(),
        CpkgError::InvalidPolicy {
            ..
        } => "Check the [build_requires] table of the profile: keys are '&', '&!' or glob patterns, values are lists of references".to_string(),
        CpkgError::LockInconsistency {
            ..
        } => "A recipe changed since the lockfile was created. Regenerate it with 'cpkg lock'".to_string(),
        CpkgError::RecipeEvaluation {
            callback, ..
        } => format!("Fix the {callback}() definition of the recipe"),
        CpkgError::RecipeNotFound {
            suggestion: Some(similar),
            ..
        } => format!("Did you mean '{similar}'?"),
        CpkgError::RecipeNotFound {
            ..
        } => "Check the configured remotes in ~/.cpkg/config.toml".to_string(),
        CpkgError::NoMatchingVersion {
            ..
        } => "Widen the version range or publish a matching version to a remote".to_string(),
        CpkgError::RevisionsDisabled {
            ..
        } => "Enable revisions with 'revisions_enabled = true' in ~/.cpkg/config.toml".to_string(),
        CpkgError::InvalidBuildMode {
            ..
        } => "Use '--build never' alone, or combine 'missing', 'cascade' and package patterns".to_string(),
        CpkgError::LockfileParse {
            ..
        } => "Delete the lockfile and run 'cpkg lock' to regenerate it".to_string(),
        _ => return None,
    };
    Some(suggestion)
}

fn create_error_context(error: CpkgError) -> ErrorContext {
    let suggestion = suggestion_for(&error);
    let details = match &error {
        CpkgError::Conflict {
            existing_required_by,
            requirer,
            ..
        } => Some(format!(
            "'{existing_required_by}' and '{requirer}' require incompatible versions of the same package"
        )),
        CpkgError::CyclicDependency {
            chain,
        } => Some(format!(
            "Circular dependency chain detected: {chain}. Packages cannot require themselves directly or indirectly"
        )),
        CpkgError::LockInconsistency {
            ..
        } => Some(
            "Lockfiles are never silently overwritten; resolution must reproduce every locked node"
                .to_string(),
        ),
        _ => None,
    };

    let mut ctx = ErrorContext::new(error);
    if let Some(suggestion) = suggestion {
        ctx = ctx.with_suggestion(suggestion);
    }
    if let Some(details) = details {
        ctx = ctx.with_details(details);
    }
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_conflict_message_names_both_requirers() {
        let error = CpkgError::Conflict {
            name: "zlib".to_string(),
            existing: "zlib/1.2.11".to_string(),
            existing_required_by: "liba/1.0".to_string(),
            requested: "zlib/1.2.8".to_string(),
            requirer: "libb/1.0".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("liba/1.0"));
        assert!(message.contains("libb/1.0"));
    }

    #[test]
    fn test_user_friendly_error_keeps_variant() {
        let error = anyhow::Error::from(CpkgError::LockInconsistency {
            node_id: "3".to_string(),
            reason: "reference changed".to_string(),
        });
        let ctx = user_friendly_error(error);
        assert!(matches!(ctx.error, CpkgError::LockInconsistency { .. }));
        assert!(ctx.suggestion.unwrap().contains("cpkg lock"));
    }

    #[test]
    fn test_user_friendly_error_through_context() {
        let error = Err::<(), _>(CpkgError::CyclicDependency {
            chain: "a -> b -> a".to_string(),
        })
        .context("Failed to load graph")
        .unwrap_err();
        let ctx = user_friendly_error(error);
        assert!(ctx.to_string().contains("a -> b -> a"));
        assert!(ctx.suggestion.is_some());
    }

    #[test]
    fn test_generic_error_includes_chain() {
        let error = anyhow::anyhow!("root cause").context("outer");
        let ctx = user_friendly_error(error);
        let text = ctx.to_string();
        assert!(text.contains("outer"));
        assert!(text.contains("root cause"));
    }
}
