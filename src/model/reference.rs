//! Package references: `name/version[@user/channel][#revision]`.

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::core::CpkgError;

fn component_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9_][a-zA-Z0-9_+.-]{0,50}$").expect("static regex is valid")
    })
}

/// Immutable identity of a package.
///
/// Two references denote the *same package identity* when every field but the
/// revision matches ([`same_identity`](Self::same_identity)); the revision
/// distinguishes immutable content versions of that identity.
///
/// # Examples
///
/// ```rust
/// use cpkg::model::Reference;
///
/// let reference: Reference = "zlib/1.2.11@demo/stable#a1b2".parse()?;
/// assert_eq!(reference.name, "zlib");
/// assert_eq!(reference.revision.as_deref(), Some("a1b2"));
/// assert_eq!(reference.to_string(), "zlib/1.2.11@demo/stable");
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    pub name: String,
    pub version: String,
    pub user: Option<String>,
    pub channel: Option<String>,
    pub revision: Option<String>,
}

impl Reference {
    /// Build a reference without user, channel or revision.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            user: None,
            channel: None,
            revision: None,
        }
    }

    /// Set user and channel.
    #[must_use]
    pub fn with_user_channel(mut self, user: impl Into<String>, channel: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.channel = Some(channel.into());
        self
    }

    /// Set the revision.
    #[must_use]
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Parse and validate a reference.
    ///
    /// # Errors
    ///
    /// Returns [`CpkgError::InvalidReference`] when the text is not of the form
    /// `name/version[@user/channel][#revision]` or a component is invalid.
    pub fn parse(text: &str) -> Result<Self> {
        let (name, version, user, channel, revision) = split_reference(text)?;
        validate_component(text, "name", name)?;
        if version.is_empty() || version.contains(['/', '@', '#']) {
            return Err(invalid(text, "version must be a non-empty token"));
        }
        if let (Some(user), Some(channel)) = (user, channel) {
            validate_component(text, "user", user)?;
            validate_component(text, "channel", channel)?;
        }

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            user: user.map(str::to_string),
            channel: channel.map(str::to_string),
            revision: revision.map(str::to_string),
        })
    }

    /// Whether both references name the same package identity (revision ignored).
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.name == other.name
            && self.version == other.version
            && self.user == other.user
            && self.channel == other.channel
    }

    /// Copy of this reference without its revision.
    #[must_use]
    pub fn without_revision(&self) -> Self {
        Self {
            revision: None,
            ..self.clone()
        }
    }

    /// Text form including the revision, when present.
    #[must_use]
    pub fn full_str(&self) -> String {
        match &self.revision {
            Some(revision) => format!("{self}#{revision}"),
            None => self.to_string(),
        }
    }
}

/// Split `name/version[@user/channel][#revision]` without validating the
/// component character sets. Shared with requirement parsing, where the
/// version slot may hold a bracketed range.
pub(crate) fn split_reference(
    text: &str,
) -> Result<(&str, &str, Option<&str>, Option<&str>, Option<&str>)> {
    let text_trimmed = text.trim();
    let (body, revision) = match text_trimmed.split_once('#') {
        Some((body, revision)) if !revision.is_empty() => (body, Some(revision)),
        Some(_) => return Err(invalid(text, "empty revision after '#'")),
        None => (text_trimmed, None),
    };

    // A range may contain '@'-free but space-separated tokens; split on the
    // '@' that follows the closing bracket when one exists.
    let at_search_start = body.find(']').unwrap_or(0);
    let (name_version, user_channel) = match body[at_search_start..].find('@') {
        Some(pos) => {
            let pos = at_search_start + pos;
            (&body[..pos], Some(&body[pos + 1..]))
        }
        None => (body, None),
    };

    let (name, version) =
        name_version.split_once('/').ok_or_else(|| invalid(text, "expected 'name/version'"))?;

    let (user, channel) = match user_channel {
        Some(uc) => {
            let (user, channel) =
                uc.split_once('/').ok_or_else(|| invalid(text, "expected '@user/channel'"))?;
            if user.is_empty() || channel.is_empty() {
                return Err(invalid(text, "user and channel must both be set"));
            }
            (Some(user), Some(channel))
        }
        None => (None, None),
    };

    Ok((name, version, user, channel, revision))
}

fn validate_component(text: &str, what: &str, value: &str) -> Result<()> {
    if component_pattern().is_match(value) {
        Ok(())
    } else {
        Err(invalid(
            text,
            &format!("{what} '{value}' must be 1-51 characters of [a-zA-Z0-9_+.-]"),
        ))
    }
}

fn invalid(text: &str, reason: &str) -> anyhow::Error {
    CpkgError::InvalidReference {
        reference: text.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)?;
        if let (Some(user), Some(channel)) = (&self.user, &self.channel) {
            write!(f, "@{user}/{channel}")?;
        }
        Ok(())
    }
}

impl FromStr for Reference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.full_str())
    }
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
