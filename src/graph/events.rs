//! Structured records of what happened during a resolution.
//!
//! The resolution algorithms never print. They push [`ResolutionEvent`]s into
//! a [`ResolutionReport`] that the caller renders (see `cli::report`) or
//! inspects in tests.

use serde::Serialize;

use super::node::{BinaryStatus, NodeId, PackageId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ResolutionEvent {
    /// A version range was resolved to a concrete reference.
    VersionRangeSolved {
        requirer: String,
        range: String,
        resolved: String,
        remote: String,
    },
    /// A downstream requirement replaced a transitive one.
    RequirementOverridden {
        requirer: String,
        from: String,
        to: String,
    },
    /// A build requirement was attached to a node.
    BuildRequireAdded {
        node: String,
        reference: String,
        from_profile: bool,
    },
    /// A remote could not serve a request and the next one was tried.
    RemoteSkipped {
        remote: String,
        reason: String,
    },
    /// The binary analyzer decided a node.
    BinaryEvaluated {
        node: String,
        status: BinaryStatus,
        package_id: Option<PackageId>,
    },
    /// A `--build` pattern matched no package.
    UnmatchedBuildPattern {
        pattern: String,
    },
    /// The lock gained a node it did not know.
    LockNodeAdded {
        id: NodeId,
    },
}

/// Events of one resolution, in the order they occurred.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ResolutionReport {
    events: Vec<ResolutionEvent>,
}

impl ResolutionReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: ResolutionEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> impl Iterator<Item = &ResolutionEvent> {
        self.events.iter()
    }

    /// `(range, resolved)` pairs of every range resolution.
    pub fn range_resolutions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.events.iter().filter_map(|event| match event {
            ResolutionEvent::VersionRangeSolved {
                range,
                resolved,
                ..
            } => Some((range.as_str(), resolved.as_str())),
            _ => None,
        })
    }

    /// Build requirements added to `node`, by printed reference.
    pub fn build_requires_added<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a str> {
        self.events.iter().filter_map(move |event| match event {
            ResolutionEvent::BuildRequireAdded {
                node: added_to,
                reference,
                ..
            } if added_to == node => Some(reference.as_str()),
            _ => None,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
