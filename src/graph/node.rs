//! Vertices and edges of the dependency graph.

use indexmap::IndexMap;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::model::{Recipe, Reference};

/// Stable node identifier, unique within one resolution and referenced by
/// the lock. Serialized as a string so it can key TOML tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse::<u32>()
            .map(NodeId)
            .map_err(|_| serde::de::Error::custom(format!("invalid node id '{text}'")))
    }
}

/// Structural role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipeKind {
    /// Root loaded from the user's own recipe.
    Consumer,
    /// Synthetic root wrapping a list of references.
    Virtual,
    /// Recipe fetched from an index.
    Regular,
    /// Package developed in place from a local folder.
    Editable,
}

/// Binary decision taken by the [`BinaryAnalyzer`](super::binary::BinaryAnalyzer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryStatus {
    /// Not decided yet.
    Unknown,
    /// Built from sources.
    MustBuild,
    /// Available in a local index.
    Cached,
    /// Available in a remote index.
    Download,
    /// Editable package, used from its folder.
    Editable,
    /// No binary is needed.
    Skip,
    /// No binary exists and building was not allowed.
    Missing,
}

impl fmt::Display for BinaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unknown => "Unknown",
            Self::MustBuild => "Build",
            Self::Cached => "Cache",
            Self::Download => "Download",
            Self::Editable => "Editable",
            Self::Skip => "Skip",
            Self::Missing => "Missing",
        };
        f.write_str(text)
    }
}

/// Opaque binary compatibility identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a node's requirements are evaluated.
///
/// Regular requirements share the requirer's context. Build requirements of
/// node `n` live in `BuildOf(n)`, so a tool used to build two packages is
/// resolved independently for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvalContext {
    Host,
    BuildOf(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Requires,
    Build,
}

/// Edge from a requirer to one of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub kind: EdgeKind,
    /// The dependency stays out of the requirer's public closure.
    pub private: bool,
}

impl Edge {
    #[must_use]
    pub const fn requires(private: bool) -> Self {
        Self {
            kind: EdgeKind::Requires,
            private,
        }
    }

    #[must_use]
    pub const fn build() -> Self {
        Self {
            kind: EdgeKind::Build,
            private: true,
        }
    }
}

/// One package in one evaluation context.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// `None` for virtual roots and anonymous consumers.
    pub reference: Option<Reference>,
    pub recipe: Recipe,
    pub kind: RecipeKind,
    pub binary: BinaryStatus,
    /// `None` until decided by the binary analyzer, and for nodes whose id
    /// cannot be computed yet.
    pub package_id: Option<PackageId>,
    /// Index that provides the binary, for `Cached`/`Download`.
    pub binary_remote: Option<String>,
    /// Index that provided the recipe.
    pub recipe_remote: Option<String>,
    pub context: EvalContext,
    /// Package names from the root down to the requirer of this node.
    pub ancestors: Vec<String>,
    /// Dependencies visible to consumers of this node, keyed by name.
    pub public_closure: IndexMap<String, NodeIndex>,
}

impl Node {
    pub fn new(id: NodeId, reference: Option<Reference>, recipe: Recipe, kind: RecipeKind) -> Self {
        Self {
            id,
            reference,
            recipe,
            kind,
            binary: BinaryStatus::Unknown,
            package_id: None,
            binary_remote: None,
            recipe_remote: None,
            context: EvalContext::Host,
            ancestors: Vec::new(),
            public_closure: IndexMap::new(),
        }
    }

    /// Package name, or an empty string for anonymous roots.
    #[must_use]
    pub fn name(&self) -> &str {
        self.reference
            .as_ref()
            .map(|r| r.name.as_str())
            .or(self.recipe.name.as_deref())
            .unwrap_or("")
    }

    #[must_use]
    pub fn is_consumer(&self) -> bool {
        self.kind == RecipeKind::Consumer
    }

    /// Printed form used in messages and profile glob matching.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.reference, self.kind) {
            (Some(reference), _) => reference.to_string(),
            (None, RecipeKind::Virtual) => "virtual".to_string(),
            (None, _) => self.recipe.display_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_serializes_as_string() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            id: NodeId,
        }
        let text = toml::to_string(&Wrapper {
            id: NodeId(7),
        })
        .unwrap();
        assert_eq!(text.trim(), "id = \"7\"");
        let back: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(back.id, NodeId(7));
        assert!(toml::from_str::<Wrapper>("id = \"x\"").is_err());
    }

    #[test]
    fn test_node_names() {
        let virtual_root = Node::new(NodeId(0), None, Recipe::anonymous(), RecipeKind::Virtual);
        assert_eq!(virtual_root.name(), "");
        assert_eq!(virtual_root.display_name(), "virtual");

        let zlib = Reference::new("zlib", "1.2.11");
        let node = Node::new(NodeId(1), Some(zlib.clone()), Recipe::for_reference(&zlib), RecipeKind::Regular);
        assert_eq!(node.name(), "zlib");
        assert_eq!(node.display_name(), "zlib/1.2.11");
        assert!(!node.is_consumer());
    }
}
