//! Value types describing packages: references, requirements, recipes and
//! profiles.
//!
//! These types are immutable inputs to graph resolution. The graph itself
//! lives in [`crate::graph`].

pub mod profile;
pub mod recipe;
pub mod reference;
pub mod requirement;

pub use profile::{BuildRequiresPolicy, Profile, ProfilePattern, Settings};
pub use recipe::{BuildPolicy, BuildRequirementsHook, Recipe};
pub use reference::Reference;
pub use requirement::{BuildRequires, Requirement, Requirements};
