//! Core error types shared by every cpkg module.
//!
//! [`CpkgError`] enumerates every failure the resolution engine can report and
//! [`ErrorContext`] decorates it for terminal output.

pub mod error;

pub use error::{CpkgError, ErrorContext, user_friendly_error};
