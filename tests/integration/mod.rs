//! Integration test suite for cpkg
//!
//! End-to-end resolutions against directory indexes in temporary folders,
//! through the library API and through the `cpkg` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **resolution**: regular requirements, ranges, overrides, conflicts, cycles
//! - **build_requires**: build contexts, profile policies, binary decisions
//! - **lockfile**: lock round trips and reconciliation
//! - **cli**: the `graph` and `lock` commands

mod common;

mod build_requires;
mod cli;
mod lockfile;
mod resolution;
