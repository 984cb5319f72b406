//! User configuration.
//!
//! cpkg reads a single global file, `~/.cpkg/config.toml` (or the file named
//! by `CPKG_CONFIG`). It declares where recipes come from and resolution
//! defaults; nothing in it is project specific.

mod global;

pub use global::{GlobalConfig, RemoteConfig};

/// Environment variable overriding the global config location.
pub const CONFIG_ENV: &str = "CPKG_CONFIG";
