//! Filesystem and platform helpers shared by the lock, config and CLI layers.

pub mod fs;
pub mod platform;

pub use fs::atomic_write;
pub use platform::{get_home_dir, resolve_path};
