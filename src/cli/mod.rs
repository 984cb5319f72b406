//! Command-line interface for cpkg.
//!
//! Every command resolves a dependency graph and differs only in what it
//! does with the result:
//!
//! - `graph` - print the resolved graph as a tree or as JSON
//! - `lock` - write the lock of the resolution to a file
//!
//! # Global options
//!
//! - `--verbose` / `-v` - debug logging
//! - `--quiet` / `-q` - errors only, no advisories
//! - `--config <PATH>` - global config file, overriding `$CPKG_CONFIG` and
//!   `~/.cpkg/config.toml`
//!
//! Logs go to stderr through `tracing`; `RUST_LOG` is honored unless one of
//! the flags above sets the level explicitly.
//!
//! # Examples
//!
//! ```bash
//! # Resolve the recipe of the current folder
//! cpkg graph .
//!
//! # Resolve two packages together, building everything that has no binary
//! cpkg graph zlib/1.2.11 boost/1.80 --build missing
//!
//! # Lock the graph, then reuse the lock
//! cpkg lock . --lockfile-out cpkg.lock
//! cpkg graph . --lockfile cpkg.lock
//! ```

pub mod common;
mod graph;
mod lock;
pub mod report;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::GlobalConfig;

/// Runtime settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Explicit log level. `None` defers to `RUST_LOG`, then `info`.
    pub log_level: Option<String>,
    /// Suppress advisories on stdout.
    pub quiet: bool,
    /// Global config file given with `--config`.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Install the global tracing subscriber. Later calls are no-ops.
    pub fn init_logging(&self) {
        let filter = match &self.log_level {
            Some(level) => EnvFilter::new(level),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        };
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

#[derive(Parser)]
#[command(
    name = "cpkg",
    about = "Dependency graph resolution for source packages",
    version,
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the global config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a graph and print it
    Graph(graph::GraphCommand),

    /// Resolve a graph and write its lock
    Lock(lock::LockCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            None
        };

        CliConfig {
            log_level,
            quiet: self.quiet,
            config_path: self.config.clone(),
        }
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();
        let global = GlobalConfig::load_with_optional(config.config_path.clone()).await?;

        match self.command {
            Commands::Graph(cmd) => cmd.execute(&global, &config).await,
            Commands::Lock(cmd) => cmd.execute(&global, &config).await,
        }
    }
}
