//! `cpkg lock`: resolve and write the lock.
//!
//! The lock is only written once the whole resolution succeeded. With
//! `--install-folder`, the folder also receives `graph_info.toml` so later
//! commands load the recipe with the same identity.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::CliConfig;
use super::common::{ResolveArgs, ResolvedGraph};
use super::report;
use crate::config::GlobalConfig;
use crate::constants::LOCKFILE_NAME;
use crate::lockfile::{GraphInfo, GraphLockFile};

#[derive(Args, Debug)]
pub struct LockCommand {
    #[command(flatten)]
    resolve: ResolveArgs,

    /// Where to write the lock
    ///
    /// Defaults to the install folder, then to the `--lockfile` input,
    /// then to `cpkg.lock` in the current directory.
    #[arg(long, value_name = "PATH")]
    lockfile_out: Option<PathBuf>,
}

impl LockCommand {
    pub async fn execute(self, global: &GlobalConfig, cli: &CliConfig) -> Result<()> {
        let ResolvedGraph {
            resolution,
            profile,
            lockfile,
        } = self.resolve.resolve(global).await?;

        if !cli.quiet {
            report::print_events(&resolution.report);
        }

        let output = self.output_path();
        let nodes = resolution.lock.nodes.len();
        let info = resolution.graph.root().map(|root| GraphInfo::from_root(&resolution.graph[root], &profile));
        let lockfile = match lockfile {
            Some(mut existing) => {
                existing.root_reference.clone_from(&resolution.root_reference);
                existing.graph_lock = resolution.lock;
                existing
            }
            None => GraphLockFile::new(profile, resolution.root_reference.clone(), resolution.lock),
        };
        lockfile.save(&output)?;

        if let (Some(folder), Some(info)) = (&self.resolve.install_folder, info) {
            info.save(folder)?;
        }

        if !cli.quiet {
            println!("{} Locked {} nodes in {}", "✓".green(), nodes, output.display());
        }
        Ok(())
    }

    fn output_path(&self) -> PathBuf {
        if let Some(path) = &self.lockfile_out {
            return path.clone();
        }
        if let Some(folder) = &self.resolve.install_folder {
            return folder.join(LOCKFILE_NAME);
        }
        self.resolve.lockfile.clone().unwrap_or_else(|| PathBuf::from(LOCKFILE_NAME))
    }
}
