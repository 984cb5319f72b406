//! `cpkg graph`: resolve and print.
//!
//! ```bash
//! cpkg graph .
//! cpkg graph zlib/1.2.11 --build missing --format json
//! cpkg graph . --lockfile cpkg.lock
//! ```

use anyhow::Result;
use clap::Args;

use super::CliConfig;
use super::common::ResolveArgs;
use super::report;
use crate::config::GlobalConfig;

#[derive(Args, Debug)]
pub struct GraphCommand {
    #[command(flatten)]
    resolve: ResolveArgs,

    /// Output format (tree, json)
    ///
    /// - `tree`: nodes with their binary status, dependencies indented
    /// - `json`: every node with its ids, closure and the resolution events
    #[arg(short = 'f', long, default_value = "tree")]
    format: String,
}

impl GraphCommand {
    pub async fn execute(self, global: &GlobalConfig, cli: &CliConfig) -> Result<()> {
        self.validate_arguments()?;
        let resolved = self.resolve.resolve(global).await?;
        let resolution = &resolved.resolution;

        if self.format == "json" {
            println!("{}", report::render_json(resolution)?);
            return Ok(());
        }

        if !cli.quiet {
            report::print_events(&resolution.report);
        }
        print!("{}", report::render_tree(&resolution.graph));
        Ok(())
    }

    fn validate_arguments(&self) -> Result<()> {
        match self.format.as_str() {
            "tree" | "json" => Ok(()),
            _ => Err(anyhow::anyhow!("Invalid format '{}'. Valid formats are: tree, json", self.format)),
        }
    }
}
