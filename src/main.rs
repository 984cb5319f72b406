//! cpkg CLI entry point
//!
//! Parses the command line, runs the command and renders failures with
//! their suggestions:
//! - `graph` - resolve a dependency graph and print it
//! - `lock` - resolve a dependency graph and write its lock

use anyhow::Result;
use clap::Parser;
use cpkg::cli;
use cpkg::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
