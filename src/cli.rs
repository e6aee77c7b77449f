use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Discover catalog pages across sources and track how they move and
/// disappear.
#[derive(Debug, Parser)]
#[command(name = "spoor", version, about)]
pub struct Cli {
    /// Configuration file (defaults to `spoor.yaml` in the working directory
    /// or the user config directory).
    #[arg(long, short, global = true, env = "SPOOR_CONFIG")]
    pub config: Option<PathBuf>,
    /// More logging; repeat for more. `SPOOR_LOG` overrides this.
    #[arg(long, short, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Create the tracking store.
    Init,
    /// Discover pages and write listings, without touching the store.
    Discover(SourceArgs),
    /// Discover and classify against the store, without writing to it.
    Detect(SourceArgs),
    /// Discover, classify, extract and write back.
    Run(RunArgs),
    /// List previous runs.
    History,
}

#[derive(Debug, Default, PartialEq, Eq, Args)]
pub struct SourceArgs {
    /// Only process the source with this slug.
    #[arg(long, short)]
    pub source: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub sources: SourceArgs,
    /// Create the tracking store if it doesn't exist.
    #[arg(long)]
    pub init: bool,
    /// Classify and report, but write nothing to the store.
    #[arg(long)]
    pub dry_run: bool,
}
