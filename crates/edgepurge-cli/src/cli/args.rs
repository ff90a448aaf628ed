use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "edgepurge",
    version,
    about = "Purge every derived variant of changed resources from an edge cache"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Purge all existing derivatives of the given resources
    Purge(PurgeArgs),
    /// Print the purge requests a batch would send, without sending them
    Expand(ExpandArgs),
}

#[derive(clap::Args, Clone, Debug)]
pub struct ConfigArgs {
    /// YAML configuration file
    #[arg(long, short = 'c', env = "EDGEPURGE_CONFIG")]
    pub config: PathBuf,

    /// Override purger.endpoint
    #[arg(long)]
    pub endpoint: Option<String>,
}

#[derive(clap::Args, Clone, Debug)]
pub struct PurgeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Override purger.concurrency
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// JSON-lines file of changed entities; their resources are queued
    /// through the configured queuer rules
    #[arg(long)]
    pub entities: Option<PathBuf>,

    /// Resource URIs to invalidate (e.g. public://photos/cat.png)
    pub uris: Vec<String>,
}

#[derive(clap::Args, Clone, Debug)]
pub struct ExpandArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Resource URIs to expand
    #[arg(required = true)]
    pub uris: Vec<String>,
}
