//! CLI command implementations

use clap::{Parser, Subcommand};

pub mod error;
pub mod show;
pub mod sync;

pub use error::CliError;
pub use show::{DirArgs, IdentifyArgs};
pub use sync::SyncArgs;

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "oai-harvest",
    version,
    about = "Incremental OAI-PMH metadata harvester"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Harvest an endpoint into the local cache
    Sync(SyncArgs),
    /// Print an endpoint's Identify record as JSON
    Identify(IdentifyArgs),
    /// Print the cache directory used for an endpoint
    Dir(DirArgs),
}

/// Prepend `http://`, if a scheme is missing.
pub(crate) fn prepend_scheme(endpoint: &str) -> String {
    if endpoint.starts_with("http") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}
