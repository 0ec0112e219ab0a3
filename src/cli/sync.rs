//! Sync command implementation

use clap::Args;
use std::path::PathBuf;
use tracing::info;

use super::{prepend_scheme, CliError};
use crate::cache::CacheLayout;
use crate::config;
use crate::harvest::{HarvestError, HarvestOptions, Harvester};

/// Arguments for the sync command.
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Repository endpoint URL
    pub base_url: String,

    /// Metadata format to request
    #[arg(short, long, default_value = "oai_dc")]
    pub format: String,

    /// Restrict harvesting to a set
    #[arg(short, long)]
    pub set: Option<String>,

    /// Start date (YYYY-MM-DD) overriding the endpoint's earliest datestamp
    #[arg(long)]
    pub from: Option<String>,

    /// Harvest day-sized windows instead of calendar months
    #[arg(long)]
    pub daily: bool,

    /// Harvest without from/until for endpoints that reject them
    #[arg(long)]
    pub no_intervals: bool,

    /// Stop a window early instead of failing when a request errors
    #[arg(long)]
    pub ignore_http_errors: bool,

    /// Omit the metadataPrefix parameter for servers that reject it
    #[arg(long)]
    pub suppress_format_parameter: bool,

    /// Strip bytes that are invalid in XML 1.0 before decoding responses
    #[arg(long)]
    pub clean: bool,

    /// Maximum number of requests per window (0 = unlimited)
    #[arg(long, default_value_t = config::DEFAULT_MAX_REQUESTS)]
    pub max_requests: u32,

    /// Stop a window after this many consecutive empty pages (0 = unlimited)
    #[arg(long, default_value_t = config::DEFAULT_MAX_EMPTY_RESPONSES)]
    pub max_empty_responses: u32,

    /// Cache base directory (defaults to $OAI_HARVEST_DIR or ~/.oai-harvest)
    #[arg(long)]
    pub base_dir: Option<PathBuf>,
}

impl SyncArgs {
    /// Run the harvest described by these arguments.
    pub async fn execute(&self) -> Result<(), CliError> {
        let layout = CacheLayout::resolve(self.base_dir.clone());
        let mut harvester = Harvester::connect(self.to_options(), &layout).await?;
        info!(dir = %harvester.dir().display(), "harvesting into cache directory");

        match harvester.run().await {
            Ok(()) => Ok(()),
            Err(HarvestError::AlreadySynced) => {
                info!("already synced");
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    fn to_options(&self) -> HarvestOptions {
        HarvestOptions {
            base_url: prepend_scheme(&self.base_url),
            format: self.format.clone(),
            set: self.set.clone(),
            from: self.from.clone(),
            max_requests: self.max_requests,
            max_empty_responses: self.max_empty_responses,
            disable_selective_harvesting: self.no_intervals,
            clean_before_decode: self.clean,
            ignore_http_errors: self.ignore_http_errors,
            suppress_format_parameter: self.suppress_format_parameter,
            daily_interval: self.daily,
        }
    }
}
