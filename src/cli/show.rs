//! Identify and dir command implementations

use clap::Args;
use std::path::PathBuf;

use super::{prepend_scheme, CliError};
use crate::cache::CacheLayout;
use crate::transport::{OaiClient, OaiTransport, Request};

/// Arguments for the identify command.
#[derive(Debug, Args)]
pub struct IdentifyArgs {
    /// Repository endpoint URL
    pub base_url: String,
}

impl IdentifyArgs {
    /// Probe the endpoint and print its Identify record as JSON.
    pub async fn execute(&self) -> Result<(), CliError> {
        let client = OaiClient::for_identify()?;
        let request = Request::identify(prepend_scheme(&self.base_url));
        let response = client.execute(&request).await?;
        if let Some(fault) = response.fault() {
            return Err(CliError::Endpoint(format!(
                "{}: {}",
                fault.code,
                fault.message.as_deref().unwrap_or("")
            )));
        }
        let identify = response.identify().cloned().unwrap_or_default();
        println!("{}", serde_json::to_string_pretty(&identify)?);
        Ok(())
    }
}

/// Arguments for the dir command.
#[derive(Debug, Args)]
pub struct DirArgs {
    /// Repository endpoint URL
    pub base_url: String,

    /// Metadata format the cache was harvested with
    #[arg(short, long, default_value = "oai_dc")]
    pub format: String,

    /// Set the cache was harvested with
    #[arg(short, long)]
    pub set: Option<String>,

    /// Cache base directory (defaults to $OAI_HARVEST_DIR or ~/.oai-harvest)
    #[arg(long)]
    pub base_dir: Option<PathBuf>,
}

impl DirArgs {
    /// Print the cache directory for the endpoint identity.
    pub fn execute(&self) -> Result<(), CliError> {
        let layout = CacheLayout::resolve(self.base_dir.clone());
        let dir = layout.endpoint_dir(
            &prepend_scheme(&self.base_url),
            self.set.as_deref(),
            &self.format,
        );
        println!("{}", dir.display());
        Ok(())
    }
}
