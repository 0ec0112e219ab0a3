//! CLI error types and conversions

use crate::harvest::HarvestError;
use crate::transport::TransportError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Harvest error
    #[error("harvest error: {0}")]
    Harvest(#[from] HarvestError),

    /// Transport error
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Endpoint answered with a protocol error
    #[error("endpoint error: {0}")]
    Endpoint(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
