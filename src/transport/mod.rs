//! OAI-PMH transport layer
//!
//! Issues protocol requests over HTTP and decodes the XML envelope while
//! retaining the raw body, which is what the harvester persists. The
//! harvesting engine consumes the [`OaiTransport`] trait so that tests can
//! script a repository without a network.

use async_trait::async_trait;

pub mod client;
pub mod request;
pub mod response;

pub use client::OaiClient;
pub use request::{Request, Verb};
pub use response::{clean_xml, Envelope, Identify, ListRecords, OaiFault, OaiResponse, Record};

/// Transport errors (network, HTTP status, XML decoding)
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response body could not be decoded as an OAI-PMH envelope
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// A request/response channel to one OAI-PMH repository
#[async_trait]
pub trait OaiTransport: Send + Sync {
    /// Perform one protocol request and decode the response envelope.
    async fn execute(&self, request: &Request) -> TransportResult<OaiResponse>;
}
