//! HTTP client for OAI-PMH endpoints
//!
//! Retries on network errors, 5xx responses, and 429 rate limiting with
//! exponential backoff. Other client errors fail immediately. Two presets
//! exist: a short-fused client for the Identify probe and a tolerant one
//! for the long-running harvest conversation.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use super::{clean_xml, OaiResponse, OaiTransport, Request, TransportError, TransportResult};
use crate::config;

/// Reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct OaiClient {
    client: reqwest::Client,
    max_retries: u32,
}

impl OaiClient {
    /// Create a client with an explicit timeout and retry budget.
    pub fn new(timeout: Duration, max_retries: u32) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| TransportError::Network(error.to_string()))?;
        Ok(Self {
            client,
            max_retries,
        })
    }

    /// Short-timeout client for the one-shot Identify probe.
    pub fn for_identify() -> TransportResult<Self> {
        Self::new(config::IDENTIFY_TIMEOUT, config::IDENTIFY_MAX_RETRIES)
    }

    /// Tolerant client for the harvest conversation.
    pub fn for_harvesting() -> TransportResult<Self> {
        Self::new(config::HARVEST_TIMEOUT, config::HARVEST_MAX_RETRIES)
    }

    async fn fetch_body(&self, request: &Request) -> TransportResult<String> {
        let params = request.query_params();
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            let response = match self
                .client
                .get(&request.base_url)
                .query(&params)
                .send()
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    warn!(
                        attempt = attempt + 1,
                        error = %error,
                        "network error talking to endpoint"
                    );
                    last_error = Some(TransportError::Network(error.to_string()));
                    if attempt < self.max_retries {
                        tokio::time::sleep(config::retry_backoff(attempt)).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                warn!(%status, attempt = attempt + 1, "retryable HTTP status from endpoint");
                last_error = Some(TransportError::Http(format!("status {status}")));
                if attempt < self.max_retries {
                    tokio::time::sleep(config::retry_backoff(attempt)).await;
                    continue;
                }
                break;
            }
            if status.is_client_error() {
                return Err(TransportError::Http(format!("status {status}")));
            }

            debug!(verb = %request.verb, attempt = attempt + 1, "request succeeded");
            return response
                .text()
                .await
                .map_err(|error| TransportError::Network(error.to_string()));
        }

        Err(last_error
            .unwrap_or_else(|| TransportError::Network("all retries exhausted".to_string())))
    }
}

#[async_trait]
impl OaiTransport for OaiClient {
    async fn execute(&self, request: &Request) -> TransportResult<OaiResponse> {
        let mut body = self.fetch_body(request).await?;
        if request.clean_before_decode {
            body = clean_xml(&body);
        }
        OaiResponse::from_xml(body)
    }
}
