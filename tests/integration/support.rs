//! Shared test support: a scripted repository transport and envelope builders

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use oai_harvest::transport::{
    Identify, OaiResponse, OaiTransport, Request, TransportError, TransportResult,
};
use oai_harvest::{CacheLayout, HarvestOptions, Harvester};

/// Transport that replays a scripted sequence of responses and records every
/// request it saw. Clones share the script and the request log.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<TransportResult<OaiResponse>>>>,
    requests: Arc<Mutex<Vec<Request>>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<TransportResult<OaiResponse>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(script.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    /// A transport that answers one request per permit added to the
    /// returned gate, so tests can interleave with a running harvest
    /// deterministically.
    pub fn gated(script: Vec<TransportResult<OaiResponse>>) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let mut transport = Self::new(script);
        transport.gate = Some(gate.clone());
        (transport, gate)
    }

    /// Requests issued so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// How many scripted responses were never consumed.
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl OaiTransport for ScriptedTransport {
    async fn execute(&self, request: &Request) -> TransportResult<OaiResponse> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("script exhausted".to_string())))
    }
}

/// Poll a condition until it holds, failing the test after a few seconds.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting until {what}");
}

/// Build a ListRecords page with the given number of records and an optional
/// resumption token.
pub fn list_page(record_count: usize, token: Option<&str>) -> TransportResult<OaiResponse> {
    let mut records = String::new();
    for i in 0..record_count {
        records.push_str(&format!(
            "<record><header><identifier>oai:test:{i}</identifier>\
             <datestamp>2020-01-16</datestamp></header>\
             <metadata><dc/></metadata></record>"
        ));
    }
    let token_xml = token
        .map(|t| format!("<resumptionToken>{t}</resumptionToken>"))
        .unwrap_or_default();
    OaiResponse::from_xml(format!(
        "<OAI-PMH><responseDate>2020-03-10T12:00:00Z</responseDate>\
         <ListRecords>{records}{token_xml}</ListRecords></OAI-PMH>"
    ))
}

/// Build an error envelope, optionally still carrying a resumption token.
pub fn fault_page(code: &str, token: Option<&str>) -> TransportResult<OaiResponse> {
    let token_xml = token
        .map(|t| format!("<ListRecords><resumptionToken>{t}</resumptionToken></ListRecords>"))
        .unwrap_or_default();
    OaiResponse::from_xml(format!(
        "<OAI-PMH><error code=\"{code}\">scripted</error>{token_xml}</OAI-PMH>"
    ))
}

/// Identify record for a day-granularity endpoint.
pub fn day_identify(earliest: &str) -> Identify {
    Identify {
        granularity: "YYYY-MM-DD".to_string(),
        earliest_datestamp: earliest.to_string(),
        ..Identify::default()
    }
}

/// Identify record for a second-granularity endpoint.
pub fn second_identify(earliest: &str) -> Identify {
    Identify {
        granularity: "YYYY-MM-DDThh:mm:ssZ".to_string(),
        earliest_datestamp: earliest.to_string(),
        ..Identify::default()
    }
}

/// Build a harvester over a scripted transport rooted at `base`.
pub fn harvester(
    base: &Path,
    options: HarvestOptions,
    identify: Identify,
    transport: &ScriptedTransport,
) -> Harvester {
    Harvester::with_transport(
        options,
        identify,
        Box::new(transport.clone()),
        &CacheLayout::new(base),
    )
}

/// Parse an RFC3339 instant.
pub fn instant(value: &str) -> DateTime<Utc> {
    value.parse().unwrap()
}

/// Names of all promoted files in a directory, sorted.
pub fn cached_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter(|name| name.ends_with(".xml.gz"))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Names of all temporary files in a directory, sorted.
pub fn temp_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter(|name| name.contains("-tmp-"))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
