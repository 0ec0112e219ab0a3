//! Response envelope decoding
//!
//! The harvester persists response bodies byte-for-byte; decoding only has
//! to surface the fields that steer the conversation: the error code, the
//! resumption token, the number of records on the page, and the Identify
//! fields. Everything else in the envelope is skipped.

use serde::{Deserialize, Serialize};

use super::{TransportError, TransportResult};

/// Decoded OAI-PMH envelope.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Envelope {
    /// Server-reported response timestamp
    #[serde(rename = "responseDate")]
    pub response_date: Option<String>,

    /// Protocol error, if the server reported one
    #[serde(rename = "error")]
    pub error: Option<OaiFault>,

    /// Identify payload, present on Identify responses
    #[serde(rename = "Identify")]
    pub identify: Option<Identify>,

    /// ListRecords payload, present on ListRecords responses
    #[serde(rename = "ListRecords")]
    pub list_records: Option<ListRecords>,
}

/// Protocol-level error envelope.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OaiFault {
    /// Machine-readable error code, e.g. `noRecordsMatch`
    #[serde(rename = "@code")]
    pub code: String,

    /// Human-readable message
    #[serde(rename = "$text")]
    pub message: Option<String>,
}

/// ListRecords payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListRecords {
    /// Records on this page
    #[serde(rename = "record")]
    pub records: Vec<Record>,

    /// Pagination cursor for the next page
    #[serde(rename = "resumptionToken")]
    pub resumption_token: Option<TokenElement>,
}

/// Resumption token element.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenElement {
    /// Declared size of the complete result list
    #[serde(rename = "@completeListSize")]
    pub complete_list_size: Option<String>,

    /// Declared position of this page
    #[serde(rename = "@cursor")]
    pub cursor: Option<String>,

    /// The opaque cursor itself
    #[serde(rename = "$text")]
    pub value: Option<String>,
}

/// One record on a page. Only the header is decoded; the metadata payload
/// stays in the raw body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Record {
    /// Record header
    #[serde(rename = "header")]
    pub header: Option<RecordHeader>,
}

/// Record header fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecordHeader {
    /// Deletion status attribute
    #[serde(rename = "@status")]
    pub status: Option<String>,

    /// Record identifier
    pub identifier: Option<String>,

    /// Record datestamp
    pub datestamp: Option<String>,

    /// Sets the record belongs to
    #[serde(rename = "setSpec")]
    pub set_spec: Vec<String>,
}

/// Identify payload; `granularity` and `earliest_datestamp` steer interval
/// planning, the rest is informational.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Identify {
    /// Display name of the repository
    #[serde(rename = "repositoryName")]
    pub repository_name: Option<String>,

    /// Endpoint URL the repository advertises for itself
    #[serde(rename = "baseURL")]
    pub base_url: Option<String>,

    /// Protocol version, "2.0" in the wild
    #[serde(rename = "protocolVersion")]
    pub protocol_version: Option<String>,

    /// Administrative contact addresses
    #[serde(rename = "adminEmail")]
    pub admin_email: Vec<String>,

    /// Earliest datestamp of any record in the repository
    #[serde(rename = "earliestDatestamp")]
    pub earliest_datestamp: String,

    /// Deleted-record policy
    #[serde(rename = "deletedRecord")]
    pub deleted_record: Option<String>,

    /// Advertised date granularity for selective harvesting
    #[serde(rename = "granularity")]
    pub granularity: String,
}

/// One decoded response plus the raw body it was decoded from.
#[derive(Debug, Clone)]
pub struct OaiResponse {
    raw: String,
    envelope: Envelope,
}

impl OaiResponse {
    /// Decode a response body, keeping the body for persistence.
    pub fn from_xml(raw: String) -> TransportResult<Self> {
        let envelope: Envelope =
            quick_xml::de::from_str(&raw).map_err(|error| TransportError::Decode(error.to_string()))?;
        Ok(Self { raw, envelope })
    }

    /// The raw response body as received (after optional sanitization).
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The decoded envelope.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Protocol error reported by the server, if any.
    pub fn fault(&self) -> Option<&OaiFault> {
        self.envelope.error.as_ref()
    }

    /// Identify payload, if this was an Identify response.
    pub fn identify(&self) -> Option<&Identify> {
        self.envelope.identify.as_ref()
    }

    /// The resumption token carried by this page. An absent or empty token
    /// element both mean the list is exhausted.
    pub fn resumption_token(&self) -> Option<&str> {
        self.envelope
            .list_records
            .as_ref()?
            .resumption_token
            .as_ref()?
            .value
            .as_deref()
            .filter(|value| !value.is_empty())
    }

    /// Number of records on this page.
    pub fn record_count(&self) -> usize {
        self.envelope
            .list_records
            .as_ref()
            .map(|list| list.records.len())
            .unwrap_or(0)
    }
}

/// Drop characters that are not valid in XML 1.0 documents.
///
/// Some repositories emit control bytes inside record payloads, which makes
/// the whole envelope undecodable. Filtering is opt-in per request.
pub fn clean_xml(input: &str) -> String {
    input.chars().filter(|&c| is_xml_char(c)).collect()
}

fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}
