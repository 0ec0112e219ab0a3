//! Protocol request construction

/// OAI-PMH verbs used by the harvester
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// One-shot repository metadata probe
    Identify,
    /// Paginated record listing
    ListRecords,
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verb::Identify => "Identify",
            Verb::ListRecords => "ListRecords",
        };
        write!(f, "{s}")
    }
}

/// One protocol request against a repository endpoint.
///
/// `resumption_token` is an opaque server-issued cursor and is echoed
/// verbatim; it is never trimmed, decoded, or otherwise interpreted.
#[derive(Debug, Clone)]
pub struct Request {
    /// Repository endpoint URL
    pub base_url: String,
    /// Protocol verb
    pub verb: Verb,
    /// Metadata format to request
    pub metadata_prefix: Option<String>,
    /// Set restriction, if any
    pub set: Option<String>,
    /// Left window boundary, already rendered in the server's granularity
    pub from: Option<String>,
    /// Right window boundary, already rendered in the server's granularity
    pub until: Option<String>,
    /// Pagination cursor from the previous page
    pub resumption_token: Option<String>,
    /// Strip bytes that are invalid in XML 1.0 before decoding
    pub clean_before_decode: bool,
    /// Omit metadataPrefix for servers that reject it next to a token
    pub suppress_format_parameter: bool,
}

impl Request {
    /// Build an Identify probe for an endpoint.
    pub fn identify(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            verb: Verb::Identify,
            metadata_prefix: None,
            set: None,
            from: None,
            until: None,
            resumption_token: None,
            clean_before_decode: false,
            suppress_format_parameter: false,
        }
    }

    /// Render the query parameters for this request.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("verb", self.verb.to_string())];
        if !self.suppress_format_parameter {
            if let Some(prefix) = &self.metadata_prefix {
                params.push(("metadataPrefix", prefix.clone()));
            }
        }
        if let Some(set) = &self.set {
            params.push(("set", set.clone()));
        }
        if let Some(from) = &self.from {
            params.push(("from", from.clone()));
        }
        if let Some(until) = &self.until {
            params.push(("until", until.clone()));
        }
        if let Some(token) = &self.resumption_token {
            params.push(("resumptionToken", token.clone()));
        }
        params
    }
}
