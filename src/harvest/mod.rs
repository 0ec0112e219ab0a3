//! Incremental harvesting engine
//!
//! A [`Harvester`] binds one endpoint identity `(base_url, set, format)` to
//! its cache directory and repeats until caught up: plan the window still
//! missing on disk, split it into month- or day-sized sub-windows, walk each
//! sub-window's ListRecords pagination writing every raw envelope to a
//! temporary file, then atomically promote the batch. Interrupting a run
//! loses at most the batch in flight; everything promoted before stays
//! valid and the next run continues after it.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{self, CacheLayout};
use crate::config;
use crate::interval::{Granularity, Interval};
use crate::shutdown::{self, InterruptGuard};
use crate::transport::{
    Identify, OaiClient, OaiResponse, OaiTransport, Request, TransportError, Verb,
};

mod finalize;
mod planner;

/// Harvesting errors (and the completion signals that travel with them)
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Completion signal: the cache already covers the plannable window
    #[error("already synced")]
    AlreadySynced,

    /// The endpoint advertises an unusable granularity or earliest datestamp
    #[error("invalid earliest date")]
    InvalidEarliestDate,

    /// The caller-supplied from date is not a calendar day
    #[error("invalid from date: {0}")]
    InvalidFromDate(String),

    /// Wrapped network or HTTP failure
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// OAI-PMH error envelope that is not handled locally
    #[error("OAI error {code}: {message}")]
    Protocol {
        /// Machine-readable protocol error code
        code: String,
        /// Server-supplied message
        message: String,
    },

    /// A page could not be promoted; the batch was rolled back
    #[error("promoting {} failed: {source}", .path.display())]
    Promotion {
        /// The temporary file that failed to promote
        path: PathBuf,
        /// Underlying filesystem error
        source: std::io::Error,
    },

    /// Rollback of a failed batch also failed; the cache is inconsistent
    #[error("{primary}; rollback failed ({cleanup}); purge {} and start over", .dir.display())]
    PurgeRequired {
        /// Cache directory that needs to be purged
        dir: PathBuf,
        /// The promotion failure that triggered the rollback
        primary: Box<HarvestError>,
        /// The error that interrupted the rollback
        cleanup: std::io::Error,
    },

    /// Filesystem failure outside promotion
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A primary failure and a temp-file cleanup failure together
    #[error("{primary}; temporary file cleanup also failed: {cleanup}")]
    Composite {
        /// The error that ended the run
        primary: Box<HarvestError>,
        /// The sweep error observed afterwards
        cleanup: std::io::Error,
    },
}

/// Parameters for one endpoint harvest.
///
/// The switches mirror the quirks found in the wild: endpoints that cannot
/// do selective harvesting at all, endpoints that reject `metadataPrefix`
/// next to a resumption token, and endpoints that emit bytes no XML parser
/// accepts.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Repository endpoint URL
    pub base_url: String,
    /// Metadata format to request
    pub format: String,
    /// Restrict harvesting to this set
    pub set: Option<String>,
    /// Start date (YYYY-MM-DD) overriding the endpoint's earliest datestamp
    pub from: Option<String>,
    /// Cap on wire requests per sub-window, 0 disables the cap
    pub max_requests: u32,
    /// Stop a sub-window after this many consecutive empty pages despite
    /// resumption tokens, 0 disables the cap
    pub max_empty_responses: u32,
    /// Harvest without from/until for endpoints that reject them
    pub disable_selective_harvesting: bool,
    /// Strip bytes invalid in XML 1.0 before decoding responses
    pub clean_before_decode: bool,
    /// Stop a sub-window early instead of failing on transport errors
    pub ignore_http_errors: bool,
    /// Omit the metadataPrefix parameter on every request
    pub suppress_format_parameter: bool,
    /// Use day-sized sub-windows instead of calendar months
    pub daily_interval: bool,
}

impl HarvestOptions {
    /// Options with the defaults the CLI ships: `oai_dc`, monthly windows,
    /// no quirk switches.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            format: "oai_dc".to_string(),
            set: None,
            from: None,
            max_requests: config::DEFAULT_MAX_REQUESTS,
            max_empty_responses: config::DEFAULT_MAX_EMPTY_RESPONSES,
            disable_selective_harvesting: false,
            clean_before_decode: false,
            ignore_http_errors: false,
            suppress_format_parameter: false,
            daily_interval: false,
        }
    }
}

/// Incremental harvester for one endpoint identity.
pub struct Harvester {
    options: HarvestOptions,
    identify: Identify,
    dir: PathBuf,
    transport: Box<dyn OaiTransport>,
    guard: Arc<InterruptGuard>,
}

impl Harvester {
    /// Probe the endpoint with Identify and build a harvester for it.
    ///
    /// The probe uses a short-fused client and fails fast when the endpoint
    /// is unreachable or answers with a protocol error; it has no side
    /// effects on the cache.
    pub async fn connect(
        options: HarvestOptions,
        layout: &CacheLayout,
    ) -> Result<Self, HarvestError> {
        let probe = OaiClient::for_identify()?;
        let response = probe.execute(&Request::identify(&options.base_url)).await?;
        if let Some(fault) = response.fault() {
            return Err(HarvestError::Protocol {
                code: fault.code.clone(),
                message: fault.message.clone().unwrap_or_default(),
            });
        }
        let identify = response.identify().cloned().unwrap_or_default();
        info!(
            repository = identify.repository_name.as_deref().unwrap_or("unknown"),
            granularity = %identify.granularity,
            earliest = %identify.earliest_datestamp,
            "identified endpoint"
        );

        let transport = OaiClient::for_harvesting()?;
        Ok(Self::with_transport(
            options,
            identify,
            Box::new(transport),
            layout,
        ))
    }

    /// Build a harvester around an existing Identify record and transport.
    ///
    /// This is the seam for custom transports and for tests that script the
    /// repository side of the conversation.
    pub fn with_transport(
        options: HarvestOptions,
        identify: Identify,
        transport: Box<dyn OaiTransport>,
        layout: &CacheLayout,
    ) -> Self {
        let dir = layout.endpoint_dir(&options.base_url, options.set.as_deref(), &options.format);
        Self {
            options,
            identify,
            dir,
            transport,
            guard: Arc::new(InterruptGuard::new()),
        }
    }

    /// The Identify record retained from the probe.
    pub fn identify(&self) -> &Identify {
        &self.identify
    }

    /// The cache directory this harvester writes to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The guard serializing this harvester's batch promotion against
    /// signal-driven shutdown.
    pub fn interrupt_guard(&self) -> Arc<InterruptGuard> {
        self.guard.clone()
    }

    /// Harvest everything between the cached state and yesterday.
    pub async fn run(&mut self) -> Result<(), HarvestError> {
        self.run_at(Utc::now()).await
    }

    /// Harvest as if the run had begun at the given instant.
    ///
    /// Planning depends on the start of the run (the final calendar day is
    /// never harvested); taking it as a parameter keeps runs replayable.
    pub async fn run_at(&mut self, started: DateTime<Utc>) -> Result<(), HarvestError> {
        cache::ensure_dir(&self.dir)?;
        shutdown::install_interrupt_guard(self.guard.clone(), self.dir.clone());

        let outcome = self.run_all(started).await;

        // whatever happened, leave no temporary files behind
        match cache::sweep_temporary_files(&self.dir) {
            Ok(removed) => {
                if removed > 0 {
                    debug!(removed, "swept leftover temporary files");
                }
                outcome
            }
            Err(cleanup) => match outcome {
                Ok(()) => Err(HarvestError::Io(cleanup)),
                Err(primary) => Err(HarvestError::Composite {
                    primary: Box::new(primary),
                    cleanup,
                }),
            },
        }
    }

    async fn run_all(&self, started: DateTime<Utc>) -> Result<(), HarvestError> {
        if self.options.disable_selective_harvesting {
            return self.run_window(None, started).await;
        }

        let granularity = Granularity::from_advertised(&self.identify.granularity)
            .ok_or(HarvestError::InvalidEarliestDate)?;
        let window = planner::plan_window(
            &self.dir,
            self.options.from.as_deref(),
            &self.identify,
            started.date_naive(),
        )?;
        info!(begin = %window.begin, end = %window.end, "planned harvesting window");

        let sub_windows = if self.options.daily_interval {
            window.daily()
        } else {
            window.monthly()
        };
        for sub_window in &sub_windows {
            self.run_window(Some((sub_window, granularity)), started)
                .await?;
        }
        Ok(())
    }

    /// Walk one sub-window's ListRecords pagination and promote the batch.
    ///
    /// Every page of the batch is stamped with the window's `until` date so
    /// promotion can find its files; the page index counts wire requests,
    /// including the retry after a server-side InternalException.
    async fn run_window(
        &self,
        window: Option<(&Interval, Granularity)>,
        started: DateTime<Utc>,
    ) -> Result<(), HarvestError> {
        let suffix = cache::batch_suffix();
        let mut token: Option<String> = None;
        let mut page: u32 = 0;
        let mut empty_streak: u32 = 0;

        loop {
            if self.options.max_requests > 0 && page == self.options.max_requests {
                info!(limit = self.options.max_requests, "request limit reached");
                break;
            }

            let mut request = Request {
                base_url: self.options.base_url.clone(),
                verb: Verb::ListRecords,
                metadata_prefix: Some(self.options.format.clone()),
                set: self.options.set.clone(),
                from: None,
                until: None,
                resumption_token: token.clone(),
                clean_before_decode: self.options.clean_before_decode,
                suppress_format_parameter: self.options.suppress_format_parameter,
            };
            let file_date = match window {
                Some((interval, granularity)) => {
                    request.from = Some(granularity.format_from(interval.begin));
                    request.until = Some(granularity.format_until(interval.end));
                    interval.end
                }
                // no time filter, stamp the whole batch with the run date
                None => started.date_naive(),
            };

            let response = match self.transport.execute(&request).await {
                Ok(response) => response,
                Err(error) => {
                    if self.options.ignore_http_errors {
                        warn!(%error, "stopping early due to failed request");
                        break;
                    }
                    return Err(error.into());
                }
            };

            if let Some(stop) = self.handle_fault(&response, &mut page).await? {
                match stop {
                    FaultAction::StopWindow => break,
                    FaultAction::RetrySameToken => continue,
                }
            }

            let path = self.dir.join(cache::temp_filename(file_date, page, &suffix));
            fs::write(&path, response.raw())?;
            debug!(path = %path.display(), records = response.record_count(), "wrote page");

            token = response.resumption_token().map(str::to_owned);
            if token.is_none() {
                break;
            }

            if response.record_count() > 0 {
                empty_streak = 0;
            } else {
                empty_streak += 1;
                warn!(
                    streak = empty_streak,
                    limit = self.options.max_empty_responses,
                    "successive empty response despite resumption token"
                );
                if self.options.max_empty_responses > 0
                    && empty_streak == self.options.max_empty_responses
                {
                    warn!("maximum number of empty responses reached");
                    break;
                }
            }

            page += 1;
        }

        self.finalize(&suffix).await
    }

    /// Handle a protocol error on a page, if there is one.
    ///
    /// Two codes are recovered locally: `noRecordsMatch` without a token
    /// ends the window (and with a token is a known server quirk worth only
    /// a log line), and `InternalException` is retried with the same token
    /// after a fixed back-off. Everything else propagates.
    async fn handle_fault(
        &self,
        response: &OaiResponse,
        page: &mut u32,
    ) -> Result<Option<FaultAction>, HarvestError> {
        let Some(fault) = response.fault() else {
            return Ok(None);
        };
        match fault.code.as_str() {
            "noRecordsMatch" => {
                if response.resumption_token().is_none() {
                    debug!("no records match, nothing more to fetch");
                    return Ok(Some(FaultAction::StopWindow));
                }
                warn!("noRecordsMatch with a resumption token set, continuing");
                Ok(None)
            }
            "InternalException" => {
                warn!(
                    backoff_secs = config::INTERNAL_EXCEPTION_BACKOFF.as_secs(),
                    "server reported InternalException, retrying"
                );
                tokio::time::sleep(config::INTERNAL_EXCEPTION_BACKOFF).await;
                // the failed attempt still counts towards the request limit
                *page += 1;
                Ok(Some(FaultAction::RetrySameToken))
            }
            _ => Err(HarvestError::Protocol {
                code: fault.code.clone(),
                message: fault.message.clone().unwrap_or_default(),
            }),
        }
    }

    /// Promote the current batch under the interrupt guard's mutex, so a
    /// signal arriving mid-promotion waits for a consistent state.
    async fn finalize(&self, suffix: &str) -> Result<(), HarvestError> {
        let _promotions = self.guard.lock_promotions().await;
        let promoted = finalize::promote_batch(&self.dir, suffix)?;
        if !promoted.is_empty() {
            info!(count = promoted.len(), "moved files into place");
        }
        Ok(())
    }
}

/// What the pagination loop does after a locally handled protocol error.
enum FaultAction {
    StopWindow,
    RetrySameToken,
}
