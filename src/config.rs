//! Harvesting configuration constants

use std::time::Duration;

/// Timeout for the one-shot Identify probe
pub const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of retries for the Identify probe
pub const IDENTIFY_MAX_RETRIES: u32 = 2;

/// Timeout for ListRecords requests
pub const HARVEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Maximum number of retries for ListRecords requests
pub const HARVEST_MAX_RETRIES: u32 = 5;

/// Fixed back-off after a server-side InternalException
pub const INTERNAL_EXCEPTION_BACKOFF: Duration = Duration::from_secs(30);

/// Delay before the first retry of a failed request
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

/// Default cap on requests per harvesting window (0 disables the cap)
pub const DEFAULT_MAX_REQUESTS: u32 = 1_048_576;

/// Default cap on consecutive empty pages despite resumption tokens
pub const DEFAULT_MAX_EMPTY_RESPONSES: u32 = 10;

/// Delay before retrying a failed request.
///
/// Doubles per attempt and tops out at the same 30 s the protocol's
/// documented transient error is given to recover, so transport retries
/// never wait longer than an InternalException does.
pub fn retry_backoff(attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    RETRY_BASE_DELAY
        .saturating_mul(factor)
        .min(INTERNAL_EXCEPTION_BACKOFF)
}
