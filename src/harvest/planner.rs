//! Interval planning from on-disk state
//!
//! The outer harvesting window starts where the cache stops and ends the
//! day before the run started, so a partially published day at the server
//! is never cached. Planning is a pure function of the cache directory, the
//! caller's `from` override, the Identify record, and the start-of-run
//! date, which keeps it deterministic and replayable.

use chrono::NaiveDate;
use std::path::Path;
use tracing::debug;

use super::HarvestError;
use crate::cache;
use crate::interval::{Granularity, Interval};
use crate::transport::Identify;

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Derive the earliest harvestable date from an Identify record.
///
/// Repositories are sloppy about this field: day-granularity endpoints may
/// append a time, and second-granularity endpoints may truncate it. A stamp
/// longer than a day is cut to its day prefix for day granularity; for
/// second granularity a stamp shorter than a full timestamp is parsed as a
/// day, everything else must be a Zulu timestamp.
pub(crate) fn earliest_date(identify: &Identify) -> Result<NaiveDate, HarvestError> {
    let stamp = identify.earliest_datestamp.as_str();
    match Granularity::from_advertised(&identify.granularity) {
        Some(Granularity::Day) => {
            let day = if stamp.len() <= 10 {
                stamp
            } else {
                stamp.get(..10).ok_or(HarvestError::InvalidEarliestDate)?
            };
            NaiveDate::parse_from_str(day, DAY_FORMAT)
                .map_err(|_| HarvestError::InvalidEarliestDate)
        }
        Some(Granularity::Second) => {
            if stamp.len() >= 10 && stamp.len() < 20 {
                let day = stamp.get(..10).ok_or(HarvestError::InvalidEarliestDate)?;
                return NaiveDate::parse_from_str(day, DAY_FORMAT)
                    .map_err(|_| HarvestError::InvalidEarliestDate);
            }
            chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M:%SZ")
                .map(|datetime| datetime.date())
                .map_err(|_| HarvestError::InvalidEarliestDate)
        }
        None => Err(HarvestError::InvalidEarliestDate),
    }
}

/// Plan the outer window still missing from the cache.
///
/// Returns [`HarvestError::AlreadySynced`] when the cache already covers
/// everything up to the day before `started`.
pub(crate) fn plan_window(
    dir: &Path,
    from: Option<&str>,
    identify: &Identify,
    started: NaiveDate,
) -> Result<Interval, HarvestError> {
    let default_start = match from {
        Some(value) => NaiveDate::parse_from_str(value, DAY_FORMAT)
            .map_err(|_| HarvestError::InvalidFromDate(value.to_string()))?,
        None => earliest_date(identify)?,
    };

    let last_known = cache::last_cached_date(dir).unwrap_or(default_start);
    debug!(%default_start, %last_known, "planning from cached state");

    let begin = if last_known != default_start {
        // a previous run covered last_known completely, continue after it
        last_known
            .succ_opt()
            .ok_or(HarvestError::InvalidEarliestDate)?
    } else {
        default_start
    };

    // the current day is never harvested, it may still grow at the server
    let end = started
        .pred_opt()
        .ok_or(HarvestError::InvalidEarliestDate)?;

    if last_known == end {
        return Err(HarvestError::AlreadySynced);
    }

    Ok(Interval::new(begin, end))
}
