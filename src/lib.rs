//! # OAI-PMH Harvester Library
//!
//! An incremental harvester for repositories speaking the OAI-PMH protocol.
//! Raw ListRecords response envelopes are cached on disk, partitioned by
//! time window, so that an interrupted harvest resumes exactly where the
//! previous one stopped.
//!
//! ## Features
//!
//! - **Incremental**: Each run plans only the window the cache does not
//!   cover yet and stops with an "already synced" signal when caught up
//! - **Resumable**: Pages of one time window are promoted to the permanent
//!   cache as an atomic batch; a crash or Ctrl+C never leaves half a batch
//! - **Granularity-aware**: Day- and second-granularity endpoints get
//!   matching `from`/`until` boundaries
//! - **Tolerant of broken servers**: Switches for endpoints that cannot do
//!   selective harvesting, reject `metadataPrefix` next to a resumption
//!   token, misuse `noRecordsMatch` mid-stream, or emit invalid XML bytes
//!
//! ## Quick Start
//!
//! ```no_run
//! use oai_harvest::{CacheLayout, HarvestOptions, Harvester};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = CacheLayout::resolve(None);
//! let options = HarvestOptions::new("http://export.arxiv.org/oai2");
//!
//! // One Identify round-trip, then harvest everything missing on disk.
//! let mut harvester = Harvester::connect(options, &layout).await?;
//! harvester.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several core modules:
//!
//! - [`cache`] - Cache directory layout, filenames, and on-disk state
//! - [`interval`] - Calendar windows and the advertised date granularity
//! - [`transport`] - HTTP client and OAI-PMH envelope decoding
//! - [`harvest`] - Interval planning, pagination, and batch promotion
//! - [`shutdown`] - Interrupt guard serializing promotion against Ctrl+C
//!
//! ## Cache layout
//!
//! Every endpoint identity `(base_url, set, format)` owns one directory
//! below the base directory (`$OAI_HARVEST_DIR` or `~/.oai-harvest`). Each
//! promoted page is a gzip-compressed file named after the right boundary
//! of its window and its page index, `YYYY-MM-DD-NNNNNNNN.xml.gz`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Cache directory layout and enumeration
pub mod cache;

/// CLI command implementations
pub mod cli;

/// Harvesting configuration constants
pub mod config;

/// Incremental harvesting engine
pub mod harvest;

/// Calendar windows for selective harvesting
pub mod interval;

/// Interrupt handling for clean cache shutdown
pub mod shutdown;

/// OAI-PMH transport layer
pub mod transport;

// Re-export commonly used types
pub use cache::CacheLayout;
pub use harvest::{HarvestError, HarvestOptions, Harvester};
pub use interval::{Granularity, Interval};
