//! sitewatch: watches web pages for configured text patterns and pushes a
//! notification the first time each (page, pattern) combination appears.
//!
//! Key components:
//! - `config`: environment-sourced configuration with startup validation
//! - `content`: normalization, content collection, matching, detail extraction
//! - `ledger`: the concurrency-safe record of discovery/notification state
//! - `fetch`: HTTP page fetching with retry and backoff
//! - `notify`: Pushover dispatch and message formatting
//! - `checker`: the bounded-concurrency per-cycle coordinator
//! - `monitor`: the interval loop and mission-complete handling

pub mod checker;
pub mod config;
pub mod content;
pub mod fetch;
pub mod ledger;
pub mod monitor;
pub mod notify;
pub mod types;
pub mod util;

pub use config::Config;
pub use ledger::DiscoveryLedger;
pub use monitor::Monitor;
