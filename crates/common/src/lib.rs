pub mod config;
pub mod db;
pub mod earnings_api;
pub mod observability;
pub mod queries;
pub mod types;

use std::time::Duration;

/// Both loops run on this fixed cadence. No jitter, no catch-up.
pub const POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Daily earnings the histogram measures each bucket against.
pub const DAILY_TARGET: f64 = 1.3;
