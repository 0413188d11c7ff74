//! whostream - Track who is streaming a game and report viewing sessions
//!
//! This library provides functionality to:
//! - Snapshot the live streams of a category into dated CSV files
//! - Reconstruct viewing sessions from those snapshots
//! - Summarize viewership per hour
//! - Render reports as tables or JSON
//!
//! # Examples
//!
//! ```no_run
//! use chrono::Utc;
//! use whostream::aggregation::SessionOrder;
//! use whostream::commands::build_report;
//! use whostream::period::{ReportPeriod, ReportWindow};
//! use whostream_core::timezone::TimezoneConfig;
//! use whostream_core::types::CategoryId;
//! use whostream_store::ObservationStore;
//!
//! # fn main() -> whostream::Result<()> {
//! let tz = TimezoneConfig::default();
//! let window = ReportWindow::resolve(None, None, Some(ReportPeriod::Day), Utc::now(), &tz)?;
//! let store = ObservationStore::new("./data");
//! let report = build_report(&store, &CategoryId::new("509658"), window, SessionOrder::Observations, &tz)?;
//! println!("{} sessions", report.sessions.len());
//! # Ok(())
//! # }
//! ```

pub mod aggregation;
pub mod cli;
pub mod commands;
pub mod period;
pub mod settings;

// Re-export commonly used types
pub use whostream_core::error::{Result, ReturnCode, WhoStreamError};
pub use whostream_core::timezone;
pub use whostream_core::types::{CategoryId, Observation, UserId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
