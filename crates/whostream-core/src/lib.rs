//! Core types, traits, and utilities for whostream
//!
//! This crate provides the foundational types, error handling, the
//! retry policy and timezone configuration used by all other whostream
//! crates.

pub mod aggregation_types;
pub mod error;
pub mod retry;
pub mod timezone;
pub mod types;

// Re-export commonly used types
pub use aggregation_types::{HourlyBucket, Session};
pub use error::{Result, ReturnCode, WhoStreamError};
pub use retry::{Backoff, ExponentialBackoff, RetryPolicy};
pub use timezone::TimezoneConfig;
pub use types::{CategoryId, Observation, UserId};
