//! Core domain types for whostream
//!
//! This module contains the fundamental types used throughout the whostream
//! workspace. Identifiers get their own newtypes so a category id can never
//! be passed where a streamer id is expected.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strongly-typed streamer identity
///
/// The upstream API hands these out as numeric strings. They are kept as
/// strings so that nothing is lost if the format ever changes.
///
/// # Examples
/// ```
/// use whostream_core::types::UserId;
///
/// let user = UserId::new("42");
/// assert_eq!(user.as_str(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a new UserId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strongly-typed category (game) identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(String);

impl CategoryId {
    /// Create a new CategoryId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CategoryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One snapshot of a streamer taken during a collection run
///
/// Observations are immutable once built. The only timestamp used for
/// windowing and ordering is [`Observation::captured_at`], derived from
/// the upstream "started at" value plus the elapsed minutes recorded at
/// collection time.
///
/// # Examples
/// ```
/// use whostream_core::types::{Observation, UserId};
/// use chrono::{TimeZone, Utc};
///
/// let started = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
/// let obs = Observation::new(UserId::new("42"), "Streamer", "en", 100, started, 5, "Title");
/// assert_eq!(obs.captured_at(), Utc.with_ymd_and_hms(2024, 3, 1, 8, 5, 0).unwrap());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Streamer identity
    pub user_id: UserId,
    /// Display name at collection time
    pub user_name: String,
    /// Broadcast language code
    pub language: String,
    /// Concurrent viewers at collection time
    pub viewers: u64,
    /// Upstream-reported stream start
    pub started_at: DateTime<Utc>,
    /// Whole minutes between `started_at` and the collection run
    pub running_minutes: i64,
    /// Saved thumbnail, if one was downloaded
    pub thumbnail_file: Option<String>,
    /// Single-line stream title
    pub title: String,
}

impl Observation {
    /// Create an observation without a thumbnail
    pub fn new(
        user_id: UserId,
        user_name: impl Into<String>,
        language: impl Into<String>,
        viewers: u64,
        started_at: DateTime<Utc>,
        running_minutes: i64,
        title: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            language: language.into(),
            viewers,
            started_at,
            running_minutes,
            thumbnail_file: None,
            title: normalize_title(&title.into()),
        }
    }

    /// Attach a thumbnail path
    pub fn with_thumbnail(mut self, path: impl Into<String>) -> Self {
        self.thumbnail_file = Some(path.into());
        self
    }

    /// Moment the observation describes
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.started_at + Duration::minutes(self.running_minutes)
    }
}

/// Collapse a title onto a single line
///
/// Each carriage return and line feed becomes a `-`, so a title keeps its
/// length and a CRLF turns into `--`.
pub fn normalize_title(title: &str) -> String {
    title.replace(['\n', '\r'], "-")
}
