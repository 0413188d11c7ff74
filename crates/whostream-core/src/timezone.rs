//! Timezone handling for report input and display
//!
//! Snapshot files store UTC. People type report windows in their own
//! timezone and want to read session times the same way, so the CLI
//! carries a [`TimezoneConfig`] that converts in both directions.

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Result, WhoStreamError};

/// Configuration for timezone handling
#[derive(Debug, Clone)]
pub struct TimezoneConfig {
    /// The timezone used for input and display
    pub tz: Tz,
    /// Whether the timezone is UTC
    pub is_utc: bool,
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self::from_tz(get_local_timezone())
    }
}

impl TimezoneConfig {
    fn from_tz(tz: Tz) -> Self {
        Self {
            is_utc: tz == Tz::UTC,
            tz,
        }
    }

    /// UTC everywhere
    pub fn utc() -> Self {
        Self::from_tz(Tz::UTC)
    }

    /// Build from the `--timezone` / `--utc` flags
    pub fn from_cli(timezone_str: Option<&str>, use_utc: bool) -> Result<Self> {
        if use_utc {
            return Ok(Self::utc());
        }

        match timezone_str {
            Some(tz_str) => {
                let tz = Tz::from_str(tz_str).map_err(|_| {
                    WhoStreamError::InvalidArgument(format!(
                        "invalid timezone '{tz_str}'. Use a name like 'America/Sao_Paulo' or 'UTC'"
                    ))
                })?;
                Ok(Self::from_tz(tz))
            }
            None => Ok(Self::default()),
        }
    }

    /// Get the display name for the configured timezone
    pub fn display_name(&self) -> &str {
        if self.is_utc { "UTC" } else { self.tz.name() }
    }

    /// Interpret a wall-clock time in this timezone
    ///
    /// Ambiguous times (clocks going back) resolve to the earlier instant.
    /// Times skipped by a DST jump are rejected.
    pub fn to_utc(&self, naive: NaiveDateTime) -> Result<DateTime<Utc>> {
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
            LocalResult::None => Err(WhoStreamError::InvalidDateParameters(format!(
                "{naive} does not exist in {}",
                self.display_name()
            ))),
        }
    }

    /// Format a UTC instant in this timezone
    pub fn format(&self, dt: &DateTime<Utc>, fmt: &str) -> String {
        dt.with_timezone(&self.tz).format(fmt).to_string()
    }
}

/// Detect the system's local timezone
///
/// `TZ` wins when it names a valid zone; otherwise `iana-time-zone` asks the
/// platform. Anything unrecognised falls back to UTC.
pub fn get_local_timezone() -> Tz {
    if let Ok(tz_str) = std::env::var("TZ")
        && let Ok(tz) = Tz::from_str(&tz_str)
    {
        debug!("Using timezone from TZ environment variable: {}", tz_str);
        return tz;
    }

    match iana_time_zone::get_timezone() {
        Ok(tz_str) => Tz::from_str(&tz_str).unwrap_or_else(|_| {
            debug!("Unrecognised system timezone '{}', falling back to UTC", tz_str);
            Tz::UTC
        }),
        Err(e) => {
            debug!("Could not detect local timezone: {:?}, falling back to UTC", e);
            Tz::UTC
        }
    }
}
