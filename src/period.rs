//! Report window resolution
//!
//! A report covers `(start, end]`. Users give any sensible combination of
//! `--start`, `--end` and `--period`; [`ReportWindow::resolve`] fills in the
//! rest, defaulting to the week ending now.

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use clap::ValueEnum;
use whostream_core::error::{Result, WhoStreamError};
use whostream_core::timezone::TimezoneConfig;

/// Length of a report period
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportPeriod {
    Day,
    Week,
    /// One calendar month in the report timezone
    Month,
}

impl ReportPeriod {
    /// The instant one period before `end`
    pub fn before(self, end: DateTime<Utc>, tz: &TimezoneConfig) -> Result<DateTime<Utc>> {
        match self {
            Self::Day => Ok(end - TimeDelta::days(1)),
            Self::Week => Ok(end - TimeDelta::weeks(1)),
            Self::Month => end
                .with_timezone(&tz.tz)
                .checked_sub_months(Months::new(1))
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| out_of_range(end)),
        }
    }

    /// The instant one period after `start`
    pub fn after(self, start: DateTime<Utc>, tz: &TimezoneConfig) -> Result<DateTime<Utc>> {
        match self {
            Self::Day => Ok(start + TimeDelta::days(1)),
            Self::Week => Ok(start + TimeDelta::weeks(1)),
            Self::Month => start
                .with_timezone(&tz.tz)
                .checked_add_months(Months::new(1))
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| out_of_range(start)),
        }
    }
}

fn out_of_range(dt: DateTime<Utc>) -> WhoStreamError {
    WhoStreamError::InvalidDateParameters(format!("cannot shift {dt} by one month"))
}

/// The `(start, end]` interval a report covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    /// Resolve the window from whatever the user supplied
    ///
    /// | start | end | period | window                        |
    /// |-------|-----|--------|-------------------------------|
    /// | -     | -   | -      | the week ending `now`         |
    /// | -     | -   | p      | `p` ending `now`              |
    /// | s     | -   | -      | `s` to `now`                  |
    /// | s     | -   | p      | `s` to `s + p`                |
    /// | -     | e   | p      | `e - p` to `e`                |
    /// | s     | e   | -      | `s` to `e`                    |
    /// | -     | e   | -      | missing date parameters       |
    /// | s     | e   | p      | conflicting date parameters   |
    ///
    /// The start must come strictly before the end.
    pub fn resolve(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        period: Option<ReportPeriod>,
        now: DateTime<Utc>,
        tz: &TimezoneConfig,
    ) -> Result<Self> {
        let (start, end) = match (start, end, period) {
            (Some(_), Some(_), Some(_)) => return Err(WhoStreamError::ConflictingDateParameters),
            (None, Some(_), None) => return Err(WhoStreamError::MissingDateParameters),
            (None, None, None) => (ReportPeriod::Week.before(now, tz)?, now),
            (None, None, Some(p)) => (p.before(now, tz)?, now),
            (Some(s), None, None) => (s, now),
            (Some(s), None, Some(p)) => (s, p.after(s, tz)?),
            (None, Some(e), Some(p)) => (p.before(e, tz)?, e),
            (Some(s), Some(e), None) => (s, e),
        };

        if start >= end {
            return Err(WhoStreamError::InvalidDateParameters(format!(
                "the start ({}) must be before the end ({})",
                tz.format(&start, "%Y-%m-%d %H:%M:%S"),
                tz.format(&end, "%Y-%m-%d %H:%M:%S")
            )));
        }
        Ok(Self { start, end })
    }
}

/// Parse a `--start`/`--end` value in the report timezone
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM` and `YYYY-MM-DD HH:MM:SS`
/// (a `T` separator works too), or an RFC 3339 timestamp with its own
/// offset. A bare date means midnight.
pub fn parse_date_input(input: &str, tz: &TimezoneConfig) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return tz.to_utc(naive);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return tz.to_utc(date.and_time(chrono::NaiveTime::MIN));
    }

    Err(WhoStreamError::InvalidDateParameters(format!(
        "'{input}' is not a date. Use YYYY-MM-DD, YYYY-MM-DD HH:MM or YYYY-MM-DD HH:MM:SS"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        utc(2024, 3, 15, 12, 0)
    }

    fn resolve(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        period: Option<ReportPeriod>,
    ) -> Result<ReportWindow> {
        ReportWindow::resolve(start, end, period, now(), &TimezoneConfig::utc())
    }

    #[test]
    fn test_default_is_week_ending_now() {
        let window = resolve(None, None, None).unwrap();
        assert_eq!(window.end, now());
        assert_eq!(window.start, utc(2024, 3, 8, 12, 0));
    }

    #[test]
    fn test_period_only() {
        let window = resolve(None, None, Some(ReportPeriod::Day)).unwrap();
        assert_eq!(window.start, utc(2024, 3, 14, 12, 0));
        assert_eq!(window.end, now());
    }

    #[test]
    fn test_start_plus_period() {
        let window = resolve(Some(utc(2024, 1, 31, 0, 0)), None, Some(ReportPeriod::Month)).unwrap();
        assert_eq!(window.end, utc(2024, 2, 29, 0, 0));
    }

    #[test]
    fn test_end_minus_period() {
        let window = resolve(None, Some(utc(2024, 3, 1, 0, 0)), Some(ReportPeriod::Week)).unwrap();
        assert_eq!(window.start, utc(2024, 2, 23, 0, 0));
    }

    #[test]
    fn test_start_only_runs_to_now() {
        let window = resolve(Some(utc(2024, 3, 10, 0, 0)), None, None).unwrap();
        assert_eq!(window.end, now());

        let future = resolve(Some(utc(2024, 4, 1, 0, 0)), None, None);
        assert!(matches!(future, Err(WhoStreamError::InvalidDateParameters(_))));
    }

    #[test]
    fn test_rejected_combinations() {
        let s = Some(utc(2024, 3, 1, 0, 0));
        let e = Some(utc(2024, 3, 2, 0, 0));

        assert!(matches!(
            resolve(s, e, Some(ReportPeriod::Day)),
            Err(WhoStreamError::ConflictingDateParameters)
        ));
        assert!(matches!(
            resolve(None, e, None),
            Err(WhoStreamError::MissingDateParameters)
        ));
        assert!(matches!(
            resolve(e, s, None),
            Err(WhoStreamError::InvalidDateParameters(_))
        ));
        assert!(matches!(
            resolve(s, s, None),
            Err(WhoStreamError::InvalidDateParameters(_))
        ));
    }

    #[test]
    fn test_month_follows_local_calendar() {
        let tz = TimezoneConfig::from_cli(Some("America/Sao_Paulo"), false).unwrap();
        // 2024-03-01 00:00 in Sao Paulo (UTC-3)
        let end = utc(2024, 3, 1, 3, 0);
        let start = ReportPeriod::Month.before(end, &tz).unwrap();
        assert_eq!(start, utc(2024, 2, 1, 3, 0));
    }

    #[test]
    fn test_parse_date_input_formats() {
        let tz = TimezoneConfig::utc();
        assert_eq!(parse_date_input("2024-03-01", &tz).unwrap(), utc(2024, 3, 1, 0, 0));
        assert_eq!(parse_date_input("2024-03-01 08:15", &tz).unwrap(), utc(2024, 3, 1, 8, 15));
        assert_eq!(
            parse_date_input("2024-03-01 08:15:30", &tz).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 15, 30).unwrap()
        );
        assert_eq!(
            parse_date_input("2024-03-01T08:15:00+02:00", &tz).unwrap(),
            utc(2024, 3, 1, 6, 15)
        );
    }

    #[test]
    fn test_parse_date_input_uses_timezone() {
        let tz = TimezoneConfig::from_cli(Some("Asia/Tokyo"), false).unwrap();
        assert_eq!(parse_date_input("2024-03-01 09:00", &tz).unwrap(), utc(2024, 3, 1, 0, 0));
    }

    #[test]
    fn test_parse_date_input_rejects_garbage() {
        let tz = TimezoneConfig::utc();
        for input in ["yesterday", "2024-13-01", "01/03/2024", ""] {
            assert!(
                matches!(
                    parse_date_input(input, &tz),
                    Err(WhoStreamError::InvalidDateParameters(_))
                ),
                "{input} should be rejected"
            );
        }
    }
}
