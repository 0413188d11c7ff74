//! Output formatting module for whostream
//!
//! This module provides formatters for displaying catalog listings and
//! session reports in different formats:
//! - Table format for human-readable terminal output
//! - JSON format for machine-readable output and integration with other tools
//!
//! # Examples
//!
//! ```
//! use whostream_catalog::Category;
//! use whostream_core::types::CategoryId;
//! use whostream_terminal::get_formatter;
//!
//! let categories = vec![Category {
//!     id: CategoryId::new("509658"),
//!     name: "Just Chatting".to_string(),
//! }];
//!
//! let table = get_formatter(false).format_categories(&categories);
//! assert!(table.contains("Just Chatting"));
//!
//! let json = get_formatter(true).format_categories(&categories);
//! assert!(json.contains("\"categories\""));
//! ```

use chrono::{DateTime, Duration, Utc};
use prettytable::{Cell, Row, Table, format, row};
use serde_json::{Value, json};
use whostream_catalog::{Category, LiveStream};
use whostream_core::aggregation_types::{HourlyBucket, Session, Totals};
use whostream_core::timezone::TimezoneConfig;
use whostream_core::types::CategoryId;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";
const MAX_TITLE_CHARS: usize = 60;

/// Everything a report prints
#[derive(Debug, Clone, Copy)]
pub struct ReportView<'a> {
    pub category_id: &'a CategoryId,
    pub category_name: &'a str,
    /// Window start (exclusive)
    pub start: DateTime<Utc>,
    /// Window end (inclusive)
    pub end: DateTime<Utc>,
    pub sessions: &'a [Session],
    pub totals: Totals,
    pub hourly: &'a [HourlyBucket],
}

/// Trait for output formatters
///
/// Implementations turn command results into the text written to stdout.
pub trait OutputFormatter {
    /// Format category search results
    fn format_categories(&self, data: &[Category]) -> String;

    /// Format the streams captured by a collection run
    fn format_streams(&self, category: &Category, data: &[LiveStream], tz: &TimezoneConfig)
    -> String;

    /// Format a session report with its hourly breakdown
    fn format_report(&self, report: &ReportView<'_>, tz: &TimezoneConfig) -> String;
}

/// Table formatter for human-readable output
///
/// Numbers are formatted with thousands separators and times are shown in
/// the configured timezone.
pub struct TableFormatter;

impl TableFormatter {
    /// Format a number with thousands separators
    fn format_number(n: u64) -> String {
        let s = n.to_string();
        let mut result = String::new();

        for (count, ch) in s.chars().rev().enumerate() {
            if count > 0 && count % 3 == 0 {
                result.push(',');
            }
            result.push(ch);
        }

        result.chars().rev().collect()
    }

    fn format_duration(duration: Duration) -> String {
        let minutes = duration.num_minutes().max(0);
        format!("{}h {}m", minutes / 60, minutes % 60)
    }

    fn truncate_title(title: &str) -> String {
        if title.chars().count() <= MAX_TITLE_CHARS {
            title.to_string()
        } else {
            let mut short: String = title.chars().take(MAX_TITLE_CHARS - 1).collect();
            short.push('…');
            short
        }
    }

    fn format_sessions_table(sessions: &[Session], totals: &Totals, tz: &TimezoneConfig) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

        table.set_titles(row![
            b -> "Streamer",
            b -> "Lang",
            b -> "Start",
            b -> "Duration",
            b -> "Obs",
            b -> "Max Viewers",
            b -> "Avg Viewers",
            b -> "Viewer-min",
            b -> "Title"
        ]);

        for session in sessions {
            table.add_row(row![
                session.user_name,
                session.language,
                tz.format(&session.start, DATETIME_FORMAT),
                Self::format_duration(session.duration()),
                r -> Self::format_number(session.observations),
                r -> Self::format_number(session.max_viewers),
                r -> Self::format_number(session.average_viewers()),
                r -> Self::format_number(session.viewer_minutes()),
                Self::truncate_title(session.title())
            ]);
        }

        table.add_row(Row::new(vec![Cell::new(""); 9]));
        table.add_row(row![
            b -> format!("TOTAL ({} sessions)", totals.sessions),
            "",
            "",
            b -> Self::format_duration(Duration::minutes(totals.streamed_minutes)),
            b -> Self::format_number(totals.observations),
            "",
            "",
            "",
            ""
        ]);

        table.to_string()
    }

    fn format_hourly_table(hourly: &[HourlyBucket], tz: &TimezoneConfig) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![b -> "Hour", b -> "Streamers", b -> "Viewers"]);

        for bucket in hourly {
            table.add_row(row![
                tz.format(&bucket.hour, DATETIME_FORMAT),
                r -> Self::format_number(bucket.streamer_count as u64),
                r -> Self::format_number(bucket.summed_average_viewership.round() as u64)
            ]);
        }

        table.to_string()
    }
}

impl OutputFormatter for TableFormatter {
    fn format_categories(&self, data: &[Category]) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![b -> "Id", b -> "Name"]);

        for category in data {
            table.add_row(row![category.id.as_str(), category.name]);
        }

        table.to_string()
    }

    fn format_streams(
        &self,
        category: &Category,
        data: &[LiveStream],
        tz: &TimezoneConfig,
    ) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![
            b -> "Streamer",
            b -> "Viewers",
            b -> "Lang",
            b -> "Started",
            b -> "Title"
        ]);

        for stream in data {
            table.add_row(row![
                stream.user_name,
                r -> Self::format_number(stream.viewer_count),
                stream.language,
                tz.format(&stream.started_at, DATETIME_FORMAT),
                Self::truncate_title(&stream.normalized_title())
            ]);
        }

        let viewers: u64 = data.iter().map(|s| s.viewer_count).sum();
        format!(
            "{} ({}): {} streams, {} viewers\n{}",
            category.name,
            category.id,
            data.len(),
            Self::format_number(viewers),
            table
        )
    }

    fn format_report(&self, report: &ReportView<'_>, tz: &TimezoneConfig) -> String {
        format!(
            "{} ({}) from {} to {} ({})\n\n{}\n{}",
            report.category_name,
            report.category_id,
            tz.format(&report.start, DATETIME_FORMAT),
            tz.format(&report.end, DATETIME_FORMAT),
            tz.display_name(),
            Self::format_sessions_table(report.sessions, &report.totals, tz),
            Self::format_hourly_table(report.hourly, tz)
        )
    }
}

/// JSON formatter for machine-readable output
///
/// Timestamps are always RFC 3339 in UTC regardless of the timezone flag.
pub struct JsonFormatter;

impl JsonFormatter {
    fn pretty(value: &Value) -> String {
        serde_json::to_string_pretty(value).unwrap_or_default()
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_categories(&self, data: &[Category]) -> String {
        Self::pretty(&json!({
            "categories": data.iter().map(|c| json!({
                "id": c.id.as_str(),
                "name": c.name,
            })).collect::<Vec<_>>(),
        }))
    }

    fn format_streams(
        &self,
        category: &Category,
        data: &[LiveStream],
        _tz: &TimezoneConfig,
    ) -> String {
        Self::pretty(&json!({
            "category": {
                "id": category.id.as_str(),
                "name": category.name,
            },
            "streams": data.iter().map(|s| json!({
                "user_id": s.user_id.as_str(),
                "user_name": s.user_name,
                "viewers": s.viewer_count,
                "language": s.language,
                "started_at": s.started_at.to_rfc3339(),
                "title": s.normalized_title(),
            })).collect::<Vec<_>>(),
        }))
    }

    fn format_report(&self, report: &ReportView<'_>, _tz: &TimezoneConfig) -> String {
        Self::pretty(&json!({
            "category": {
                "id": report.category_id.as_str(),
                "name": report.category_name,
            },
            "window": {
                "start": report.start.to_rfc3339(),
                "end": report.end.to_rfc3339(),
            },
            "sessions": report.sessions.iter().map(|s| json!({
                "user_id": s.user_id.as_str(),
                "user_name": s.user_name,
                "language": s.language,
                "start": s.start.to_rfc3339(),
                "end": s.end.to_rfc3339(),
                "duration_minutes": s.duration().num_minutes(),
                "observations": s.observations,
                "max_viewers": s.max_viewers,
                "average_viewers": s.average_viewers(),
                "viewer_minutes": s.viewer_minutes(),
                "title": s.title(),
            })).collect::<Vec<_>>(),
            "hourly": report.hourly.iter().map(|h| json!({
                "hour": h.hour.to_rfc3339(),
                "streamers": h.streamer_count,
                "summed_average_viewership": h.summed_average_viewership,
            })).collect::<Vec<_>>(),
            "totals": {
                "sessions": report.totals.sessions,
                "observations": report.totals.observations,
                "streamed_minutes": report.totals.streamed_minutes,
            },
        }))
    }
}

/// Get the formatter for the `--json` flag
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(TableFormatter)
    }
}
