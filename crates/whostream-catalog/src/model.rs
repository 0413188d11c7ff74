//! Wire models for the catalog API
//!
//! Only the fields whostream uses are declared; everything else in the
//! upstream payloads is ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use whostream_core::types::{CategoryId, Observation, UserId, normalize_title};

/// A game or category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// A stream that is live right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStream {
    pub id: String,
    pub user_id: UserId,
    pub user_name: String,
    #[serde(default)]
    pub game_id: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub language: String,
    /// Template with `{width}` and `{height}` placeholders
    #[serde(default)]
    pub thumbnail_url: String,
    pub viewer_count: u64,
    pub started_at: DateTime<Utc>,
}

impl LiveStream {
    /// Title collapsed onto one line
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }

    /// Snapshot this stream as seen at `run_at`
    pub fn to_observation(&self, run_at: DateTime<Utc>) -> Observation {
        let running_minutes = (run_at - self.started_at).num_minutes().max(0);
        Observation::new(
            self.user_id.clone(),
            self.user_name.clone(),
            self.language.clone(),
            self.viewer_count,
            self.started_at,
            running_minutes,
            self.title.clone(),
        )
    }
}

/// Continuation marker of a paginated response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub cursor: Option<String>,
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Option::default")]
    pub data: Option<Vec<T>>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, cursor: Option<&str>) -> Self {
        Self {
            data: Some(data),
            pagination: Some(Pagination {
                cursor: cursor.map(str::to_owned),
            }),
        }
    }

    /// Cursor for the next page; blank cursors mean there is none
    pub fn next_cursor(&self) -> Option<&str> {
        self.pagination
            .as_ref()
            .and_then(|p| p.cursor.as_deref())
            .filter(|c| !c.trim().is_empty())
    }

    pub fn into_data(self) -> Vec<T> {
        self.data.unwrap_or_default()
    }
}

/// OAuth2 client-credentials token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const STREAMS_PAGE: &str = r#"{
        "data": [{
            "id": "40952121085",
            "user_id": "101051819",
            "user_login": "afro",
            "user_name": "Afro",
            "game_id": "509658",
            "game_name": "Just Chatting",
            "type": "live",
            "title": "first line\nsecond line",
            "viewer_count": 1490,
            "started_at": "2024-03-01T08:00:00Z",
            "language": "en",
            "thumbnail_url": "https://static-cdn.example/previews-ttv/live_user_afro-{width}x{height}.jpg",
            "tags": ["English"],
            "is_mature": false
        }],
        "pagination": {"cursor": "eyJiIjp7IkN1cnNvciI6ImV5SnpJam8zT0RNMk5TNDBORFF4TlRjMU1UY3hOU3dpWkNJNlptRnNjMlVzSW5RaU9uUnlkV1Y5In19"}
    }"#;

    #[test]
    fn test_parse_streams_page() {
        let page: Page<LiveStream> = serde_json::from_str(STREAMS_PAGE).unwrap();
        assert!(page.next_cursor().is_some());

        let streams = page.into_data();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].user_id.as_str(), "101051819");
        assert_eq!(streams[0].viewer_count, 1490);
        assert_eq!(streams[0].normalized_title(), "first line-second line");
    }

    #[test]
    fn test_blank_or_missing_cursor_ends_pagination() {
        let page: Page<Category> = serde_json::from_str(r#"{"data": [], "pagination": {}}"#).unwrap();
        assert_eq!(page.next_cursor(), None);

        let page: Page<Category> =
            serde_json::from_str(r#"{"data": [], "pagination": {"cursor": "  "}}"#).unwrap();
        assert_eq!(page.next_cursor(), None);

        let page: Page<Category> = serde_json::from_str(r#"{"data": null}"#).unwrap();
        assert_eq!(page.next_cursor(), None);
        assert!(page.into_data().is_empty());
    }

    #[test]
    fn test_to_observation_counts_whole_minutes() {
        let page: Page<LiveStream> = serde_json::from_str(STREAMS_PAGE).unwrap();
        let stream = &page.into_data()[0];
        let run_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 59).unwrap();

        let obs = stream.to_observation(run_at);
        assert_eq!(obs.running_minutes, 75);
        assert_eq!(obs.title, "first line-second line");
        assert_eq!(obs.captured_at(), Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 0).unwrap());
    }
}
