//! Aggregation data types for whostream
//!
//! Pure data structures produced by session reconstruction and hourly
//! aggregation. These types have no dependencies on the catalog client or
//! the observation store.

use crate::types::{Observation, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// How many times a title was seen within one session
#[derive(Debug, Clone, PartialEq, Eq)]
struct TitleCount {
    title: String,
    count: u64,
}

/// A reconstructed viewing session
///
/// A session is keyed by `(user_id, start)` where `start` is the
/// upstream-reported stream start. A streamer starts a new session only
/// when that value changes; missing observations never split a session.
///
/// Sessions only exist once at least one observation has been folded in,
/// so `observations >= 1` always holds.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Streamer identity
    pub user_id: UserId,
    /// Display name from the first observation
    pub user_name: String,
    /// Language from the first observation
    pub language: String,
    /// Upstream-reported stream start, fixed at creation
    pub start: DateTime<Utc>,
    /// Capture time of the latest folded observation
    pub end: DateTime<Utc>,
    /// Number of folded observations
    pub observations: u64,
    /// Highest viewer count seen
    pub max_viewers: u64,
    /// Sum of all folded viewer counts
    pub cumulative_viewers: u64,
    /// Title frequencies in first-seen order
    #[serde(skip)]
    titles: Vec<TitleCount>,
}

impl Session {
    /// Open a session from its first observation
    pub fn open(first: &Observation) -> Self {
        let mut session = Self {
            user_id: first.user_id.clone(),
            user_name: first.user_name.clone(),
            language: first.language.clone(),
            start: first.started_at,
            end: first.started_at,
            observations: 0,
            max_viewers: 0,
            cumulative_viewers: 0,
            titles: Vec::with_capacity(2),
        };
        session.fold(first);
        session
    }

    /// Fold one more observation into the running statistics
    pub fn fold(&mut self, obs: &Observation) {
        // Streamers retitle mid-stream; the report shows the most used one
        match self.titles.iter_mut().find(|t| t.title == obs.title) {
            Some(entry) => entry.count += 1,
            None => self.titles.push(TitleCount {
                title: obs.title.clone(),
                count: 1,
            }),
        }

        self.end = self.end.max(obs.captured_at());
        self.observations += 1;
        self.max_viewers = self.max_viewers.max(obs.viewers);
        self.cumulative_viewers += obs.viewers;
    }

    /// Mean viewers, truncated toward zero
    pub fn average_viewers(&self) -> u64 {
        self.cumulative_viewers / self.observations.max(1)
    }

    /// Time between the stream start and the last observation
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Most frequent title; the earliest seen wins a tie
    pub fn title(&self) -> &str {
        let mut best: Option<&TitleCount> = None;
        for entry in &self.titles {
            if best.is_none_or(|b| entry.count > b.count) {
                best = Some(entry);
            }
        }
        best.map(|t| t.title.as_str()).unwrap_or_default()
    }

    /// Average viewers multiplied by the duration in minutes
    pub fn viewer_minutes(&self) -> u64 {
        self.average_viewers() * self.duration().num_minutes().max(0) as u64
    }
}

/// Viewership summary for one clock hour
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyBucket {
    /// Start of the hour
    pub hour: DateTime<Utc>,
    /// Distinct streamers observed during the hour
    pub streamer_count: usize,
    /// Sum over those streamers of their mean viewers within the hour
    pub summed_average_viewership: f64,
}

/// Totals over a list of sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub sessions: usize,
    pub observations: u64,
    pub streamed_minutes: i64,
}

impl Totals {
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let mut totals = Self::default();
        for session in sessions {
            totals.sessions += 1;
            totals.observations += session.observations;
            totals.streamed_minutes += session.duration().num_minutes();
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn obs(minutes: i64, viewers: u64, title: &str) -> Observation {
        let started = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        Observation::new(UserId::new("42"), "streamer", "en", viewers, started, minutes, title)
    }

    #[test]
    fn test_single_observation_session() {
        let session = Session::open(&obs(0, 77, "t"));
        assert_eq!(session.observations, 1);
        assert_eq!(session.max_viewers, 77);
        assert_eq!(session.average_viewers(), 77);
        assert_eq!(session.duration(), Duration::zero());
    }

    #[test]
    fn test_average_truncates() {
        let mut session = Session::open(&obs(0, 3, "t"));
        session.fold(&obs(5, 3, "t"));
        session.fold(&obs(10, 4, "t"));
        assert_eq!(session.cumulative_viewers, 10);
        assert_eq!(session.average_viewers(), 3);
    }

    #[test]
    fn test_title_mode() {
        let mut session = Session::open(&obs(0, 1, "A"));
        session.fold(&obs(5, 1, "B"));
        session.fold(&obs(10, 1, "A"));
        assert_eq!(session.title(), "A");
    }

    #[test]
    fn test_title_tie_keeps_first_seen() {
        let mut session = Session::open(&obs(0, 1, "A"));
        session.fold(&obs(5, 1, "B"));
        assert_eq!(session.title(), "A");

        let mut session = Session::open(&obs(0, 1, "B"));
        session.fold(&obs(5, 1, "A"));
        session.fold(&obs(10, 1, "A"));
        session.fold(&obs(15, 1, "B"));
        assert_eq!(session.title(), "B");
    }

    #[test]
    fn test_viewer_minutes() {
        let mut session = Session::open(&obs(0, 100, "t"));
        session.fold(&obs(30, 200, "t"));
        assert_eq!(session.average_viewers(), 150);
        assert_eq!(session.viewer_minutes(), 150 * 30);
    }

    #[test]
    fn test_totals_from_sessions() {
        let mut a = Session::open(&obs(0, 1, "t"));
        a.fold(&obs(60, 1, "t"));
        let b = Session::open(&obs(0, 1, "t"));
        let totals = Totals::from_sessions(&[a, b]);
        assert_eq!(totals.sessions, 2);
        assert_eq!(totals.observations, 3);
        assert_eq!(totals.streamed_minutes, 60);
    }
}
