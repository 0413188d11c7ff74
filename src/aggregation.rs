//! Session reconstruction and hourly aggregation
//!
//! Both passes read the same observation slice and build independent
//! results:
//!
//! - [`SessionReconstructor`] folds observations into [`Session`]s keyed by
//!   `(user_id, started_at)`. A streamer only gets a new session when the
//!   upstream start time changes; gaps between runs never split one.
//! - [`HourlyAggregator`] computes, per clock hour, how many streamers were
//!   live and the sum of their per-hour mean viewer counts.
//!
//! # Examples
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use whostream::aggregation::{HourlyAggregator, SessionReconstructor};
//! use whostream_core::types::{Observation, UserId};
//!
//! let started = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
//! let observations: Vec<Observation> = [(0, 100), (5, 150), (10, 120)]
//!     .into_iter()
//!     .map(|(minutes, viewers)| {
//!         Observation::new(UserId::new("42"), "streamer", "en", viewers, started, minutes, "title")
//!     })
//!     .collect();
//!
//! let sessions = SessionReconstructor::reconstruct(&observations);
//! assert_eq!(sessions.len(), 1);
//! assert_eq!(sessions[0].average_viewers(), 123);
//!
//! let hourly = HourlyAggregator::aggregate(&observations);
//! assert_eq!(hourly[0].streamer_count, 1);
//! ```

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use clap::ValueEnum;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use whostream_core::aggregation_types::{HourlyBucket, Session};
use whostream_core::types::{Observation, UserId};

/// How report sessions are ranked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SessionOrder {
    /// Most observations first
    #[default]
    Observations,
    /// Largest average viewers × duration first
    ViewerMinutes,
}

/// Groups observations into sessions
pub struct SessionReconstructor;

impl SessionReconstructor {
    /// Fold `observations` into sessions
    ///
    /// Observations must already be in ascending capture order; they are
    /// not sorted here. Sessions come back in the order their first
    /// observation was seen.
    pub fn reconstruct<'a>(observations: impl IntoIterator<Item = &'a Observation>) -> Vec<Session> {
        let mut index: HashMap<(UserId, DateTime<Utc>), usize> = HashMap::new();
        let mut sessions: Vec<Session> = Vec::new();

        for obs in observations {
            match index.entry((obs.user_id.clone(), obs.started_at)) {
                Entry::Occupied(slot) => sessions[*slot.get()].fold(obs),
                Entry::Vacant(slot) => {
                    slot.insert(sessions.len());
                    sessions.push(Session::open(obs));
                }
            }
        }

        sessions
    }

    /// Sort sessions best first; equal sessions keep their relative order
    pub fn rank(sessions: &mut [Session], order: SessionOrder) {
        match order {
            SessionOrder::Observations => {
                sessions.sort_by(|a, b| b.observations.cmp(&a.observations))
            }
            SessionOrder::ViewerMinutes => {
                sessions.sort_by(|a, b| b.viewer_minutes().cmp(&a.viewer_minutes()))
            }
        }
    }
}

/// Per-hour viewership summary
pub struct HourlyAggregator;

impl HourlyAggregator {
    /// One bucket per UTC hour that has at least one observation, oldest
    /// first
    pub fn aggregate<'a>(
        observations: impl IntoIterator<Item = &'a Observation>,
    ) -> Vec<HourlyBucket> {
        // (hour, streamer) -> (viewer sum, readings)
        let mut per_streamer: BTreeMap<(DateTime<Utc>, &UserId), (u64, u64)> = BTreeMap::new();
        for obs in observations {
            let reading = per_streamer
                .entry((truncate_to_hour(obs.captured_at()), &obs.user_id))
                .or_default();
            reading.0 += obs.viewers;
            reading.1 += 1;
        }

        let mut buckets: BTreeMap<DateTime<Utc>, HourlyBucket> = BTreeMap::new();
        for ((hour, _), (sum, readings)) in per_streamer {
            let bucket = buckets.entry(hour).or_insert_with(|| HourlyBucket {
                hour,
                streamer_count: 0,
                summed_average_viewership: 0.0,
            });
            bucket.streamer_count += 1;
            bucket.summed_average_viewership += sum as f64 / readings as f64;
        }

        buckets.into_values().collect()
    }
}

/// Sort observations into ascending capture order
pub fn sort_by_capture(observations: &mut [Observation]) {
    observations.sort_by_key(Observation::captured_at);
}

/// Truncate a timestamp to the hour boundary (XX:00:00)
pub fn truncate_to_hour(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .duration_trunc(TimeDelta::hours(1))
        .unwrap_or(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    fn obs(user: &str, started: DateTime<Utc>, minutes: i64, viewers: u64) -> Observation {
        Observation::new(UserId::new(user), format!("user{user}"), "en", viewers, started, minutes, "title")
    }

    #[test]
    fn test_reconstruct_single_session() {
        let observations = vec![
            obs("42", at(8, 0), 0, 100),
            obs("42", at(8, 0), 5, 150),
            obs("42", at(8, 0), 10, 120),
        ];
        let sessions = SessionReconstructor::reconstruct(&observations);

        assert_eq!(sessions.len(), 1);
        let session = &sessions[0];
        assert_eq!(session.observations, 3);
        assert_eq!(session.max_viewers, 150);
        assert_eq!(session.cumulative_viewers, 370);
        assert_eq!(session.average_viewers(), 123);
        assert_eq!(session.duration(), TimeDelta::minutes(10));
    }

    #[test]
    fn test_gap_does_not_split_session() {
        let observations = vec![obs("1", at(8, 0), 0, 10), obs("1", at(8, 0), 180, 10)];
        let sessions = SessionReconstructor::reconstruct(&observations);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].duration(), TimeDelta::hours(3));
    }

    #[test]
    fn test_new_start_opens_new_session() {
        let observations = vec![
            obs("1", at(8, 0), 0, 10),
            obs("2", at(8, 0), 0, 20),
            obs("1", at(8, 0), 5, 10),
            obs("1", at(9, 0), 0, 30),
        ];
        let sessions = SessionReconstructor::reconstruct(&observations);

        let keys: Vec<(&str, DateTime<Utc>, u64)> = sessions
            .iter()
            .map(|s| (s.user_id.as_str(), s.start, s.observations))
            .collect();
        assert_eq!(
            keys,
            vec![("1", at(8, 0), 2), ("2", at(8, 0), 1), ("1", at(9, 0), 1)]
        );
    }

    #[test]
    fn test_reconstruct_empty() {
        let none: Vec<Observation> = Vec::new();
        assert!(SessionReconstructor::reconstruct(&none).is_empty());
        assert!(HourlyAggregator::aggregate(&none).is_empty());
    }

    #[test]
    fn test_rank_by_observations_is_stable() {
        let observations = vec![
            obs("a", at(8, 0), 0, 1),
            obs("b", at(8, 0), 0, 1),
            obs("c", at(8, 0), 0, 1),
            obs("c", at(8, 0), 5, 1),
        ];
        let mut sessions = SessionReconstructor::reconstruct(&observations);
        SessionReconstructor::rank(&mut sessions, SessionOrder::Observations);

        let order: Vec<&str> = sessions.iter().map(|s| s.user_id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_rank_by_viewer_minutes() {
        let observations = vec![
            // 3 readings, 10 viewers, 10 minutes -> 100
            obs("busy", at(8, 0), 0, 10),
            obs("busy", at(8, 0), 5, 10),
            obs("busy", at(8, 0), 10, 10),
            // 2 readings, 1000 viewers, 5 minutes -> 5000
            obs("big", at(8, 0), 0, 1000),
            obs("big", at(8, 0), 5, 1000),
        ];
        let mut sessions = SessionReconstructor::reconstruct(&observations);
        SessionReconstructor::rank(&mut sessions, SessionOrder::ViewerMinutes);
        assert_eq!(sessions[0].user_id.as_str(), "big");

        SessionReconstructor::rank(&mut sessions, SessionOrder::Observations);
        assert_eq!(sessions[0].user_id.as_str(), "busy");
    }

    #[test]
    fn test_hourly_sums_per_streamer_means() {
        let observations = vec![
            obs("1", at(8, 0), 10, 100),
            obs("1", at(8, 0), 20, 200),
            obs("2", at(8, 0), 30, 50),
            obs("1", at(8, 0), 70, 400),
        ];
        let hourly = HourlyAggregator::aggregate(&observations);

        assert_eq!(hourly.len(), 2);
        assert_eq!(hourly[0].hour, at(8, 0));
        assert_eq!(hourly[0].streamer_count, 2);
        assert_eq!(hourly[0].summed_average_viewership, 150.0 + 50.0);
        assert_eq!(hourly[1].hour, at(9, 0));
        assert_eq!(hourly[1].streamer_count, 1);
        assert_eq!(hourly[1].summed_average_viewership, 400.0);
    }

    #[test]
    fn test_hourly_is_sparse() {
        let observations = vec![obs("1", at(8, 0), 5, 10), obs("1", at(8, 0), 185, 10)];
        let hours: Vec<DateTime<Utc>> = HourlyAggregator::aggregate(&observations)
            .iter()
            .map(|b| b.hour)
            .collect();
        assert_eq!(hours, vec![at(8, 0), at(11, 0)]);
    }

    #[test]
    fn test_sort_by_capture() {
        let mut observations = vec![
            obs("1", at(8, 0), 10, 1),
            obs("2", at(7, 0), 5, 2),
            obs("3", at(8, 0), 0, 3),
        ];
        sort_by_capture(&mut observations);
        let viewers: Vec<u64> = observations.iter().map(|o| o.viewers).collect();
        assert_eq!(viewers, vec![2, 3, 1]);
    }

    #[test]
    fn test_truncate_to_hour() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 8, 59, 59).unwrap();
        assert_eq!(truncate_to_hour(ts), at(8, 0));
        assert_eq!(truncate_to_hour(at(8, 0)), at(8, 0));
    }
}
