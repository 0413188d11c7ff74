//! Observation store backed by one CSV file per collection run
//!
//! File names embed the category and the run timestamp
//! (`WIS.{category}.{yyyy-MM-dd.HHmmss}.csv`), so a report can pick its
//! candidate files from a directory listing alone.
//!
//! # Examples
//!
//! ```no_run
//! use chrono::{Duration, Utc};
//! use whostream_core::types::CategoryId;
//! use whostream_store::ObservationStore;
//!
//! # fn example() -> whostream_core::Result<()> {
//! let store = ObservationStore::new("/var/lib/whostream");
//! let end = Utc::now();
//! let observations = store.read_window(&CategoryId::new("509658"), end - Duration::days(1), end)?;
//! println!("{} observations in the last day", observations.len());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use whostream_core::error::{Result, WhoStreamError};
use whostream_core::types::{CategoryId, Observation, UserId};

/// How far outside the report window a file's run timestamp may lie
pub const DEFAULT_SLACK: Duration = Duration::hours(1);

const FILE_PREFIX: &str = "WIS.";
const FILE_EXTENSION: &str = ".csv";
const RUN_TIMESTAMP_FORMAT: &str = "%Y-%m-%d.%H%M%S";
const STARTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const HEADER: [&str; 8] = [
    "User Id",
    "User Name",
    "Language",
    "Viewers",
    "Started At",
    "Running Minutes",
    "Thumbnail File",
    "Title",
];

/// One CSV row, in column order
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRow {
    #[serde(rename = "User Id")]
    user_id: String,
    #[serde(rename = "User Name")]
    user_name: String,
    #[serde(rename = "Language")]
    language: String,
    #[serde(rename = "Viewers")]
    viewers: u64,
    #[serde(rename = "Started At")]
    started_at: String,
    #[serde(rename = "Running Minutes")]
    running_minutes: i64,
    #[serde(rename = "Thumbnail File")]
    thumbnail_file: String,
    #[serde(rename = "Title")]
    title: String,
}

impl From<&Observation> for SnapshotRow {
    fn from(obs: &Observation) -> Self {
        Self {
            user_id: obs.user_id.to_string(),
            user_name: obs.user_name.clone(),
            language: obs.language.clone(),
            viewers: obs.viewers,
            started_at: obs.started_at.format(STARTED_AT_FORMAT).to_string(),
            running_minutes: obs.running_minutes,
            thumbnail_file: obs.thumbnail_file.clone().unwrap_or_default(),
            title: obs.title.clone(),
        }
    }
}

impl SnapshotRow {
    fn into_observation(self) -> std::result::Result<Observation, String> {
        if self.user_id.trim().is_empty() {
            return Err("empty user id".to_string());
        }
        if self.running_minutes < 0 {
            return Err(format!("negative running minutes {}", self.running_minutes));
        }
        let started_at = NaiveDateTime::parse_from_str(&self.started_at, STARTED_AT_FORMAT)
            .map_err(|e| format!("bad start time '{}': {e}", self.started_at))?
            .and_utc();

        let obs = Observation::new(
            UserId::new(self.user_id),
            self.user_name,
            self.language,
            self.viewers,
            started_at,
            self.running_minutes,
            self.title,
        );
        Ok(if self.thumbnail_file.is_empty() {
            obs
        } else {
            obs.with_thumbnail(self.thumbnail_file)
        })
    }
}

/// Reads and writes snapshot files in one data directory
#[derive(Debug, Clone)]
pub struct ObservationStore {
    dir: PathBuf,
    slack: Duration,
}

impl ObservationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            slack: DEFAULT_SLACK,
        }
    }

    /// Override the file selection slack
    pub fn with_slack(mut self, slack: Duration) -> Self {
        self.slack = slack;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fail with [`WhoStreamError::DataDirectoryMissing`] unless the data
    /// directory exists
    pub fn check_exists(&self) -> Result<()> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(WhoStreamError::DataDirectoryMissing(self.dir.clone()))
        }
    }

    /// Prove the data directory is writable by creating and removing a
    /// probe file
    pub fn check_writable(&self) -> Result<()> {
        self.check_exists()?;
        let probe = self
            .dir
            .join(format!(".whostream-probe-{}", std::process::id()));
        let not_writable = |source: std::io::Error| WhoStreamError::DataDirectoryNotWritable {
            path: self.dir.clone(),
            source,
        };

        std::fs::write(&probe, b"probe").map_err(not_writable)?;
        std::fs::remove_file(&probe).map_err(not_writable)?;
        debug!("Data directory {} is writable", self.dir.display());
        Ok(())
    }

    /// File name of the snapshot taken at `run_at`
    pub fn snapshot_file_name(category: &CategoryId, run_at: DateTime<Utc>) -> String {
        format!(
            "{FILE_PREFIX}{category}.{}{FILE_EXTENSION}",
            run_at.format(RUN_TIMESTAMP_FORMAT)
        )
    }

    /// Run timestamp embedded in a snapshot file name for `category`
    pub fn parse_snapshot_file_name(category: &CategoryId, file_name: &str) -> Option<DateTime<Utc>> {
        let stamp = file_name
            .strip_prefix(FILE_PREFIX)?
            .strip_prefix(category.as_str())?
            .strip_prefix('.')?
            .strip_suffix(FILE_EXTENSION)?;
        NaiveDateTime::parse_from_str(stamp, RUN_TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Write one run's observations, replacing any file with the same name
    ///
    /// The file is written under a temporary name and renamed into place,
    /// so readers never see a half-written snapshot.
    pub fn write(
        &self,
        run_at: DateTime<Utc>,
        category: &CategoryId,
        observations: &[Observation],
    ) -> Result<PathBuf> {
        let path = self.dir.join(Self::snapshot_file_name(category, run_at));
        let temp_path = path.with_extension("csv.tmp");

        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(&temp_path)?;
            writer.write_record(HEADER)?;
            for obs in observations {
                writer.serialize(SnapshotRow::from(obs))?;
            }
            writer.flush()?;
        }
        std::fs::rename(&temp_path, &path)?;

        info!(
            "Wrote {} observations to {}",
            observations.len(),
            path.display()
        );
        Ok(path)
    }

    /// Snapshot files for `category`, oldest first
    pub fn list_snapshots(&self, category: &CategoryId) -> Result<Vec<(DateTime<Utc>, PathBuf)>> {
        self.check_exists()?;

        let mut snapshots: Vec<(DateTime<Utc>, PathBuf)> = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let run_at = Self::parse_snapshot_file_name(category, e.file_name().to_str()?)?;
                Some((run_at, e.into_path()))
            })
            .collect();

        snapshots.sort();
        Ok(snapshots)
    }

    /// Observations of `category` captured in `(start, end]`
    ///
    /// Candidate files are those whose run timestamp lies within the window
    /// widened by the slack on both sides. Rows that cannot be parsed are
    /// skipped. The result is unordered.
    pub fn read_window(
        &self,
        category: &CategoryId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Observation>> {
        let earliest = start - self.slack;
        let latest = end + self.slack;
        let candidates: Vec<PathBuf> = self
            .list_snapshots(category)?
            .into_iter()
            .filter(|(run_at, _)| *run_at >= earliest && *run_at <= latest)
            .map(|(_, path)| path)
            .collect();

        debug!(
            "Reading {} snapshot files for category {}",
            candidates.len(),
            category
        );

        let per_file: Vec<Vec<Observation>> = candidates
            .par_iter()
            .map(|path| read_snapshot(path))
            .collect::<Result<_>>()?;

        let observations: Vec<Observation> = per_file
            .into_iter()
            .flatten()
            .filter(|obs| {
                let captured = obs.captured_at();
                captured > start && captured <= end
            })
            .collect();

        info!(
            "Loaded {} observations from {} files",
            observations.len(),
            candidates.len()
        );
        Ok(observations)
    }
}

/// Parse one snapshot file, skipping malformed rows
pub fn read_snapshot(path: &Path) -> Result<Vec<Observation>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| WhoStreamError::Parse {
            file: path.to_path_buf(),
            error: e.to_string(),
        })?;

    let mut observations = Vec::new();
    let mut skipped = 0usize;
    for (index, row) in reader.deserialize::<SnapshotRow>().enumerate() {
        let parsed = row
            .map_err(|e| e.to_string())
            .and_then(SnapshotRow::into_observation);
        match parsed {
            Ok(obs) => observations.push(obs),
            Err(error) => {
                skipped += 1;
                // +2: one for the header, one for 1-based numbering
                warn!("Skipping row {} of {}: {}", index + 2, path.display(), error);
            }
        }
    }

    if skipped > 0 {
        debug!("{}: {} rows read, {} skipped", path.display(), observations.len(), skipped);
    }
    Ok(observations)
}
