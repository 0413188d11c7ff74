//! Snapshot file storage for whostream
//!
//! Every collection run writes one CSV file named after the category and
//! the run timestamp. Reports select files by that embedded timestamp and
//! parse them in parallel.

pub mod observation_store;

pub use observation_store::{DEFAULT_SLACK, ObservationStore};
