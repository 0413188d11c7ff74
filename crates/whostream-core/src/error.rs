//! Error types for whostream
//!
//! This module defines the error type used throughout the whostream
//! workspace. All errors are derived from `thiserror` for convenient error
//! handling and automatic `From` implementations.
//!
//! Two questions are answered here rather than at the call sites:
//! whether a failure is worth retrying ([`WhoStreamError::is_transient`])
//! and which process exit status it maps to
//! ([`WhoStreamError::return_code`]).
//!
//! # Example
//!
//! ```
//! use whostream_core::error::{Result, ReturnCode, WhoStreamError};
//!
//! fn lookup() -> Result<()> {
//!     Err(WhoStreamError::CategoryNotFound("509658".to_string()))
//! }
//!
//! let err = lookup().unwrap_err();
//! assert!(!err.is_transient());
//! assert_eq!(err.return_code(), ReturnCode::CategoryNotFound);
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for whostream operations
#[derive(Error, Debug)]
pub enum WhoStreamError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot file error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The request never produced an HTTP response (connection reset,
    /// timeout, unreadable body)
    #[error("Transport error at {url}: {source}")]
    Transport {
        /// Request URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The upstream API answered with a non-2xx status
    #[error("HTTP {status}: {reason} at {url}")]
    Http {
        /// Request URL
        url: String,
        /// Numeric status code
        status: u16,
        /// Reason phrase for the status
        reason: String,
    },

    /// The token endpoint answered but no access token could be read
    #[error("The access token could not be retrieved: {0}")]
    InvalidToken(String),

    /// A catalog query was issued before authenticating
    #[error("The catalog client is not authenticated")]
    NotAuthenticated,

    /// No category matched the requested id
    #[error("Can't find a game with id '{0}'")]
    CategoryNotFound(String),

    /// The data directory does not exist
    #[error("The data directory '{0}' does not exist")]
    DataDirectoryMissing(PathBuf),

    /// The data directory exists but cannot be written
    #[error("The data directory '{path}' is not writable: {source}")]
    DataDirectoryNotWritable {
        /// The data directory
        path: PathBuf,
        /// Error raised by the write probe
        #[source]
        source: std::io::Error,
    },

    /// The report window contains no observations
    #[error("No streams were found between {start} and {end}")]
    NoObservations {
        /// Window start (exclusive)
        start: String,
        /// Window end (inclusive)
        end: String,
    },

    /// Start, end and period were all supplied
    #[error("Do not specify a period together with a start AND end date")]
    ConflictingDateParameters,

    /// An end date was supplied without a start or a period
    #[error("If you set an end date then you must set a start date or a period")]
    MissingDateParameters,

    /// Invalid date input or an empty window
    #[error("Invalid date parameters: {0}")]
    InvalidDateParameters(String),

    /// Parse error with file context
    #[error("Parse error in {file}: {error}")]
    Parse {
        /// The file that caused the error
        file: PathBuf,
        /// The error message
        error: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl WhoStreamError {
    /// Whether a retry has a reasonable chance of succeeding.
    ///
    /// Only transport-level failures qualify. Status codes are never
    /// inspected: a 5xx is still an answer from the server.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { source, .. } => !source.is_builder(),
            _ => false,
        }
    }

    /// Process exit status for this error
    pub fn return_code(&self) -> ReturnCode {
        match self {
            Self::DataDirectoryMissing(_) => ReturnCode::DataDirectoryMissing,
            Self::DataDirectoryNotWritable { .. } => ReturnCode::DataDirectoryNotWritable,
            Self::CategoryNotFound(_) => ReturnCode::CategoryNotFound,
            Self::ConflictingDateParameters => ReturnCode::ConflictingDateParameters,
            Self::MissingDateParameters => ReturnCode::MissingDateParameters,
            Self::InvalidDateParameters(_) => ReturnCode::InvalidDateParameters,
            Self::NoObservations { .. } => ReturnCode::NoObservations,
            Self::Transport { .. }
            | Self::Http { .. }
            | Self::InvalidToken(_)
            | Self::NotAuthenticated => ReturnCode::ApiFailure,
            Self::Config(_) => ReturnCode::Configuration,
            Self::Io(_)
            | Self::Json(_)
            | Self::Csv(_)
            | Self::Parse { .. }
            | Self::InvalidArgument(_) => ReturnCode::Failure,
        }
    }
}

/// Process exit statuses, one per fatal condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReturnCode {
    Success = 0,
    Failure = 1,
    DataDirectoryMissing = 2,
    DataDirectoryNotWritable = 3,
    CategoryNotFound = 4,
    ConflictingDateParameters = 5,
    MissingDateParameters = 6,
    InvalidDateParameters = 7,
    NoObservations = 8,
    ApiFailure = 9,
    Configuration = 10,
}

impl From<ReturnCode> for u8 {
    fn from(code: ReturnCode) -> Self {
        code as u8
    }
}

/// Convenience type alias for Results in whostream
pub type Result<T> = std::result::Result<T, WhoStreamError>;
