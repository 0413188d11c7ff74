//! CLI interface for whostream
//!
//! # Example
//!
//! ```bash
//! # Find the id of a game
//! whostream search "just chatting"
//!
//! # Snapshot everyone streaming it, with thumbnails
//! whostream collect 509658 --data-dir ./data --thumbnails --min-viewers 10
//!
//! # Sessions of the last day
//! whostream report 509658 --data-dir ./data --period day
//! ```

use crate::aggregation::SessionOrder;
use crate::period::ReportPeriod;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use whostream_catalog::thumbnails::DEFAULT_CONCURRENCY;

/// Track who is streaming a game and report their viewing sessions
#[derive(Parser, Debug, Clone)]
#[command(name = "whostream")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Show informational output (default is quiet mode with only warnings and errors)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Secrets file holding clientId and clientSecret
    #[arg(long, global = true, env = "WHOSTREAM_SECRETS")]
    pub secrets: Option<PathBuf>,

    /// Application client id (overrides the secrets file)
    #[arg(long, global = true, env = "WHOSTREAM_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// Application client secret (overrides the secrets file)
    #[arg(long, global = true, env = "WHOSTREAM_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Catalog API base URL
    #[arg(long, global = true, env = "WHOSTREAM_API_BASE", hide = true)]
    pub api_base: Option<String>,

    /// OAuth2 token endpoint
    #[arg(long, global = true, env = "WHOSTREAM_TOKEN_URL", hide = true)]
    pub token_url: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Timezone arguments shared by commands that print times
#[derive(Args, Debug, Clone, Default)]
pub struct TimezoneArgs {
    /// Timezone for entering and displaying times (e.g. "America/New_York", "UTC").
    /// If not specified, uses the system's local timezone
    #[arg(long, short = 'z')]
    pub timezone: Option<String>,

    /// Use UTC (overrides --timezone)
    #[arg(long)]
    pub utc: bool,
}

/// Arguments for `collect`
#[derive(Args, Debug, Clone)]
pub struct CollectArgs {
    /// Category (game) id to snapshot
    pub category_id: String,

    /// Directory receiving snapshot files
    #[arg(long, env = "WHOSTREAM_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Download a thumbnail of every stream
    #[arg(long)]
    pub thumbnails: bool,

    /// Ignore streams with fewer viewers
    #[arg(long, default_value_t = 0)]
    pub min_viewers: u64,

    /// Thumbnail downloads in flight
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub timezone_args: TimezoneArgs,
}

/// Arguments for `report`
#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Category (game) id to report on
    pub category_id: String,

    /// Directory holding snapshot files
    #[arg(long, env = "WHOSTREAM_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Window start, exclusive (YYYY-MM-DD, YYYY-MM-DD HH:MM or YYYY-MM-DD HH:MM:SS)
    #[arg(long)]
    pub start: Option<String>,

    /// Window end, inclusive (same formats as --start)
    #[arg(long)]
    pub end: Option<String>,

    /// Window length when only one bound (or none) is given
    #[arg(long, value_enum)]
    pub period: Option<ReportPeriod>,

    /// Session ranking
    #[arg(long, value_enum, default_value_t = SessionOrder::Observations)]
    pub sort: SessionOrder,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub timezone_args: TimezoneArgs,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Search categories by name
    Search {
        /// Text to search for
        query: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Snapshot the streams currently live in a category
    Collect(CollectArgs),

    /// Reconstruct viewing sessions from collected snapshots
    Report(ReportArgs),
}
