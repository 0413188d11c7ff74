//! Command implementations
//!
//! [`run`] is everything `main` does after logging is set up: it turns the
//! parsed [`Cli`] into catalog calls, store reads and writes and formatted
//! output on stdout.

use crate::aggregation::{HourlyAggregator, SessionOrder, SessionReconstructor, sort_by_capture};
use crate::cli::{Cli, CollectArgs, Command, ReportArgs, TimezoneArgs};
use crate::period::{ReportWindow, parse_date_input};
use crate::settings::Settings;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;
use whostream_catalog::client::{DEFAULT_API_BASE, DEFAULT_TOKEN_URL};
use whostream_catalog::thumbnails::thumbnail_dir;
use whostream_catalog::{CatalogClient, CatalogEndpoints, LiveStream, ThumbnailDownloader};
use whostream_core::aggregation_types::{HourlyBucket, Session, Totals};
use whostream_core::error::{Result, WhoStreamError};
use whostream_core::timezone::TimezoneConfig;
use whostream_core::types::{CategoryId, Observation, UserId};
use whostream_store::ObservationStore;
use whostream_terminal::{ReportView, get_formatter};

/// Execute the parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Search { query, json } => {
            let client = connect(&cli).await?;
            let categories = client.search_categories(query).await?;
            println!("{}", get_formatter(*json).format_categories(&categories));
            Ok(())
        }
        Command::Collect(args) => collect(&cli, args, Utc::now()).await.map(|_| ()),
        Command::Report(args) => report(&cli, args, Utc::now()).await,
    }
}

fn timezone(args: &TimezoneArgs) -> Result<TimezoneConfig> {
    let tz = TimezoneConfig::from_cli(args.timezone.as_deref(), args.utc)?;
    info!("Using timezone: {}", tz.display_name());
    Ok(tz)
}

/// Build an authenticated catalog client from the global options
async fn connect(cli: &Cli) -> Result<CatalogClient> {
    let settings = Settings::load(
        cli.secrets.as_deref(),
        cli.client_id.clone(),
        cli.client_secret.clone(),
    )?;
    let endpoints = CatalogEndpoints::new(
        cli.api_base.as_deref().unwrap_or(DEFAULT_API_BASE),
        cli.token_url.as_deref().unwrap_or(DEFAULT_TOKEN_URL),
    )?;

    let mut client = CatalogClient::with_endpoints(endpoints)?;
    client.authenticate(settings.credentials()).await?;
    info!("Authenticated with the catalog");
    Ok(client)
}

/// Snapshot the live streams of a category; returns the snapshot file
pub async fn collect(cli: &Cli, args: &CollectArgs, now: DateTime<Utc>) -> Result<PathBuf> {
    let tz = timezone(&args.timezone_args)?;
    let run_at = now.duration_trunc(TimeDelta::seconds(1)).unwrap_or(now);
    let category_id = CategoryId::new(args.category_id.trim());

    let client = connect(cli).await?;
    let store = ObservationStore::new(&args.data_dir);
    store.check_writable()?;

    let category = client.get_category_by_id(&category_id).await?;
    info!("Collecting streams of {} ({})", category.name, category.id);

    let mut streams = client.list_live_streams(&category_id).await?;
    let live = streams.len();
    streams.retain(|s| s.viewer_count >= args.min_viewers);
    if streams.len() < live {
        info!(
            "Ignoring {} streams below {} viewers",
            live - streams.len(),
            args.min_viewers
        );
    }

    println!("{}", get_formatter(args.json).format_streams(&category, &streams, &tz));

    let thumbnails = if args.thumbnails {
        let dir = thumbnail_dir(store.dir(), &category_id, run_at);
        tokio::fs::create_dir_all(&dir).await?;
        let show_progress = !args.json && is_terminal::is_terminal(std::io::stdout());
        let outcomes = ThumbnailDownloader::new(&client, dir.clone())
            .with_concurrency(args.concurrency)
            .with_progress(show_progress)
            .download_all(&streams)
            .await;

        outcomes
            .into_iter()
            .filter_map(|outcome| match outcome.result {
                Ok(path) => Some((outcome.user_id, relative_to(&path, store.dir()))),
                Err(_) => None,
            })
            .collect()
    } else {
        HashMap::new()
    };

    let observations = build_observations(&streams, run_at, &thumbnails);
    store.write(run_at, &category_id, &observations)
}

/// Turn one run's streams into observations, attaching saved thumbnails
pub fn build_observations(
    streams: &[LiveStream],
    run_at: DateTime<Utc>,
    thumbnails: &HashMap<UserId, String>,
) -> Vec<Observation> {
    streams
        .iter()
        .map(|stream| {
            let obs = stream.to_observation(run_at);
            match thumbnails.get(&stream.user_id) {
                Some(path) => obs.with_thumbnail(path.clone()),
                None => obs,
            }
        })
        .collect()
}

/// `path` relative to `base` with `/` separators, or as is outside `base`
fn relative_to(path: &Path, base: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.display().to_string(),
    }
}

/// Print the session report for a category
pub async fn report(cli: &Cli, args: &ReportArgs, now: DateTime<Utc>) -> Result<()> {
    let tz = timezone(&args.timezone_args)?;
    let start = args
        .start
        .as_deref()
        .map(|s| parse_date_input(s, &tz))
        .transpose()?;
    let end = args
        .end
        .as_deref()
        .map(|s| parse_date_input(s, &tz))
        .transpose()?;
    let window = ReportWindow::resolve(start, end, args.period, now, &tz)?;

    let store = ObservationStore::new(&args.data_dir);
    store.check_exists()?;

    let category_id = CategoryId::new(args.category_id.trim());
    let client = connect(cli).await?;
    let category = client.get_category_by_id(&category_id).await?;

    let data = build_report(&store, &category_id, window, args.sort, &tz)?;
    let view = ReportView {
        category_id: &category.id,
        category_name: &category.name,
        start: window.start,
        end: window.end,
        sessions: &data.sessions,
        totals: data.totals,
        hourly: &data.hourly,
    };
    println!("{}", get_formatter(args.json).format_report(&view, &tz));
    Ok(())
}

/// Sessions and hourly buckets of one report window
#[derive(Debug, Clone)]
pub struct ReportData {
    pub sessions: Vec<Session>,
    pub totals: Totals,
    pub hourly: Vec<HourlyBucket>,
}

/// Read a window from the store and aggregate it
///
/// Fails with [`WhoStreamError::NoObservations`] when the window is empty.
pub fn build_report(
    store: &ObservationStore,
    category_id: &CategoryId,
    window: ReportWindow,
    order: SessionOrder,
    tz: &TimezoneConfig,
) -> Result<ReportData> {
    let mut observations = store.read_window(category_id, window.start, window.end)?;
    if observations.is_empty() {
        return Err(WhoStreamError::NoObservations {
            start: tz.format(&window.start, "%Y-%m-%d %H:%M:%S"),
            end: tz.format(&window.end, "%Y-%m-%d %H:%M:%S"),
        });
    }

    sort_by_capture(&mut observations);
    let mut sessions = SessionReconstructor::reconstruct(&observations);
    SessionReconstructor::rank(&mut sessions, order);
    let hourly = HourlyAggregator::aggregate(&observations);
    let totals = Totals::from_sessions(&sessions);

    info!(
        "{} observations, {} sessions, {} hours with activity",
        observations.len(),
        sessions.len(),
        hourly.len()
    );
    Ok(ReportData {
        sessions,
        totals,
        hourly,
    })
}
