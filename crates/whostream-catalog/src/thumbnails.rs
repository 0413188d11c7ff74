//! Concurrent thumbnail downloads
//!
//! Thumbnails are fetched through an [`ImageFetcher`] with at most
//! `concurrency` requests in flight. A failed download never aborts the
//! batch: every stream gets a [`ThumbnailOutcome`] and the caller decides
//! what to do with the failures.

use crate::client::CatalogClient;
use crate::model::LiveStream;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};
use whostream_core::error::{Result, WhoStreamError};
use whostream_core::types::{CategoryId, UserId};

/// Requested thumbnail width in pixels
pub const THUMBNAIL_WIDTH: u32 = 300;

/// Requested thumbnail height in pixels
pub const THUMBNAIL_HEIGHT: u32 = 200;

/// Downloads in flight unless configured otherwise
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Source of image bytes
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the image behind a `{width}`/`{height}` URL template
    async fn fetch_image(&self, url_template: &str, width: u32, height: u32) -> Result<Vec<u8>>;
}

#[async_trait]
impl ImageFetcher for CatalogClient {
    async fn fetch_image(&self, url_template: &str, width: u32, height: u32) -> Result<Vec<u8>> {
        CatalogClient::fetch_image(self, url_template, width, height).await
    }
}

/// Result of downloading one stream's thumbnail
#[derive(Debug)]
pub struct ThumbnailOutcome {
    pub user_id: UserId,
    /// Where the image was saved
    pub result: Result<PathBuf>,
}

/// Directory holding the thumbnails of one collection run
pub fn thumbnail_dir(data_dir: &Path, category: &CategoryId, run_at: DateTime<Utc>) -> PathBuf {
    data_dir.join(format!(
        "Thumb.{}.{}",
        category,
        run_at.format("%Y-%m-%d.%H%M%S")
    ))
}

/// File name for a stream's thumbnail: zero-padded viewers, the streamer's
/// name, then the user id, which keeps names unique within a run
pub fn thumbnail_file_name(stream: &LiveStream) -> String {
    format!(
        "{:07}.{}.{}.jpg",
        stream.viewer_count,
        sanitize(&stream.user_name),
        sanitize(stream.user_id.as_str())
    )
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Bounded-concurrency thumbnail downloader
pub struct ThumbnailDownloader<'a, F: ImageFetcher> {
    fetcher: &'a F,
    dir: PathBuf,
    width: u32,
    height: u32,
    concurrency: usize,
    show_progress: bool,
}

impl<'a, F: ImageFetcher> ThumbnailDownloader<'a, F> {
    /// Save thumbnails into `dir`, which must already exist
    pub fn new(fetcher: &'a F, dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            dir: dir.into(),
            width: THUMBNAIL_WIDTH,
            height: THUMBNAIL_HEIGHT,
            concurrency: DEFAULT_CONCURRENCY,
            show_progress: false,
        }
    }

    /// Maximum downloads in flight; zero is treated as one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Draw a progress bar instead of logging each completion
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Download every stream's thumbnail
    ///
    /// Outcomes arrive in completion order, one per stream.
    pub async fn download_all(&self, streams: &[LiveStream]) -> Vec<ThumbnailOutcome> {
        let total = streams.len();
        let completed = &AtomicUsize::new(0);
        let progress = self.progress_bar(total);
        let progress = progress.as_ref();

        let outcomes: Vec<ThumbnailOutcome> = stream::iter(streams)
            .map(move |s| self.download_one(s, completed, total, progress))
            .buffer_unordered(self.concurrency.max(1))
            .collect()
            .await;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        if failed > 0 {
            warn!("{} of {} thumbnails could not be downloaded", failed, total);
        } else {
            debug!("Downloaded {} thumbnails", total);
        }
        outcomes
    }

    fn progress_bar(&self, total: usize) -> Option<ProgressBar> {
        if !self.show_progress || total == 0 {
            return None;
        }
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} thumbnails {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    }

    async fn download_one(
        &self,
        stream: &LiveStream,
        completed: &AtomicUsize,
        total: usize,
        progress: Option<&ProgressBar>,
    ) -> ThumbnailOutcome {
        let path = self.dir.join(thumbnail_file_name(stream));
        let result = async {
            if stream.thumbnail_url.is_empty() {
                return Err(WhoStreamError::InvalidArgument(format!(
                    "stream of {} has no thumbnail URL",
                    stream.user_name
                )));
            }
            let bytes = self
                .fetcher
                .fetch_image(&stream.thumbnail_url, self.width, self.height)
                .await?;
            tokio::fs::write(&path, bytes).await?;
            Ok::<PathBuf, WhoStreamError>(path.clone())
        }
        .await;

        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        if let Err(e) = &result {
            warn!("Thumbnail for {} failed: {}", stream.user_name, e);
        }
        match progress {
            Some(pb) => pb.set_position(done as u64),
            None => info!("Downloaded thumbnail {} out of {}", done, total),
        }

        ThumbnailOutcome {
            user_id: stream.user_id.clone(),
            result,
        }
    }
}
