//! Live-stream catalog client for whostream
//!
//! This crate talks to the upstream catalog API: it authenticates with
//! client credentials, walks cursor-paginated listings, collapses duplicate
//! streamers and downloads thumbnails through a bounded worker pool. Every
//! network call goes through a [`RetryPolicy`](whostream_core::RetryPolicy).

pub mod client;
pub mod model;
pub mod thumbnails;

pub use client::{CatalogClient, CatalogEndpoints, Credentials, network_retry_policy};
pub use model::{Category, LiveStream, Page, Pagination, Token};
pub use thumbnails::{ImageFetcher, ThumbnailDownloader, ThumbnailOutcome};
