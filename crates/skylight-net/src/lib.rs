//! # skylight-net
//!
//! Outbound HTTP for Skylight: acquiring random photos from Unsplash and
//! saving full-resolution images to disk.

pub mod download;
pub mod error;
pub mod unsplash;

#[cfg(test)]
mod fake_api;

pub use download::{DownloadReceipt, Downloader};
pub use error::{AcquisitionError, DownloadError};
pub use unsplash::{AcquisitionClock, PhotoSource, UnsplashClient};

use std::time::Duration;

/// HTTP client shared by the photo source and the downloader.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("skylight/", env!("CARGO_PKG_VERSION")))
        .build()
}
