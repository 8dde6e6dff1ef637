//! Saving the full-resolution wallpaper to disk.
//!
//! The file is streamed into `<name>.part` next to its destination and
//! renamed once complete, so a cancelled or failed download never leaves a
//! truncated image under the requested name.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use reqwest::header::AUTHORIZATION;
use reqwest::Url;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::unsplash::client_id_header;

/// A finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReceipt {
    /// Monotonic per-process identifier.
    pub id: u64,
    pub path: PathBuf,
    pub bytes: u64,
}

pub struct Downloader {
    http: reqwest::Client,
    access_key: String,
    download_dir: PathBuf,
    next_id: AtomicU64,
}

impl Downloader {
    pub fn new(
        http: reqwest::Client,
        access_key: impl Into<String>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            http,
            access_key: access_key.into(),
            download_dir: download_dir.into(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Ping the photo's download-tracking endpoint.
    ///
    /// Fire-and-forget: the ping runs on its own task and its outcome is
    /// only logged. It never delays or fails the download itself.
    pub fn track(&self, download_location: &str) {
        if download_location.is_empty() {
            return;
        }
        let request = self
            .http
            .get(download_location)
            .header(AUTHORIZATION, client_id_header(&self.access_key));
        let location = download_location.to_string();

        tokio::spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(location = %location, "download tracked");
                }
                Ok(response) => {
                    warn!(location = %location, status = %response.status(), "download tracking rejected");
                }
                Err(e) => {
                    warn!(location = %location, error = %e.without_url(), "download tracking failed");
                }
            }
        });
    }

    /// Fetch `url` and write it to `filename` inside the download directory.
    pub async fn download(&self, url: &str, filename: &str) -> Result<DownloadReceipt, DownloadError> {
        let url = Url::parse(url).map_err(|e| DownloadError::InvalidUrl(format!("{url}: {e}")))?;
        let target = resolve_target(&self.download_dir, filename)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        debug!(id, url = %url, path = %target.display(), "starting download");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::Network(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                status: status.as_u16(),
            });
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let partial = partial_path(&target);
        let bytes = match write_stream(response, &partial).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        fs::rename(&partial, &target).await?;

        info!(id, bytes, path = %target.display(), "wallpaper downloaded");
        Ok(DownloadReceipt {
            id,
            path: target,
            bytes,
        })
    }
}

async fn write_stream(response: reqwest::Response, path: &Path) -> Result<u64, DownloadError> {
    let mut file = fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DownloadError::Network(e.without_url()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Join `filename` onto `base`, rejecting anything that could land outside
/// it (absolute paths, `..`, empty names).
pub fn resolve_target(base: &Path, filename: &str) -> Result<PathBuf, DownloadError> {
    let relative = Path::new(filename);
    let mut resolved = base.to_path_buf();
    let mut pushed = false;

    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                pushed = true;
            }
            Component::CurDir => {}
            _ => return Err(DownloadError::InvalidFilename(filename.to_string())),
        }
    }

    if !pushed {
        return Err(DownloadError::InvalidFilename(filename.to_string()));
    }
    Ok(resolved)
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    target.with_file_name(name)
}
