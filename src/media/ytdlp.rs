use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::downloader::Downloader;
use super::error::BackendError;
use super::platform::Backend;
use super::process::{discard_partial, find_media_file, run_tool};

const METADATA_TIMEOUT: Duration = Duration::from_secs(30);

/// Primary downloader for every platform chain except Instagram's head.
pub struct YtDlpDownloader {
    max_total_size: u64,
}

impl YtDlpDownloader {
    pub fn new(max_total_size: u64) -> Self {
        Self { max_total_size }
    }

    /// Asks yt-dlp for the file size before downloading. `None` when the
    /// extractor does not report one up front.
    async fn probe_size(&self, url: &str) -> Result<Option<u64>, BackendError> {
        let args = metadata_args(url);
        let output = run_tool("yt-dlp", &args, METADATA_TIMEOUT).await?;

        let json: Value = serde_json::from_slice(&output.stdout)
            .map_err(|err| BackendError::Rejected(format!("yt-dlp metadata was not JSON: {err}")))?;

        Ok(json["filesize"]
            .as_u64()
            .or_else(|| json["filesize_approx"].as_u64()))
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    fn kind(&self) -> Backend {
        Backend::YtDlp
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        timeout: Duration,
    ) -> Result<PathBuf, BackendError> {
        match self.probe_size(url).await {
            Ok(Some(size)) if size > self.max_total_size => {
                return Err(BackendError::TooLarge {
                    size,
                    limit: self.max_total_size,
                });
            }
            Ok(_) => {}
            Err(err @ BackendError::Unavailable(_)) => return Err(err),
            // The probe is advisory; the download below is the real test.
            Err(err) => debug!("yt-dlp metadata probe failed: {}", err),
        }

        let template = dest.join("%(title)s.%(ext)s");
        let args = download_args(url, &template, self.max_total_size);
        if let Err(err) = run_tool("yt-dlp", &args, timeout).await {
            discard_partial(dest).await;
            return Err(err);
        }

        match find_media_file(dest).await {
            Ok(Some(path)) => Ok(path),
            Ok(None) => {
                discard_partial(dest).await;
                Err(BackendError::Rejected(
                    "yt-dlp reported success but produced no media file".to_string(),
                ))
            }
            Err(err) => {
                discard_partial(dest).await;
                Err(BackendError::Io(err))
            }
        }
    }
}

fn metadata_args(url: &str) -> Vec<String> {
    vec![
        "--dump-json".to_string(),
        "--no-download".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        url.to_string(),
    ]
}

fn download_args(url: &str, template: &Path, max_filesize: u64) -> Vec<String> {
    vec![
        // 720p cap keeps files small enough to deliver in sane time
        "--format".to_string(),
        "best[height<=720]".to_string(),
        "--max-filesize".to_string(),
        max_filesize.to_string(),
        "--output".to_string(),
        template.display().to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        url.to_string(),
    ]
}
