use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use super::downloader::Downloader;
use super::error::BackendError;
use super::platform::Backend;
use super::process::{discard_partial, find_media_file, run_tool};

/// Instagram-specific downloader, tried before yt-dlp on that platform.
pub struct InstaloaderDownloader;

impl InstaloaderDownloader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Downloader for InstaloaderDownloader {
    fn kind(&self) -> Backend {
        Backend::Instaloader
    }

    fn name(&self) -> &'static str {
        "instaloader"
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        timeout: Duration,
    ) -> Result<PathBuf, BackendError> {
        if let Err(err) = run_tool("instaloader", &download_args(url, dest), timeout).await {
            discard_partial(dest).await;
            return Err(err);
        }

        match find_media_file(dest).await {
            Ok(Some(path)) => Ok(path),
            Ok(None) => {
                discard_partial(dest).await;
                Err(BackendError::Rejected(
                    "instaloader reported success but produced no media file".to_string(),
                ))
            }
            Err(err) => {
                discard_partial(dest).await;
                Err(BackendError::Io(err))
            }
        }
    }
}

fn download_args(url: &str, dest: &Path) -> Vec<String> {
    vec![
        // videos only, none of the sidecar files
        "--no-pictures".to_string(),
        "--no-captions".to_string(),
        "--no-metadata-json".to_string(),
        "--dirname-pattern".to_string(),
        dest.display().to_string(),
        url.to_string(),
    ]
}
