use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use super::downloader::Downloader;
use super::error::BackendError;
use super::platform::Backend;
use super::process::{discard_partial, find_media_file, run_tool};

/// youtube-dl, kept as a fallback for sites where the older extractors
/// still work after a yt-dlp regression.
pub struct YoutubeDlDownloader {
    max_total_size: u64,
}

impl YoutubeDlDownloader {
    pub fn new(max_total_size: u64) -> Self {
        Self { max_total_size }
    }
}

#[async_trait]
impl Downloader for YoutubeDlDownloader {
    fn kind(&self) -> Backend {
        Backend::YoutubeDl
    }

    fn name(&self) -> &'static str {
        "youtube-dl"
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        timeout: Duration,
    ) -> Result<PathBuf, BackendError> {
        let template = dest.join("%(title)s.%(ext)s");
        let args = download_args(url, &template, self.max_total_size);
        if let Err(err) = run_tool("youtube-dl", &args, timeout).await {
            discard_partial(dest).await;
            return Err(err);
        }

        match find_media_file(dest).await {
            Ok(Some(path)) => Ok(path),
            Ok(None) => {
                discard_partial(dest).await;
                Err(BackendError::Rejected(
                    "youtube-dl reported success but produced no media file".to_string(),
                ))
            }
            Err(err) => {
                discard_partial(dest).await;
                Err(BackendError::Io(err))
            }
        }
    }
}

fn download_args(url: &str, template: &Path, max_filesize: u64) -> Vec<String> {
    vec![
        "-f".to_string(),
        "best[height<=720]".to_string(),
        "--max-filesize".to_string(),
        max_filesize.to_string(),
        "-o".to_string(),
        template.display().to_string(),
        "--no-playlist".to_string(),
        url.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_args() {
        let args = download_args("https://youtu.be/x", Path::new("/w/%(title)s.%(ext)s"), 4096);
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.contains(&"best[height<=720]".to_string()));
        assert!(args.contains(&"4096".to_string()));
        assert_eq!(args.last().unwrap(), "https://youtu.be/x");
    }
}
