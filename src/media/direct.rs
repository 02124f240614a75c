use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, USER_AGENT,
};
use tokio::io::AsyncWriteExt;
use tracing::warn;
use url::Url;

use super::downloader::Downloader;
use super::error::BackendError;
use super::platform::{is_video_path, Backend};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Plain HTTP fetch of the URL itself. The enhanced variant sends a
/// browser-like header set and insists on a media payload; the basic
/// variant is the bare last resort.
pub struct DirectDownloader {
    client: reqwest::Client,
    headers: HeaderMap,
    kind: Backend,
    max_total_size: u64,
}

impl DirectDownloader {
    pub fn enhanced(max_total_size: u64) -> reqwest::Result<Self> {
        Self::new(Backend::DirectEnhanced, enhanced_headers(), max_total_size)
    }

    pub fn basic(max_total_size: u64) -> reqwest::Result<Self> {
        Self::new(Backend::DirectBasic, basic_headers(), max_total_size)
    }

    fn new(kind: Backend, headers: HeaderMap, max_total_size: u64) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            headers,
            kind,
            max_total_size,
        })
    }

    async fn fetch(&self, url: &str, target: &Path) -> Result<(), BackendError> {
        // Cheap rejection up front when the server reports a length.
        if let Ok(head) = self
            .client
            .head(url)
            .headers(self.headers.clone())
            .send()
            .await
        {
            if let Some(length) = head.content_length() {
                if length > self.max_total_size {
                    return Err(BackendError::TooLarge {
                        size: length,
                        limit: self.max_total_size,
                    });
                }
            }
        }

        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::Rejected(format!(
                "HTTP {}",
                response.status()
            )));
        }

        if self.kind == Backend::DirectEnhanced {
            if let Some(content_type) = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
            {
                if !is_media_content_type(content_type) {
                    return Err(BackendError::Rejected(format!(
                        "expected a media payload, got {content_type}"
                    )));
                }
            }
        }

        if let Some(length) = response.content_length() {
            if length > self.max_total_size {
                return Err(BackendError::TooLarge {
                    size: length,
                    limit: self.max_total_size,
                });
            }
        }

        let mut file = tokio::fs::File::create(target).await?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.max_total_size {
                return Err(BackendError::TooLarge {
                    size: written,
                    limit: self.max_total_size,
                });
            }
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Downloader for DirectDownloader {
    fn kind(&self) -> Backend {
        self.kind
    }

    fn name(&self) -> &'static str {
        match self.kind {
            Backend::DirectEnhanced => "enhanced-direct",
            _ => "direct",
        }
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        timeout: Duration,
    ) -> Result<PathBuf, BackendError> {
        let target = dest.join(filename_from_url(url));

        let result = match tokio::time::timeout(timeout, self.fetch(url, &target)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(timeout)),
        };

        match result {
            Ok(()) => Ok(target),
            Err(err) => {
                if let Err(io_err) = tokio::fs::remove_file(&target).await {
                    if io_err.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            "Failed to remove partial file {}: {}",
                            target.display(),
                            io_err
                        );
                    }
                }
                Err(err)
            }
        }
    }
}

fn enhanced_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ),
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "video/webm,video/ogg,video/*;q=0.9,application/ogg;q=0.7,audio/*;q=0.6,*/*;q=0.5",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("video"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("no-cors"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("cross-site"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers
}

fn basic_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
        ),
    );
    headers
}

fn is_media_content_type(value: &str) -> bool {
    let essence = value
        .split(';')
        .next()
        .unwrap_or(value)
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("video/")
        || essence.starts_with("audio/")
        || essence.starts_with("binary/")
        || essence == "application/octet-stream"
        || essence == "application/ogg"
}

/// Filename for a direct download, taken from the URL path. Anything
/// without a recognized video extension gets `.mp4` appended so the result
/// survives the output scan and the upload keeps a sensible name.
fn filename_from_url(url: &str) -> String {
    let name = Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.last().map(str::to_string))
        })
        .unwrap_or_default();

    if name.is_empty() {
        return "video.mp4".to_string();
    }
    if is_video_path(Path::new(&name)) {
        name
    } else {
        format!("{name}.mp4")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://example.com/video.mp4"),
            "video.mp4"
        );
        assert_eq!(
            filename_from_url("https://example.com/a/b/clip.mov?sig=abc"),
            "clip.mov"
        );
        assert_eq!(filename_from_url("https://example.com/watch"), "watch.mp4");
        assert_eq!(filename_from_url("https://example.com/"), "video.mp4");
        assert_eq!(filename_from_url("not a url"), "video.mp4");
    }

    #[test]
    fn test_is_media_content_type() {
        assert!(is_media_content_type("video/mp4"));
        assert!(is_media_content_type("Video/MP4"));
        assert!(is_media_content_type("audio/mpeg"));
        assert!(is_media_content_type("application/octet-stream"));
        assert!(is_media_content_type("video/webm; codecs=vp9"));
        assert!(!is_media_content_type("text/html; charset=utf-8"));
        assert!(!is_media_content_type("application/json"));
    }

    #[test]
    fn test_enhanced_headers_mimic_a_browser() {
        let headers = enhanced_headers();
        assert!(headers
            .get(USER_AGENT)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("Chrome/120"));
        assert!(headers
            .get(ACCEPT)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("video/"));
        assert_eq!(headers.get("Sec-Fetch-Dest").unwrap(), "video");
    }

    #[test]
    fn test_basic_headers_are_minimal() {
        let headers = basic_headers();
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(USER_AGENT));
    }
}
