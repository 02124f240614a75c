mod capabilities;
mod direct;
mod downloader;
mod error;
mod instaloader;
mod platform;
mod process;
mod split;
mod types;
mod workspace;
mod ytdlp;
mod youtubedl;

pub use capabilities::ToolCapabilities;
pub use downloader::Downloader;
pub use error::{BackendError, DownloadError};
pub use platform::{Backend, Platform};
pub use split::{split_file, FilePart};
pub use types::{DownloadAttempt, DownloadResult};
pub use workspace::Workspace;

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use direct::DirectDownloader;
use instaloader::InstaloaderDownloader;
use ytdlp::YtDlpDownloader;
use youtubedl::YoutubeDlDownloader;

/// Drives the per-platform fallback chain: classify the URL, then try each
/// backend in order until one produces a file. Strictly sequential; racing
/// backends against the same source just burns rate limits.
pub struct MediaDownloader {
    backends: Vec<Box<dyn Downloader>>,
    capabilities: ToolCapabilities,
    timeout: Duration,
}

impl MediaDownloader {
    pub fn new(config: &Config, capabilities: ToolCapabilities) -> Result<Self> {
        let backends: Vec<Box<dyn Downloader>> = vec![
            Box::new(YtDlpDownloader::new(config.max_total_size)),
            Box::new(YoutubeDlDownloader::new(config.max_total_size)),
            Box::new(InstaloaderDownloader::new()),
            Box::new(
                DirectDownloader::enhanced(config.max_total_size)
                    .context("Failed to build enhanced direct downloader")?,
            ),
            Box::new(
                DirectDownloader::basic(config.max_total_size)
                    .context("Failed to build basic direct downloader")?,
            ),
        ];

        Ok(Self {
            backends,
            capabilities,
            timeout: config.download_timeout(),
        })
    }

    #[cfg(test)]
    fn with_backends(
        backends: Vec<Box<dyn Downloader>>,
        capabilities: ToolCapabilities,
        timeout: Duration,
    ) -> Self {
        Self {
            backends,
            capabilities,
            timeout,
        }
    }

    fn backend(&self, kind: Backend) -> Option<&dyn Downloader> {
        self.backends
            .iter()
            .find(|backend| backend.kind() == kind)
            .map(|backend| backend.as_ref())
    }

    /// Runs the whole chain for one URL. Every attempt is recorded; the
    /// first success short-circuits. An exhausted chain is a result, not a
    /// crash: the caller decides how to surface it.
    pub async fn download(&self, url: &str, workspace: &Path) -> DownloadResult {
        let platform = Platform::classify(url);
        let chain = platform.fallback_chain();
        info!(
            "Detected platform {} for {} ({} methods to try)",
            platform,
            url,
            chain.len()
        );

        let mut attempts = Vec::with_capacity(chain.len());

        for (index, kind) in chain.iter().copied().enumerate() {
            if kind.is_tool() && !self.capabilities.has(kind) {
                warn!("{} is not available, skipping", kind);
                attempts.push(DownloadAttempt {
                    backend: kind,
                    elapsed: Duration::ZERO,
                    outcome: Err(BackendError::Unavailable(kind.as_str())),
                });
                continue;
            }

            let Some(backend) = self.backend(kind) else {
                continue;
            };

            let dest = workspace.join(format!("attempt-{index}"));
            let started = Instant::now();
            let outcome = match tokio::fs::create_dir_all(&dest).await {
                Ok(()) => backend.download(url, &dest, self.timeout).await,
                Err(err) => Err(BackendError::Io(err)),
            };
            let elapsed = started.elapsed();

            match outcome {
                Ok(path) => {
                    info!(
                        "{} succeeded in {:.1}s: {}",
                        backend.name(),
                        elapsed.as_secs_f64(),
                        path.display()
                    );
                    attempts.push(DownloadAttempt {
                        backend: kind,
                        elapsed,
                        outcome: Ok(path.clone()),
                    });
                    return DownloadResult {
                        url: url.to_string(),
                        platform,
                        attempts,
                        output: Some(path),
                    };
                }
                Err(err) => {
                    warn!("{} failed: {}", backend.name(), err);
                    attempts.push(DownloadAttempt {
                        backend: kind,
                        elapsed,
                        outcome: Err(err),
                    });
                }
            }
        }

        DownloadResult {
            url: url.to_string(),
            platform,
            attempts,
            output: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockDownloader {
        kind: Backend,
        succeed: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Downloader for MockDownloader {
        fn kind(&self) -> Backend {
            self.kind
        }

        fn name(&self) -> &'static str {
            self.kind.as_str()
        }

        async fn download(
            &self,
            _url: &str,
            dest: &Path,
            _timeout: Duration,
        ) -> Result<PathBuf, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(dest.join("video.mp4"))
            } else {
                Err(BackendError::Rejected("mock refused the request".into()))
            }
        }
    }

    fn mock_set(
        specs: &[(Backend, bool)],
        capabilities: ToolCapabilities,
    ) -> (MediaDownloader, HashMap<Backend, Arc<AtomicUsize>>) {
        let mut counters = HashMap::new();
        let mut backends: Vec<Box<dyn Downloader>> = Vec::new();
        for (kind, succeed) in specs {
            let calls = Arc::new(AtomicUsize::new(0));
            counters.insert(*kind, calls.clone());
            backends.push(Box::new(MockDownloader {
                kind: *kind,
                succeed: *succeed,
                calls,
            }));
        }
        (
            MediaDownloader::with_backends(backends, capabilities, Duration::from_secs(1)),
            counters,
        )
    }

    fn all_backends(succeed: impl Fn(Backend) -> bool) -> Vec<(Backend, bool)> {
        [
            Backend::YtDlp,
            Backend::YoutubeDl,
            Backend::Instaloader,
            Backend::DirectEnhanced,
            Backend::DirectBasic,
        ]
        .into_iter()
        .map(|kind| (kind, succeed(kind)))
        .collect()
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let specs = all_backends(|_| true);
        let (downloader, counters) = mock_set(&specs, ToolCapabilities::all());
        let workspace = tempfile::tempdir().unwrap();

        let result = downloader
            .download("https://youtube.com/watch?v=X", workspace.path())
            .await;

        assert!(result.output.is_some());
        assert_eq!(result.platform, Platform::YouTube);
        assert_eq!(result.attempts.len(), 1);
        assert!(result.attempts[0].succeeded());
        assert_eq!(counters[&Backend::YtDlp].load(Ordering::SeqCst), 1);
        assert_eq!(counters[&Backend::YoutubeDl].load(Ordering::SeqCst), 0);
        assert_eq!(counters[&Backend::DirectEnhanced].load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_after_first_failure() {
        let specs = all_backends(|kind| kind != Backend::Instaloader);
        let (downloader, counters) = mock_set(&specs, ToolCapabilities::all());
        let workspace = tempfile::tempdir().unwrap();

        let result = downloader
            .download("https://instagram.com/p/Y", workspace.path())
            .await;

        assert!(result.output.is_some());
        assert_eq!(result.attempts.len(), 2);
        assert!(!result.attempts[0].succeeded());
        assert!(result.attempts[1].succeeded());
        assert_eq!(result.attempts[0].backend, Backend::Instaloader);
        assert_eq!(result.attempts[1].backend, Backend::YtDlp);
        assert_eq!(counters[&Backend::Instaloader].load(Ordering::SeqCst), 1);
        assert_eq!(counters[&Backend::YtDlp].load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_chain_records_every_attempt() {
        let specs = all_backends(|_| false);
        let (downloader, counters) = mock_set(&specs, ToolCapabilities::all());
        let workspace = tempfile::tempdir().unwrap();

        let url = "https://tiktok.com/@user/video/1";
        let result = downloader.download(url, workspace.path()).await;

        let chain_len = Platform::TikTok.fallback_chain().len();
        assert!(result.output.is_none());
        assert_eq!(result.attempts.len(), chain_len);
        for attempt in &result.attempts {
            assert!(!attempt.diagnostic().unwrap().is_empty());
        }
        // each backend in the chain was invoked exactly once
        assert_eq!(counters[&Backend::YtDlp].load(Ordering::SeqCst), 1);
        assert_eq!(counters[&Backend::DirectEnhanced].load(Ordering::SeqCst), 1);

        let err = result.into_output().unwrap_err();
        assert!(matches!(err, DownloadError::Exhausted { .. }));
    }

    #[tokio::test]
    async fn test_missing_tool_is_recorded_without_being_invoked() {
        let specs = all_backends(|_| true);
        let capabilities = ToolCapabilities {
            yt_dlp: false,
            youtube_dl: true,
            instaloader: true,
        };
        let (downloader, counters) = mock_set(&specs, capabilities);
        let workspace = tempfile::tempdir().unwrap();

        let result = downloader
            .download("https://youtube.com/watch?v=X", workspace.path())
            .await;

        assert!(result.output.is_some());
        assert_eq!(result.attempts.len(), 2);
        assert!(matches!(
            result.attempts[0].outcome,
            Err(BackendError::Unavailable(_))
        ));
        assert_eq!(counters[&Backend::YtDlp].load(Ordering::SeqCst), 0);
        assert_eq!(counters[&Backend::YoutubeDl].load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_direct_file_chain_skips_the_tools() {
        let specs = all_backends(|_| false);
        let (downloader, counters) = mock_set(&specs, ToolCapabilities::all());
        let workspace = tempfile::tempdir().unwrap();

        let result = downloader
            .download("https://example.com/video.mp4", workspace.path())
            .await;

        assert_eq!(result.platform, Platform::DirectFile);
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(counters[&Backend::YtDlp].load(Ordering::SeqCst), 0);
        assert_eq!(counters[&Backend::DirectEnhanced].load(Ordering::SeqCst), 1);
        assert_eq!(counters[&Backend::DirectBasic].load(Ordering::SeqCst), 1);
    }
}
