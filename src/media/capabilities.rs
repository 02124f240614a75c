use super::platform::Backend;
use super::process::probe_version;

/// Which external tools are usable on this host. Probed once at startup and
/// injected into the downloader, so the fallback chain can skip a missing
/// tool without spawning anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolCapabilities {
    pub yt_dlp: bool,
    pub youtube_dl: bool,
    pub instaloader: bool,
}

impl ToolCapabilities {
    pub async fn probe() -> Self {
        Self {
            yt_dlp: probe_version("yt-dlp").await,
            youtube_dl: probe_version("youtube-dl").await,
            instaloader: probe_version("instaloader").await,
        }
    }

    /// Direct HTTP strategies are always usable.
    pub fn has(&self, backend: Backend) -> bool {
        match backend {
            Backend::YtDlp => self.yt_dlp,
            Backend::YoutubeDl => self.youtube_dl,
            Backend::Instaloader => self.instaloader,
            Backend::DirectEnhanced | Backend::DirectBasic => true,
        }
    }

    pub fn available_tools(&self) -> Vec<&'static str> {
        let mut tools = Vec::new();
        if self.yt_dlp {
            tools.push(Backend::YtDlp.as_str());
        }
        if self.youtube_dl {
            tools.push(Backend::YoutubeDl.as_str());
        }
        if self.instaloader {
            tools.push(Backend::Instaloader.as_str());
        }
        tools
    }

    #[cfg(test)]
    pub(crate) fn all() -> Self {
        Self {
            yt_dlp: true,
            youtube_dl: true,
            instaloader: true,
        }
    }
}
