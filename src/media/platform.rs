use std::fmt;
use std::path::Path;

use url::Url;

/// Originating service of a URL, derived from the host alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    YouTube,
    TikTok,
    Instagram,
    Twitter,
    Facebook,
    Vimeo,
    Dailymotion,
    Twitch,
    /// Not a known platform, but the path looks like a video file.
    DirectFile,
    Other,
}

/// One download strategy. A strategy, not a specific binary: the direct
/// variants differ only in the header set they send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    YtDlp,
    YoutubeDl,
    Instaloader,
    DirectEnhanced,
    DirectBasic,
}

/// Checked in order; a platform domain always wins over a video file
/// extension in the path, so `https://twitter.com/clip.mp4` classifies as
/// Twitter and the direct fetch still runs as that chain's fallback.
const DOMAINS: &[(&str, Platform)] = &[
    ("youtube.com", Platform::YouTube),
    ("youtu.be", Platform::YouTube),
    ("tiktok.com", Platform::TikTok),
    ("instagram.com", Platform::Instagram),
    ("twitter.com", Platform::Twitter),
    ("x.com", Platform::Twitter),
    ("facebook.com", Platform::Facebook),
    ("vimeo.com", Platform::Vimeo),
    ("dailymotion.com", Platform::Dailymotion),
    ("twitch.tv", Platform::Twitch),
];

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mov", "mkv", "webm", "flv", "wmv", "m4v", "3gp", "ogv",
];

pub(crate) fn is_video_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

impl Platform {
    /// Classifies a URL. Total: unparseable input is `Other`.
    pub fn classify(url: &str) -> Platform {
        let Ok(parsed) = Url::parse(url.trim()) else {
            return Platform::Other;
        };

        if let Some(host) = parsed.host_str() {
            let host = host.to_ascii_lowercase();
            for (domain, platform) in DOMAINS {
                if host_matches(&host, domain) {
                    return *platform;
                }
            }
        }

        if is_video_path(Path::new(parsed.path())) {
            Platform::DirectFile
        } else {
            Platform::Other
        }
    }

    /// Ordered downloader chain for this platform. First success wins.
    pub fn fallback_chain(self) -> &'static [Backend] {
        use Backend::*;

        match self {
            Platform::YouTube => &[YtDlp, YoutubeDl, DirectEnhanced],
            Platform::Instagram => &[Instaloader, YtDlp, DirectEnhanced],
            Platform::DirectFile => &[DirectEnhanced, DirectBasic],
            Platform::TikTok
            | Platform::Twitter
            | Platform::Facebook
            | Platform::Vimeo
            | Platform::Dailymotion
            | Platform::Twitch
            | Platform::Other => &[YtDlp, DirectEnhanced],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::TikTok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Vimeo => "vimeo",
            Platform::Dailymotion => "dailymotion",
            Platform::Twitch => "twitch",
            Platform::DirectFile => "direct-file",
            Platform::Other => "other",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::YtDlp => "yt-dlp",
            Backend::YoutubeDl => "youtube-dl",
            Backend::Instaloader => "instaloader",
            Backend::DirectEnhanced => "enhanced-direct",
            Backend::DirectBasic => "direct",
        }
    }

    /// Whether this strategy shells out to an external tool that may be
    /// missing from the host system.
    pub fn is_tool(self) -> bool {
        matches!(
            self,
            Backend::YtDlp | Backend::YoutubeDl | Backend::Instaloader
        )
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
