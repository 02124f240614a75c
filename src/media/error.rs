use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::types::DownloadAttempt;

/// Failure of a single backend invocation. Recorded per attempt; never
/// aborts the fallback chain on its own.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0} is not installed or not executable")]
    Unavailable(&'static str),

    #[error("no result within {}s", .0.as_secs())]
    Timeout(Duration),

    /// The external tool or remote service refused the request.
    #[error("{0}")]
    Rejected(String),

    #[error("content is {size} bytes, over the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure of a whole request. The only errors that cross the download
/// layer's boundary.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("every download method failed for {url}")]
    Exhausted {
        url: String,
        attempts: Vec<DownloadAttempt>,
    },

    /// The download itself worked; preparing the file for delivery did not.
    #[error("failed to prepare {path} for delivery")]
    PostProcess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
