use std::path::PathBuf;
use std::time::Duration;

use super::error::{BackendError, DownloadError};
use super::platform::{Backend, Platform};

/// Record of one backend invocation inside a fallback chain.
#[derive(Debug)]
pub struct DownloadAttempt {
    pub backend: Backend,
    pub elapsed: Duration,
    pub outcome: Result<PathBuf, BackendError>,
}

impl DownloadAttempt {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn diagnostic(&self) -> Option<String> {
        self.outcome.as_ref().err().map(|err| err.to_string())
    }
}

/// Terminal record of one URL request: every attempt that was made, plus
/// the output path when one of them succeeded.
#[derive(Debug)]
pub struct DownloadResult {
    pub url: String,
    pub platform: Platform,
    pub attempts: Vec<DownloadAttempt>,
    pub output: Option<PathBuf>,
}

impl DownloadResult {
    pub fn into_output(self) -> Result<PathBuf, DownloadError> {
        match self.output {
            Some(path) => Ok(path),
            None => Err(DownloadError::Exhausted {
                url: self.url,
                attempts: self.attempts,
            }),
        }
    }
}
