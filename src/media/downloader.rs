use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use super::error::BackendError;
use super::platform::Backend;

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Strategy this downloader implements.
    fn kind(&self) -> Backend;

    /// Human-readable name of the downloader
    fn name(&self) -> &'static str;

    /// Fetch `url` into the `dest` directory and return the path of the
    /// produced file. On failure nothing may be left under `dest`, so the
    /// next backend in the chain starts clean.
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        timeout: Duration,
    ) -> Result<PathBuf, BackendError>;
}
