use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use super::error::BackendError;
use super::platform::is_video_path;

/// Runs an external tool to completion, bounded by `timeout`. The child is
/// killed if the future is dropped, so a cancelled request does not leave
/// the process running.
pub(crate) async fn run_tool(
    tool: &'static str,
    args: &[String],
    timeout: Duration,
) -> Result<Output, BackendError> {
    debug!("{} {}", tool, args.join(" "));

    let mut command = Command::new(tool);
    command.args(args).kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Err(_) => return Err(BackendError::Timeout(timeout)),
        Ok(Err(err)) if err.kind() == ErrorKind::NotFound => {
            return Err(BackendError::Unavailable(tool))
        }
        Ok(Err(err)) => return Err(BackendError::Io(err)),
        Ok(Ok(output)) => output,
    };

    if output.status.success() {
        Ok(output)
    } else {
        Err(BackendError::Rejected(failure_detail(tool, &output)))
    }
}

/// Last non-empty stderr line, the part yt-dlp and friends put the actual
/// reason in.
fn failure_detail(tool: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    match stderr.lines().rev().find(|line| !line.trim().is_empty()) {
        Some(line) => format!("{} failed: {}", tool, line.trim()),
        None => format!("{} exited with {}", tool, output.status),
    }
}

/// `--version` probe used once at startup to build the capability table.
pub(crate) async fn probe_version(tool: &str) -> bool {
    match Command::new(tool).arg("--version").output().await {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version = stdout.lines().next().unwrap_or("unknown").trim();
            debug!("{} is available, version: {}", tool, version);
            true
        }
        Ok(_) => {
            warn!("{} is installed but not working", tool);
            false
        }
        Err(err) => {
            warn!("{} not found: {}", tool, err);
            false
        }
    }
}

/// Locates the media file a tool produced under `dir`. Checks one level of
/// subdirectories too, since instaloader nests its output.
pub(crate) async fn find_media_file(dir: &Path) -> Result<Option<PathBuf>, std::io::Error> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            let mut nested = tokio::fs::read_dir(&path).await?;
            while let Some(inner) = nested.next_entry().await? {
                let inner_path = inner.path();
                if inner.file_type().await?.is_file() && is_video_path(&inner_path) {
                    return Ok(Some(inner_path));
                }
            }
        } else if is_video_path(&path) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Drops whatever a failed attempt left behind so the next backend starts
/// from a clean destination.
pub(crate) async fn discard_partial(dest: &Path) {
    if let Err(err) = tokio::fs::remove_dir_all(dest).await {
        if err.kind() != ErrorKind::NotFound {
            warn!(
                "Failed to discard partial download in {}: {}",
                dest.display(),
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_media_file_top_level() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"x").unwrap();

        let found = find_media_file(dir.path()).await.unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "clip.mp4");
    }

    #[tokio::test]
    async fn test_find_media_file_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("account");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("post.mp4"), b"x").unwrap();

        let found = find_media_file(dir.path()).await.unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "post.mp4");
    }

    #[tokio::test]
    async fn test_find_media_file_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("metadata.json"), b"{}").unwrap();

        assert!(find_media_file(dir.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_discard_partial_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("attempt-0");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("half.mp4.part"), b"x").unwrap();

        discard_partial(&dest).await;
        assert!(!dest.exists());

        // a second call on a missing directory is quiet
        discard_partial(&dest).await;
    }
}
