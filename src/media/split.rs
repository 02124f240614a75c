use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;

/// One contiguous byte range of a split file. Indices are 1-based and
/// contiguous; concatenating parts in index order reproduces the source
/// exactly.
#[derive(Debug)]
pub struct FilePart {
    pub path: PathBuf,
    pub index: usize,
    pub len: u64,
}

/// Splits `path` into parts of exactly `max_part_bytes`, with the
/// remainder in the final part. A file at or under the limit (including an
/// empty one) is returned as a single part pointing at the source itself.
/// Streams through a bounded buffer, so the file never has to fit in
/// memory.
pub async fn split_file(
    path: &Path,
    max_part_bytes: u64,
    io_chunk: usize,
) -> Result<Vec<FilePart>, Error> {
    if max_part_bytes == 0 {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "part size must be at least one byte",
        ));
    }

    let total = tokio::fs::metadata(path).await?.len();
    if total <= max_part_bytes {
        return Ok(vec![FilePart {
            path: path.to_path_buf(),
            index: 1,
            len: total,
        }]);
    }

    let mut source = File::open(path).await?;
    let mut buf = vec![0u8; io_chunk.max(1)];
    let mut parts = Vec::with_capacity(total.div_ceil(max_part_bytes) as usize);
    let mut remaining = total;
    let mut index = 1;

    while remaining > 0 {
        let part_len = remaining.min(max_part_bytes);
        let part_path = part_path(path, index);
        let mut out = File::create(&part_path).await?;

        let mut left = part_len;
        while left > 0 {
            let want = (left as usize).min(buf.len());
            let read = source.read(&mut buf[..want]).await?;
            if read == 0 {
                return Err(Error::new(
                    ErrorKind::UnexpectedEof,
                    "source file shrank while splitting",
                ));
            }
            out.write_all(&buf[..read]).await?;
            left -= read as u64;
        }
        out.flush().await?;

        parts.push(FilePart {
            path: part_path,
            index,
            len: part_len,
        });
        remaining -= part_len;
        index += 1;
    }

    info!(
        "Split {} ({} bytes) into {} parts",
        path.display(),
        total,
        parts.len()
    );
    Ok(parts)
}

fn part_path(source: &Path, index: usize) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("part");
    let name = match source.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{stem}_part{index:03}.{ext}"),
        None => format!("{stem}_part{index:03}"),
    };
    source.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    async fn split_fixture(content: &[u8], max_part_bytes: u64) -> (tempfile::TempDir, Vec<FilePart>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.mp4");
        std::fs::write(&path, content).unwrap();
        let parts = split_file(&path, max_part_bytes, 1024).await.unwrap();
        (dir, parts)
    }

    #[tokio::test]
    async fn test_small_file_is_a_single_part() {
        let (_dir, parts) = split_fixture(&pattern_bytes(100), 1000).await;
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].index, 1);
        assert_eq!(parts[0].len, 100);
        assert!(parts[0].path.ends_with("video.mp4"));
    }

    #[tokio::test]
    async fn test_size_equal_to_limit_is_a_single_part() {
        let (_dir, parts) = split_fixture(&pattern_bytes(1000), 1000).await;
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].len, 1000);
    }

    #[tokio::test]
    async fn test_empty_file_is_a_single_part() {
        let (_dir, parts) = split_fixture(&[], 1000).await;
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].len, 0);
    }

    #[tokio::test]
    async fn test_exact_multiple_splits_evenly() {
        let (_dir, parts) = split_fixture(&pattern_bytes(3000), 1000).await;
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|part| part.len == 1000));
    }

    #[tokio::test]
    async fn test_remainder_goes_to_the_last_part() {
        // 120 units against a 50 unit limit: 50 + 50 + 20
        let (_dir, parts) = split_fixture(&pattern_bytes(120 * 1024), 50 * 1024).await;
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len, 50 * 1024);
        assert_eq!(parts[1].len, 50 * 1024);
        assert_eq!(parts[2].len, 20 * 1024);
        assert_eq!(
            parts.iter().map(|part| part.index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn test_concatenated_parts_reproduce_the_source() {
        let content = pattern_bytes(2500);
        let (_dir, parts) = split_fixture(&content, 1000).await;

        let mut rebuilt = Vec::new();
        for part in &parts {
            let bytes = std::fs::read(&part.path).unwrap();
            assert_eq!(bytes.len() as u64, part.len);
            rebuilt.extend(bytes);
        }
        assert_eq!(rebuilt, content);
    }

    #[tokio::test]
    async fn test_part_naming() {
        let (_dir, parts) = split_fixture(&pattern_bytes(2500), 1000).await;
        let names: Vec<_> = parts
            .iter()
            .map(|part| part.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["video_part001.mp4", "video_part002.mp4", "video_part003.mp4"]
        );
    }

    #[tokio::test]
    async fn test_zero_part_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.mp4");
        std::fs::write(&path, b"data").unwrap();
        let err = split_file(&path, 0, 1024).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
