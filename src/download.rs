//! Dataset file downloading
//!
//! This module provides async downloading of annotation files and sample media
//! with progress reporting and atomic writes (`<file>.part` → final path).

use crate::cache::DatasetCache;
use crate::error::{Result, ZooError};
use futures::stream::{self, StreamExt, TryStreamExt};
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// Per-request timeout for dataset downloads
const DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Dataset file downloader
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
}

/// A single media file to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    /// Source URL
    pub url: String,
    /// Destination path
    pub path: PathBuf,
}

/// Outcome of a batch download
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadStats {
    /// Files fetched over the network
    pub downloaded: usize,
    /// Files already present in the cache
    pub cached: usize,
    /// Bytes written
    pub bytes: u64,
}

/// Progress bar abstraction that works with and without CLI features
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    /// Progress indicator measuring bytes of a single file
    #[must_use]
    pub fn for_bytes() -> Self {
        #[cfg(feature = "cli")]
        {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Self::Indicatif(pb)
        }
        #[cfg(not(feature = "cli"))]
        {
            Self::NoOp
        }
    }

    /// Progress indicator counting files out of `total`
    #[must_use]
    pub fn for_files(total: u64) -> Self {
        #[cfg(feature = "cli")]
        {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Self::Indicatif(pb)
        }
        #[cfg(not(feature = "cli"))]
        {
            let _ = total;
            Self::NoOp
        }
    }

    /// Set message for progress indicator
    pub fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {},
        }
    }

    /// Set length for progress indicator
    pub fn set_length(&self, len: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_length(len),
            Self::NoOp => {},
        }
    }

    /// Set position for progress indicator
    pub fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {},
        }
    }

    /// Advance progress indicator
    pub fn inc(&self, delta: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.inc(delta),
            Self::NoOp => {},
        }
    }

    /// Finish progress indicator with message
    pub fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {},
        }
    }
}

impl Downloader {
    /// Create a new downloader
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| ZooError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client })
    }

    /// Download `url` to `local_path` unless a cached copy already exists
    ///
    /// # Returns
    /// `true` if the file was downloaded, `false` on a cache hit
    ///
    /// # Errors
    /// - Network errors during download
    /// - File system errors while writing
    pub async fn fetch_cached(
        &self,
        url: &str,
        local_path: &Path,
        progress: Option<&ProgressIndicator>,
    ) -> Result<bool> {
        if DatasetCache::is_file_cached(local_path) {
            log::debug!("Cache hit: {}", local_path.display());
            return Ok(false);
        }

        log::info!("Downloading {}", url);
        self.download_file(url, local_path, progress).await?;
        Ok(true)
    }

    /// Download a batch of files with at most `workers` requests in flight
    ///
    /// Files already cached are skipped. The first failure aborts the batch.
    ///
    /// # Errors
    /// - Network or file system errors from any job
    pub async fn download_many(
        &self,
        jobs: Vec<DownloadJob>,
        workers: usize,
        show_progress: bool,
    ) -> Result<DownloadStats> {
        let (cached, pending): (Vec<_>, Vec<_>) = jobs
            .into_iter()
            .partition(|job| DatasetCache::is_file_cached(&job.path));

        let mut stats = DownloadStats {
            cached: cached.len(),
            ..DownloadStats::default()
        };

        if pending.is_empty() {
            log::debug!("All {} media files already cached", stats.cached);
            return Ok(stats);
        }

        let progress = if show_progress {
            ProgressIndicator::for_files(pending.len() as u64)
        } else {
            ProgressIndicator::NoOp
        };
        progress.set_message("Downloading media".to_string());

        let written: Vec<u64> = stream::iter(pending)
            .map(|job| {
                let progress = &progress;
                async move {
                    let bytes = self.download_file(&job.url, &job.path, None).await?;
                    progress.inc(1);
                    Ok::<u64, ZooError>(bytes)
                }
            })
            .buffer_unordered(workers.max(1))
            .try_collect()
            .await
            .map_err(|e| {
                progress.finish_with_message("❌ Media download failed".to_string());
                e
            })?;

        stats.downloaded = written.len();
        stats.bytes = written.iter().sum();

        progress.finish_with_message(format!("✅ Downloaded {} media files", stats.downloaded));
        Ok(stats)
    }

    /// Download a single file with progress reporting
    ///
    /// Data is streamed to `<local_path>.part` and renamed on success, so a
    /// partially written file is never mistaken for a cached one.
    ///
    /// # Returns
    /// Number of bytes written
    ///
    /// # Errors
    /// - Network errors or non-success HTTP status
    /// - File system errors while writing
    pub async fn download_file(
        &self,
        url: &str,
        local_path: &Path,
        progress: Option<&ProgressIndicator>,
    ) -> Result<u64> {
        log::debug!("Downloading: {} -> {}", url, local_path.display());

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ZooError::file_io_error("create directory", parent, &e))?;
        }

        let part_path = Self::part_path(local_path);
        match self.stream_to_file(url, &part_path, progress).await {
            Ok(downloaded) => {
                fs::rename(&part_path, local_path).map_err(|e| {
                    ZooError::file_io_error("move downloaded file into place", local_path, &e)
                })?;

                log::debug!(
                    "Downloaded {} bytes to {}",
                    downloaded,
                    local_path.display()
                );
                Ok(downloaded)
            },
            Err(e) => {
                if part_path.exists() {
                    if let Err(cleanup_err) = fs::remove_file(&part_path) {
                        log::warn!("Failed to cleanup partial download: {}", cleanup_err);
                    }
                }
                Err(e)
            },
        }
    }

    async fn stream_to_file(
        &self,
        url: &str,
        part_path: &Path,
        progress: Option<&ProgressIndicator>,
    ) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ZooError::network_error(format!("Failed to download {}", url), e))?;

        if !response.status().is_success() {
            return Err(ZooError::network_error(
                format!("HTTP error {} for {}", response.status(), url),
                std::io::Error::new(std::io::ErrorKind::Other, "HTTP error"),
            ));
        }

        let total_size = response.content_length();
        if let (Some(pb), Some(total)) = (progress, total_size) {
            pb.set_length(total);
        }

        let mut file = tokio::fs::File::create(part_path)
            .await
            .map_err(|e| ZooError::file_io_error("create file", part_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut downloaded = 0u64;
        let mut buffer = vec![0; 64 * 1024];

        loop {
            let bytes_read = tokio::io::AsyncReadExt::read(&mut stream, &mut buffer)
                .await
                .map_err(|e| ZooError::network_error("Failed to read download stream", e))?;

            if bytes_read == 0 {
                break;
            }

            file.write_all(buffer.get(..bytes_read).unwrap_or(&[]))
                .await
                .map_err(|e| ZooError::file_io_error("write to file", part_path, &e))?;

            downloaded += bytes_read as u64;

            if let Some(pb) = progress {
                if total_size.is_some() {
                    pb.set_position(downloaded);
                } else {
                    pb.set_message(format!(
                        "Downloaded {:.1} MB",
                        downloaded as f64 / 1_048_576.0
                    ));
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| ZooError::file_io_error("flush file", part_path, &e))?;

        Ok(downloaded)
    }

    fn part_path(local_path: &Path) -> PathBuf {
        let mut name = local_path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".part");
        local_path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_part_path() {
        assert_eq!(
            Downloader::part_path(Path::new("/cache/data/0001.jpg")),
            PathBuf::from("/cache/data/0001.jpg.part")
        );
        assert_eq!(
            Downloader::part_path(Path::new("labels.csv")),
            PathBuf::from("labels.csv.part")
        );
    }

    #[tokio::test]
    async fn test_downloader_creation() {
        let _downloader = Downloader::new().expect("Should create downloader successfully");
    }

    #[tokio::test]
    async fn test_fetch_cached_skips_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("classes.csv");
        fs::write(&path, "LabelName,DisplayName\n").unwrap();

        let downloader = Downloader::new().unwrap();
        // Unroutable URL: a cache hit must not touch the network
        let downloaded = downloader
            .fetch_cached("http://127.0.0.1:9/classes.csv", &path, None)
            .await
            .unwrap();
        assert!(!downloaded);
    }

    #[tokio::test]
    async fn test_download_many_all_cached() {
        let temp_dir = TempDir::new().unwrap();
        let mut jobs = Vec::new();
        for id in ["a", "b"] {
            let path = temp_dir.path().join(format!("{id}.jpg"));
            fs::write(&path, [0xFF, 0xD8]).unwrap();
            jobs.push(DownloadJob {
                url: format!("http://127.0.0.1:9/{id}.jpg"),
                path,
            });
        }

        let downloader = Downloader::new().unwrap();
        let stats = downloader.download_many(jobs, 4, false).await.unwrap();
        assert_eq!(
            stats,
            DownloadStats {
                downloaded: 0,
                cached: 2,
                bytes: 0
            }
        );
    }

    #[tokio::test]
    async fn test_download_file_failure_leaves_no_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.csv");

        let downloader = Downloader::new().unwrap();
        let result = downloader
            .download_file("http://127.0.0.1:9/missing.csv", &path, None)
            .await;

        assert!(matches!(result, Err(ZooError::Network { .. })));
        assert!(!path.exists());
        assert!(!Downloader::part_path(&path).exists());
    }

    #[test]
    fn test_progress_indicator_no_op() {
        let progress = ProgressIndicator::NoOp;

        progress.set_message("test message".to_string());
        progress.set_length(100);
        progress.set_position(50);
        progress.inc(1);
        progress.finish_with_message("finished".to_string());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_progress_indicator_with_indicatif() {
        let progress = ProgressIndicator::for_files(10);
        progress.inc(3);
        progress.set_message("test message".to_string());
        progress.finish_with_message("finished".to_string());

        let progress = ProgressIndicator::for_bytes();
        progress.set_length(2048);
        progress.set_position(1024);
        progress.finish_with_message("finished".to_string());
    }
}
