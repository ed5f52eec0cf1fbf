//! Dataset cache management for downloaded annotations and media
//!
//! Datasets are cached in an XDG-compliant directory, one folder per zoo
//! dataset (and per mirror when a non-default mirror is used):
//!
//! ```text
//! <cache>/datasets/open-images-v7/
//!     metadata/classes.csv
//!     validation/labels/classifications.csv
//!     validation/data/<image id>.jpg
//! ```

use crate::error::{Result, ZooError};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "ZOOFETCH_CACHE_DIR";

/// Information about a cached dataset
#[derive(Debug, Clone)]
pub struct CachedDatasetInfo {
    /// Cache key (dataset name, optionally suffixed with a mirror hash)
    pub dataset_key: String,
    /// Path to the cached dataset directory
    pub path: PathBuf,
    /// Splits with cached labels or media
    pub splits: Vec<String>,
    /// Number of cached media files across all splits
    pub media_files: usize,
    /// Size of the dataset directory in bytes
    pub size_bytes: u64,
}

/// Dataset cache manager
#[derive(Debug, Clone)]
pub struct DatasetCache {
    cache_dir: PathBuf,
}

impl DatasetCache {
    /// Create a new dataset cache manager
    ///
    /// Uses the XDG Base Directory specification for the cache location:
    /// - Linux: `~/.cache/zoofetch/datasets/`
    /// - macOS: `~/Library/Caches/zoofetch/datasets/`
    /// - Windows: `%LOCALAPPDATA%/zoofetch/datasets/`
    ///
    /// # Errors
    /// - Failed to determine cache directory
    /// - Failed to create cache directory
    pub fn new() -> Result<Self> {
        let cache_dir = Self::get_cache_dir()?;

        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).map_err(|e| {
                ZooError::file_io_error("create cache directory", &cache_dir, &e)
            })?;
        }

        Ok(Self { cache_dir })
    }

    /// Create a cache rooted at a custom directory
    ///
    /// # Errors
    /// - Failed to create cache directory
    pub fn with_custom_cache_dir(cache_dir: &Path) -> Result<Self> {
        let datasets_dir = cache_dir.join("datasets");

        if !datasets_dir.exists() {
            fs::create_dir_all(&datasets_dir).map_err(|e| {
                ZooError::file_io_error("create custom cache directory", &datasets_dir, &e)
            })?;
        }

        Ok(Self {
            cache_dir: datasets_dir,
        })
    }

    fn get_cache_dir() -> Result<PathBuf> {
        if let Ok(cache_override) = std::env::var(CACHE_DIR_ENV) {
            return Ok(PathBuf::from(cache_override).join("datasets"));
        }

        Ok(dirs::cache_dir()
            .ok_or_else(|| {
                ZooError::invalid_config(format!(
                    "Failed to determine cache directory. Set {} environment variable.",
                    CACHE_DIR_ENV
                ))
            })?
            .join("zoofetch")
            .join("datasets"))
    }

    /// Cache key for a dataset served from `mirror_url`
    ///
    /// The default mirror maps to the bare dataset name; any other mirror gets a
    /// short hash suffix so mirrors never share cached files.
    ///
    /// # Examples
    /// ```
    /// use zoofetch::cache::DatasetCache;
    ///
    /// let key = DatasetCache::dataset_key("open-images-v7", "https://a", "https://a");
    /// assert_eq!(key, "open-images-v7");
    ///
    /// let key = DatasetCache::dataset_key("open-images-v7", "http://127.0.0.1:1234", "https://a");
    /// assert!(key.starts_with("open-images-v7-"));
    /// ```
    #[must_use]
    pub fn dataset_key(dataset: &str, mirror_url: &str, default_mirror: &str) -> String {
        if mirror_url.trim_end_matches('/') == default_mirror.trim_end_matches('/') {
            return dataset.to_string();
        }

        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(mirror_url.as_bytes());
        let hash_string = format!("{:x}", hasher.finalize());
        format!(
            "{}-{}",
            dataset,
            hash_string.get(..12).unwrap_or(&hash_string)
        )
    }

    /// Path to a dataset's cache directory (may not exist)
    #[must_use]
    pub fn dataset_path(&self, dataset_key: &str) -> PathBuf {
        self.cache_dir.join(dataset_key)
    }

    /// Whether a cached file exists and is non-empty
    #[must_use]
    pub fn is_file_cached(path: &Path) -> bool {
        fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
    }

    /// Scan the cache directory and describe every cached dataset
    ///
    /// # Errors
    /// - Failed to read cache directory
    pub fn scan_cached_datasets(&self) -> Result<Vec<CachedDatasetInfo>> {
        let mut datasets = Vec::new();

        if !self.cache_dir.exists() {
            return Ok(datasets);
        }

        let entries = fs::read_dir(&self.cache_dir).map_err(|e| {
            ZooError::file_io_error("read cache directory", &self.cache_dir, &e)
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                ZooError::file_io_error("read cache directory entry", &self.cache_dir, &e)
            })?;

            let path = entry.path();
            if path.is_dir() {
                datasets.push(Self::analyze_dataset_directory(&path)?);
            }
        }

        datasets.sort_by(|a, b| a.dataset_key.cmp(&b.dataset_key));
        Ok(datasets)
    }

    fn analyze_dataset_directory(dataset_path: &Path) -> Result<CachedDatasetInfo> {
        let dataset_key = dataset_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                ZooError::invalid_config(format!(
                    "Invalid dataset directory name: {}",
                    dataset_path.display()
                ))
            })?
            .to_string();

        let mut splits = Vec::new();
        let mut media_files = 0;
        if let Ok(entries) = fs::read_dir(dataset_path) {
            for entry in entries.flatten() {
                let split_path = entry.path();
                let labels_dir = split_path.join("labels");
                let data_dir = split_path.join("data");
                if !labels_dir.is_dir() && !data_dir.is_dir() {
                    continue;
                }

                if let Some(name) = entry.file_name().to_str() {
                    splits.push(name.to_string());
                }

                if let Ok(files) = fs::read_dir(&data_dir) {
                    media_files += files.flatten().filter(|f| f.path().is_file()).count();
                }
            }
        }
        splits.sort();

        let size_bytes = Self::calculate_directory_size(dataset_path).unwrap_or(0);

        Ok(CachedDatasetInfo {
            dataset_key,
            path: dataset_path.to_path_buf(),
            splits,
            media_files,
            size_bytes,
        })
    }

    fn calculate_directory_size(dir_path: &Path) -> Result<u64> {
        let mut total_size = 0;

        Self::visit_dir(dir_path, &mut total_size)
            .map_err(|e| ZooError::file_io_error("calculate directory size", dir_path, &e))?;

        Ok(total_size)
    }

    fn visit_dir(dir: &Path, total: &mut u64) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                Self::visit_dir(&path, total)?;
            } else {
                *total += entry.metadata()?.len();
            }
        }
        Ok(())
    }

    /// Remove every cached dataset
    ///
    /// # Returns
    /// Keys of the removed datasets
    ///
    /// # Errors
    /// - Failed to access or remove cache directories
    pub fn clear_all_datasets(&self) -> Result<Vec<String>> {
        let mut removed = Vec::new();

        if !self.cache_dir.exists() {
            return Ok(removed);
        }

        let entries = fs::read_dir(&self.cache_dir).map_err(|e| {
            ZooError::file_io_error("read cache directory", &self.cache_dir, &e)
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                ZooError::file_io_error("read cache directory entry", &self.cache_dir, &e)
            })?;

            let path = entry.path();
            if path.is_dir() {
                let dataset_key = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("unknown")
                    .to_string();

                log::info!("Removing cached dataset: {}", dataset_key);
                fs::remove_dir_all(&path).map_err(|e| {
                    ZooError::file_io_error("remove cached dataset directory", &path, &e)
                })?;
                removed.push(dataset_key);
            }
        }

        removed.sort();
        Ok(removed)
    }

    /// Remove one cached dataset
    ///
    /// # Returns
    /// `true` if the dataset was cached and has been removed
    ///
    /// # Errors
    /// - Key is not a single directory name under the cache root
    /// - Failed to remove the dataset directory
    pub fn clear_specific_dataset(&self, dataset_key: &str) -> Result<bool> {
        if !Self::is_dataset_key(dataset_key) {
            return Err(ZooError::invalid_config(format!(
                "Invalid dataset cache key: '{}'",
                dataset_key
            )));
        }

        let dataset_path = self.dataset_path(dataset_key);
        if !dataset_path.exists() {
            return Ok(false);
        }

        log::info!("Removing cached dataset: {}", dataset_key);
        fs::remove_dir_all(&dataset_path).map_err(|e| {
            ZooError::file_io_error("remove cached dataset", &dataset_path, &e)
        })?;

        Ok(true)
    }

    /// A key must name exactly one directory directly under the cache root
    fn is_dataset_key(dataset_key: &str) -> bool {
        let mut components = Path::new(dataset_key).components();
        matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) && !dataset_key.contains(['/', '\\'])
    }

    /// Get the current cache directory path
    #[must_use]
    pub fn get_current_cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }
}

/// Format file size in human-readable format
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS.get(unit_index).unwrap_or(&"B"))
    } else {
        format!("{:.1} {}", size, UNITS.get(unit_index).unwrap_or(&"B"))
    }
}
