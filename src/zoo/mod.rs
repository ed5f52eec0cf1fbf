//! Dataset zoo: a catalog of named datasets and the loader that materializes them
//!
//! ```rust,no_run
//! use zoofetch::{DatasetRequest, LabelType, Split, ZooLoader};
//!
//! # async fn example() -> zoofetch::Result<()> {
//! let request = DatasetRequest::builder()
//!     .split(Split::Validation)
//!     .label_types([LabelType::Classifications])
//!     .classes(["Cat", "Dog"])
//!     .max_samples(1000)
//!     .build()?;
//!
//! let dataset = ZooLoader::new()?.load(&request).await?;
//! println!("{dataset}");
//! # Ok(())
//! # }
//! ```

pub mod open_images;

use crate::cache::DatasetCache;
use crate::config::{DatasetRequest, LabelType, Split};
use crate::dataset::Dataset;
use crate::download::Downloader;
use crate::error::{Result, ZooError};
use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;
use tracing::Instrument;

pub use open_images::OpenImagesV7;

/// Shared resources handed to a zoo dataset while it loads
#[derive(Debug)]
pub struct LoadContext<'a> {
    pub downloader: &'a Downloader,
    pub cache: &'a DatasetCache,
    pub show_progress: bool,
}

/// A dataset the zoo knows how to fetch
#[async_trait]
pub trait ZooDataset: Send + Sync + std::fmt::Debug {
    /// Catalog name (e.g. `open-images-v7`)
    fn name(&self) -> &str;

    /// One-line description for catalog listings
    fn description(&self) -> &str;

    fn splits(&self) -> &[Split];

    fn label_types(&self) -> &[LabelType];

    /// Directory under the cache holding this dataset's files
    fn cache_key(&self) -> String {
        self.name().to_string()
    }

    /// Materialize the samples selected by `request`
    async fn load(&self, request: &DatasetRequest, ctx: &LoadContext<'_>) -> Result<Dataset>;
}

/// Registry of zoo datasets addressable by name
#[derive(Debug)]
pub struct ZooCatalog {
    datasets: Vec<Box<dyn ZooDataset>>,
}

impl Default for ZooCatalog {
    fn default() -> Self {
        Self {
            datasets: vec![Box::new(OpenImagesV7::default())],
        }
    }
}

impl ZooCatalog {
    /// Catalog without any datasets
    #[must_use]
    pub fn empty() -> Self {
        Self {
            datasets: Vec::new(),
        }
    }

    /// Add a dataset, replacing any registered under the same name
    pub fn register(&mut self, dataset: Box<dyn ZooDataset>) {
        self.datasets.retain(|d| d.name() != dataset.name());
        self.datasets.push(dataset);
    }

    /// Registered dataset names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.datasets.iter().map(|d| d.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ZooDataset> {
        self.datasets.iter().map(|d| &**d)
    }

    /// Look up a dataset by name
    ///
    /// # Errors
    /// - No dataset registered under `name`
    pub fn find(&self, name: &str) -> Result<&dyn ZooDataset> {
        self.datasets
            .iter()
            .find(|d| d.name() == name)
            .map(|d| &**d)
            .ok_or_else(|| ZooError::UnknownDataset {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }
}

/// Loads zoo datasets through a shared downloader and cache
#[derive(Debug)]
pub struct ZooLoader {
    catalog: ZooCatalog,
    downloader: Downloader,
    cache: DatasetCache,
    show_progress: bool,
}

impl ZooLoader {
    /// Loader with the default catalog and cache location
    ///
    /// # Errors
    /// - Failed to create HTTP client
    /// - Failed to initialize the dataset cache
    pub fn new() -> Result<Self> {
        Ok(Self {
            catalog: ZooCatalog::default(),
            downloader: Downloader::new()?,
            cache: DatasetCache::new()?,
            show_progress: false,
        })
    }

    /// Loader with the default catalog and a custom cache root
    ///
    /// # Errors
    /// - Failed to create HTTP client
    /// - Failed to create the cache directory
    pub fn with_cache_dir(cache_dir: &Path) -> Result<Self> {
        Ok(Self {
            catalog: ZooCatalog::default(),
            downloader: Downloader::new()?,
            cache: DatasetCache::with_custom_cache_dir(cache_dir)?,
            show_progress: false,
        })
    }

    /// Register an additional (or replacement) zoo dataset
    #[must_use]
    pub fn with_dataset(mut self, dataset: Box<dyn ZooDataset>) -> Self {
        self.catalog.register(dataset);
        self
    }

    /// Show progress bars for downloads
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &ZooCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn cache(&self) -> &DatasetCache {
        &self.cache
    }

    /// Fetch the slice of a zoo dataset described by `request`
    ///
    /// # Errors
    /// - Invalid request
    /// - Unknown dataset, unsupported split or label type
    /// - Unknown class names
    /// - Network, file system or annotation errors
    pub async fn load(&self, request: &DatasetRequest) -> Result<Dataset> {
        request.validate()?;

        let zoo_dataset = self.catalog.find(&request.dataset)?;

        if !zoo_dataset.splits().contains(&request.split) {
            return Err(ZooError::UnsupportedSplit {
                dataset: zoo_dataset.name().to_string(),
                split: request.split.to_string(),
                supported: join_display(zoo_dataset.splits()),
            });
        }

        if let Some(label_type) = request
            .label_types
            .iter()
            .find(|lt| !zoo_dataset.label_types().contains(*lt))
        {
            return Err(ZooError::UnsupportedLabelType {
                dataset: zoo_dataset.name().to_string(),
                label_type: label_type.to_string(),
            });
        }

        let ctx = LoadContext {
            downloader: &self.downloader,
            cache: &self.cache,
            show_progress: self.show_progress,
        };

        let span = crate::tracing_config::spans::dataset_load(
            zoo_dataset.name(),
            request.split.as_str(),
            request.max_samples,
        );

        let start = Instant::now();
        let dataset = zoo_dataset.load(request, &ctx).instrument(span).await?;

        crate::tracing_config::events::performance_metric(
            "dataset_load",
            start.elapsed().as_millis() as u64,
        );
        tracing::info!(
            dataset = %dataset.name(),
            samples = dataset.len(),
            "Dataset loaded"
        );

        Ok(dataset)
    }
}

/// Load a zoo dataset with the default loader
///
/// # Errors
/// - See [`ZooLoader::load`]
pub async fn load_zoo_dataset(request: &DatasetRequest) -> Result<Dataset> {
    ZooLoader::new()?.load(request).await
}

fn join_display<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_catalog() {
        let catalog = ZooCatalog::default();
        assert_eq!(catalog.names(), vec!["open-images-v7"]);

        let dataset = catalog.find("open-images-v7").unwrap();
        assert!(dataset.splits().contains(&Split::Validation));
        assert!(dataset.label_types().contains(&LabelType::Classifications));
    }

    #[test]
    fn test_unknown_dataset() {
        let catalog = ZooCatalog::default();
        let err = catalog.find("coco-2017").unwrap_err();
        match err {
            ZooError::UnknownDataset { name, available } => {
                assert_eq!(name, "coco-2017");
                assert_eq!(available, "open-images-v7");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut catalog = ZooCatalog::empty();
        assert!(catalog.names().is_empty());

        catalog.register(Box::new(OpenImagesV7::default()));
        catalog.register(Box::new(OpenImagesV7::with_mirrors(
            "http://127.0.0.1:1",
            "http://127.0.0.1:2",
        )));
        assert_eq!(catalog.names(), vec!["open-images-v7"]);
        assert_ne!(
            catalog.find("open-images-v7").unwrap().cache_key(),
            "open-images-v7"
        );
    }

    #[tokio::test]
    async fn test_loader_rejects_unknown_dataset_before_io() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ZooLoader::with_cache_dir(temp_dir.path()).unwrap();

        let request = DatasetRequest::builder()
            .dataset("imagenet-2012")
            .build()
            .unwrap();
        let err = loader.load(&request).await.unwrap_err();
        assert!(matches!(err, ZooError::UnknownDataset { .. }));
    }

    /// Advertises a single split and label type, and never expects `load` to run
    #[derive(Debug)]
    struct ValidationOnly;

    #[async_trait]
    impl ZooDataset for ValidationOnly {
        fn name(&self) -> &str {
            "validation-only"
        }

        fn description(&self) -> &str {
            "Validation split with classifications"
        }

        fn splits(&self) -> &[Split] {
            &[Split::Validation]
        }

        fn label_types(&self) -> &[LabelType] {
            &[LabelType::Classifications]
        }

        async fn load(
            &self,
            _request: &DatasetRequest,
            _ctx: &LoadContext<'_>,
        ) -> Result<Dataset> {
            Err(ZooError::invalid_config("load reached for an unsupported request"))
        }
    }

    #[tokio::test]
    async fn test_loader_rejects_unsupported_split_and_label_type_before_io() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ZooLoader::with_cache_dir(temp_dir.path())
            .unwrap()
            .with_dataset(Box::new(ValidationOnly));

        let request = DatasetRequest::builder()
            .dataset("validation-only")
            .split(Split::Train)
            .label_types([LabelType::Classifications])
            .build()
            .unwrap();
        match loader.load(&request).await.unwrap_err() {
            ZooError::UnsupportedSplit {
                dataset,
                split,
                supported,
            } => {
                assert_eq!(dataset, "validation-only");
                assert_eq!(split, "train");
                assert_eq!(supported, "validation");
            },
            other => panic!("unexpected error: {other:?}"),
        }

        let request = DatasetRequest::builder()
            .dataset("validation-only")
            .split(Split::Validation)
            .label_types([LabelType::Classifications, LabelType::Detections])
            .build()
            .unwrap();
        match loader.load(&request).await.unwrap_err() {
            ZooError::UnsupportedLabelType {
                dataset,
                label_type,
            } => {
                assert_eq!(dataset, "validation-only");
                assert_eq!(label_type, "detections");
            },
            other => panic!("unexpected error: {other:?}"),
        }

        // Neither request touched the cache
        assert!(!loader.cache().dataset_path("validation-only").exists());
    }

    #[test]
    fn test_join_display() {
        assert_eq!(
            join_display(&[Split::Train, Split::Validation]),
            "train, validation"
        );
    }
}
