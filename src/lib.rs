#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # zoofetch
//!
//! Fetch filtered slices of public image datasets from a dataset zoo and
//! export them to flat files.
//!
//! A [`DatasetRequest`] names a zoo dataset, a split, the label types to load,
//! an optional class filter and a sample budget. [`ZooLoader`] downloads the
//! annotation tables (cached on disk), selects matching images, fetches their
//! media and returns an in-memory [`Dataset`]. [`export_dataset`] writes one of
//! the dataset's label fields to CSV or JSON Lines.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zoofetch::{
//!     export_dataset, load_zoo_dataset, DatasetRequest, ExportRequest, LabelType, Split,
//! };
//!
//! # async fn example() -> zoofetch::Result<()> {
//! let request = DatasetRequest::builder()
//!     .dataset("open-images-v7")
//!     .split(Split::Validation)
//!     .label_types([LabelType::Classifications])
//!     .classes(["Cat", "Dog"])
//!     .max_samples(1000)
//!     .build()?;
//!
//! let dataset = load_zoo_dataset(&request).await?;
//! println!("{dataset}");
//!
//! let export = ExportRequest::builder("dataset_export.csv")
//!     .label_field("classifications")
//!     .overwrite(true)
//!     .build()?;
//! export_dataset(&dataset, &export)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): command-line interface, progress bars and tracing
//!   subscriber setup
//! - `tracing-json`: JSON log output for the CLI
//!
//! To use only as a library without CLI dependencies:
//!
//! ```toml
//! [dependencies]
//! zoofetch = { version = "0.1", default-features = false }
//! ```
//!
//! ## Caching
//!
//! Annotation tables and media live under the platform cache directory
//! (`~/.cache/zoofetch/datasets` on Linux). Set `ZOOFETCH_CACHE_DIR` or use
//! [`ZooLoader::with_cache_dir`] to relocate it.

pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dataset;
pub mod download;
pub mod error;
pub mod export;
pub mod tracing_config;
pub mod zoo;

pub use cache::{format_size, CachedDatasetInfo, DatasetCache};
pub use config::{DatasetRequest, ExportFormat, ExportRequest, LabelType, Split};
pub use dataset::{Classification, Dataset, DatasetInfo, Detection, Labels, Sample};
pub use download::{DownloadStats, Downloader};
pub use error::{Result, ZooError};
pub use export::{export_dataset, ExportSummary};
pub use zoo::{load_zoo_dataset, OpenImagesV7, ZooCatalog, ZooDataset, ZooLoader};

pub use tracing_config::{events, spans, TracingConfig, TracingFormat};
#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;
