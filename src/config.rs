//! Request types for loading and exporting zoo datasets

use crate::error::{Result, ZooError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default zoo dataset when none is named
pub const DEFAULT_DATASET: &str = "open-images-v7";

/// Default number of concurrent media downloads
pub const DEFAULT_NUM_WORKERS: usize = 8;

/// Named partition of a zoo dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Validation,
    Test,
}

impl Default for Split {
    fn default() -> Self {
        Self::Validation
    }
}

impl Split {
    /// Canonical split name used in paths and dataset names
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Validation => "validation",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = ZooError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(Self::Train),
            "validation" | "val" => Ok(Self::Validation),
            "test" => Ok(Self::Test),
            other => Err(ZooError::invalid_config(format!(
                "Unknown split '{}'. Expected one of: train, validation, test",
                other
            ))),
        }
    }
}

/// Kind of annotation loaded onto each sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelType {
    /// Image-level labels
    Classifications,
    /// Bounding boxes
    Detections,
}

impl LabelType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classifications => "classifications",
            Self::Detections => "detections",
        }
    }
}

impl fmt::Display for LabelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LabelType {
    type Err = ZooError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classifications" | "classification" => Ok(Self::Classifications),
            "detections" | "detection" => Ok(Self::Detections),
            other => Err(ZooError::invalid_config(format!(
                "Unknown label type '{}'. Expected one of: classifications, detections",
                other
            ))),
        }
    }
}

/// Flat file formats supported by the exporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    /// One row per label, header `filepath,open_images_id,<field>,confidence[,x,y,width,height]`
    Csv,
    /// One JSON object per sample
    JsonLines,
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self::Csv
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::JsonLines => write!(f, "jsonl"),
        }
    }
}

/// Request describing which slice of a zoo dataset to materialize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRequest {
    /// Zoo dataset name (e.g. `open-images-v7`)
    pub dataset: String,

    /// Split to load
    pub split: Split,

    /// Label types to attach to each sample
    pub label_types: BTreeSet<LabelType>,

    /// Class display names to keep, in caller order (None = every class)
    pub classes: Option<Vec<String>>,

    /// Upper bound on the number of samples (None = no limit)
    pub max_samples: Option<usize>,

    /// Keep only labels whose class was requested
    pub only_matching: bool,

    /// Randomize which matching samples are selected
    pub shuffle: bool,

    /// Seed for shuffling
    pub seed: Option<u64>,

    /// Download sample media, not just annotations
    pub download_media: bool,

    /// Concurrent media downloads
    pub num_workers: usize,
}

impl Default for DatasetRequest {
    fn default() -> Self {
        Self {
            dataset: DEFAULT_DATASET.to_string(),
            split: Split::default(),
            label_types: BTreeSet::from([LabelType::Classifications]),
            classes: None,
            max_samples: None,
            only_matching: true,
            shuffle: false,
            seed: None,
            download_media: true,
            num_workers: DEFAULT_NUM_WORKERS,
        }
    }
}

impl DatasetRequest {
    /// Create a new request builder
    ///
    /// # Examples
    /// ```rust
    /// use zoofetch::{DatasetRequest, LabelType, Split};
    ///
    /// let request = DatasetRequest::builder()
    ///     .dataset("open-images-v7")
    ///     .split(Split::Validation)
    ///     .label_types([LabelType::Classifications])
    ///     .classes(["Cat", "Dog"])
    ///     .max_samples(1000)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(request.max_samples, Some(1000));
    /// ```
    #[must_use]
    pub fn builder() -> DatasetRequestBuilder {
        DatasetRequestBuilder::default()
    }

    /// Validate request parameters
    ///
    /// # Errors
    /// - Empty dataset name
    /// - No label types
    /// - Empty or blank class names
    /// - Zero download workers
    pub fn validate(&self) -> Result<()> {
        if self.dataset.trim().is_empty() {
            return Err(ZooError::invalid_config("Dataset name cannot be empty"));
        }

        if self.label_types.is_empty() {
            return Err(ZooError::invalid_config(
                "At least one label type must be requested",
            ));
        }

        if let Some(classes) = &self.classes {
            if classes.is_empty() {
                return Err(ZooError::invalid_config(
                    "Class filter cannot be empty; omit it to load every class",
                ));
            }
            if classes.iter().any(|c| c.trim().is_empty()) {
                return Err(ZooError::invalid_config("Class names cannot be blank"));
            }
        }

        if self.num_workers == 0 {
            return Err(ZooError::invalid_config(
                "Number of download workers must be at least 1",
            ));
        }

        Ok(())
    }
}

/// Builder for `DatasetRequest`
#[derive(Debug, Default)]
pub struct DatasetRequestBuilder {
    request: DatasetRequest,
}

impl DatasetRequestBuilder {
    #[must_use]
    pub fn dataset<S: Into<String>>(mut self, name: S) -> Self {
        self.request.dataset = name.into();
        self
    }

    #[must_use]
    pub fn split(mut self, split: Split) -> Self {
        self.request.split = split;
        self
    }

    /// Replace the requested label types
    #[must_use]
    pub fn label_types<I: IntoIterator<Item = LabelType>>(mut self, label_types: I) -> Self {
        self.request.label_types = label_types.into_iter().collect();
        self
    }

    /// Restrict loading to these classes; duplicates are dropped, first occurrence wins
    #[must_use]
    pub fn classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered: Vec<String> = Vec::new();
        for class in classes {
            let class = class.into();
            if !ordered.contains(&class) {
                ordered.push(class);
            }
        }
        self.request.classes = Some(ordered);
        self
    }

    #[must_use]
    pub fn max_samples(mut self, max_samples: usize) -> Self {
        self.request.max_samples = Some(max_samples);
        self
    }

    #[must_use]
    pub fn only_matching(mut self, only_matching: bool) -> Self {
        self.request.only_matching = only_matching;
        self
    }

    #[must_use]
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.request.shuffle = shuffle;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.request.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn download_media(mut self, download_media: bool) -> Self {
        self.request.download_media = download_media;
        self
    }

    #[must_use]
    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.request.num_workers = num_workers;
        self
    }

    /// Build the request
    ///
    /// # Errors
    /// - Any violation reported by [`DatasetRequest::validate`]
    pub fn build(self) -> Result<DatasetRequest> {
        self.request.validate()?;
        Ok(self.request)
    }
}

/// Request describing how to write a dataset to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Output file path
    pub output_path: PathBuf,

    /// Output file format
    pub format: ExportFormat,

    /// Label field to include
    pub label_field: String,

    /// Replace an existing file at `output_path`
    pub overwrite: bool,
}

impl ExportRequest {
    /// Create a new export request builder for `output_path`
    #[must_use]
    pub fn builder<P: AsRef<Path>>(output_path: P) -> ExportRequestBuilder {
        ExportRequestBuilder {
            request: Self {
                output_path: output_path.as_ref().to_path_buf(),
                format: ExportFormat::default(),
                label_field: LabelType::Classifications.as_str().to_string(),
                overwrite: false,
            },
        }
    }

    /// Validate export parameters
    ///
    /// # Errors
    /// - Empty output path
    /// - Output path that names a directory
    /// - Empty label field
    pub fn validate(&self) -> Result<()> {
        if self.output_path.as_os_str().is_empty() {
            return Err(ZooError::invalid_config("Export path cannot be empty"));
        }

        if self.output_path.is_dir() {
            return Err(ZooError::invalid_config(format!(
                "Export path '{}' is a directory",
                self.output_path.display()
            )));
        }

        if self.label_field.trim().is_empty() {
            return Err(ZooError::invalid_config("Label field cannot be empty"));
        }

        Ok(())
    }
}

/// Builder for `ExportRequest`
#[derive(Debug)]
pub struct ExportRequestBuilder {
    request: ExportRequest,
}

impl ExportRequestBuilder {
    #[must_use]
    pub fn format(mut self, format: ExportFormat) -> Self {
        self.request.format = format;
        self
    }

    #[must_use]
    pub fn label_field<S: Into<String>>(mut self, label_field: S) -> Self {
        self.request.label_field = label_field.into();
        self
    }

    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.request.overwrite = overwrite;
        self
    }

    /// Build the request
    ///
    /// # Errors
    /// - Any violation reported by [`ExportRequest::validate`]
    pub fn build(self) -> Result<ExportRequest> {
        self.request.validate()?;
        Ok(self.request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_request() {
        let request = DatasetRequest::default();
        assert_eq!(request.dataset, "open-images-v7");
        assert_eq!(request.split, Split::Validation);
        assert!(request.label_types.contains(&LabelType::Classifications));
        assert!(request.classes.is_none());
        assert!(request.max_samples.is_none());
        assert!(request.only_matching);
        assert!(request.download_media);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_builder() {
        let request = DatasetRequest::builder()
            .split(Split::Train)
            .label_types([LabelType::Classifications, LabelType::Detections])
            .classes(["Cat", "Dog", "Cat"])
            .max_samples(25)
            .shuffle(true)
            .seed(7)
            .build()
            .unwrap();

        assert_eq!(request.split, Split::Train);
        assert_eq!(request.label_types.len(), 2);
        assert_eq!(
            request.classes,
            Some(vec!["Cat".to_string(), "Dog".to_string()])
        );
        assert_eq!(request.max_samples, Some(25));
        assert!(request.shuffle);
        assert_eq!(request.seed, Some(7));
    }

    #[test]
    fn test_request_validation() {
        assert!(DatasetRequest::builder().dataset("  ").build().is_err());
        assert!(DatasetRequest::builder()
            .label_types(Vec::<LabelType>::new())
            .build()
            .is_err());
        assert!(DatasetRequest::builder()
            .classes(Vec::<String>::new())
            .build()
            .is_err());
        assert!(DatasetRequest::builder().classes(["Cat", " "]).build().is_err());
        assert!(DatasetRequest::builder().num_workers(0).build().is_err());

        // Zero samples is a valid, if empty, request
        assert!(DatasetRequest::builder().max_samples(0).build().is_ok());
    }

    #[test]
    fn test_split_parsing() {
        assert_eq!("validation".parse::<Split>().unwrap(), Split::Validation);
        assert_eq!("val".parse::<Split>().unwrap(), Split::Validation);
        assert_eq!("TRAIN".parse::<Split>().unwrap(), Split::Train);
        assert_eq!(" test ".parse::<Split>().unwrap(), Split::Test);
        assert!("holdout".parse::<Split>().is_err());
        assert_eq!(Split::Validation.to_string(), "validation");
    }

    #[test]
    fn test_label_type_parsing() {
        assert_eq!(
            "classifications".parse::<LabelType>().unwrap(),
            LabelType::Classifications
        );
        assert_eq!(
            "detection".parse::<LabelType>().unwrap(),
            LabelType::Detections
        );
        let err = "segmentations".parse::<LabelType>().unwrap_err();
        assert!(err.to_string().contains("Unknown label type"));
    }

    #[test]
    fn test_export_request_builder() {
        let request = ExportRequest::builder("dataset_export.csv")
            .label_field("classifications")
            .overwrite(true)
            .build()
            .unwrap();

        assert_eq!(request.output_path, PathBuf::from("dataset_export.csv"));
        assert_eq!(request.format, ExportFormat::Csv);
        assert!(request.overwrite);
    }

    #[test]
    fn test_export_request_defaults_to_no_overwrite() {
        let request = ExportRequest::builder("out.csv").build().unwrap();
        assert!(!request.overwrite);
        assert_eq!(request.label_field, "classifications");
    }

    #[test]
    fn test_export_request_validation() {
        assert!(ExportRequest::builder("").build().is_err());
        assert!(ExportRequest::builder("out.csv")
            .label_field("")
            .build()
            .is_err());

        let temp_dir = TempDir::new().unwrap();
        let err = ExportRequest::builder(temp_dir.path()).build().unwrap_err();
        assert!(err.to_string().contains("is a directory"));
    }

    #[test]
    fn test_export_format_display() {
        assert_eq!(ExportFormat::Csv.to_string(), "csv");
        assert_eq!(ExportFormat::JsonLines.to_string(), "jsonl");
        assert_eq!(ExportFormat::default(), ExportFormat::Csv);
    }
}
