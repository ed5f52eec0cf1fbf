//! In-memory sample collection returned by the zoo loader

use crate::config::{LabelType, Split};
use crate::error::{Result, ZooError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Field holding positive image-level labels
pub const CLASSIFICATIONS_FIELD: &str = "classifications";
/// Field holding image-level labels verified absent
pub const NEGATIVE_CLASSIFICATIONS_FIELD: &str = "negative_classifications";
/// Field holding bounding boxes
pub const DETECTIONS_FIELD: &str = "detections";

/// Image-level label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Class display name (e.g. `Cat`)
    pub label: String,
    /// Class identifier in the source taxonomy (e.g. `/m/01yrx`)
    pub label_id: String,
    /// 1.0 for present, 0.0 for verified absent
    pub confidence: f32,
}

/// Bounding box label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub label_id: String,
    /// `[top-left-x, top-left-y, width, height]`, relative to image size
    pub bounding_box: [f32; 4],
    pub is_occluded: Option<bool>,
    pub is_truncated: Option<bool>,
    pub is_group_of: Option<bool>,
    pub is_depiction: Option<bool>,
    pub is_inside: Option<bool>,
}

/// Labels stored in one sample field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Labels {
    Classifications(Vec<Classification>),
    Detections(Vec<Detection>),
}

impl Labels {
    /// Number of labels in the field
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Classifications(items) => items.len(),
            Self::Detections(items) => items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Display names of every label, in stored order
    #[must_use]
    pub fn label_names(&self) -> Vec<&str> {
        match self {
            Self::Classifications(items) => items.iter().map(|c| c.label.as_str()).collect(),
            Self::Detections(items) => items.iter().map(|d| d.label.as_str()).collect(),
        }
    }
}

/// One image with its labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Source identifier (Open Images image id)
    pub id: String,
    /// Local media path
    pub filepath: PathBuf,
    /// Label fields keyed by field name
    pub fields: BTreeMap<String, Labels>,
}

impl Sample {
    #[must_use]
    pub fn new<S: Into<String>, P: Into<PathBuf>>(id: S, filepath: P) -> Self {
        Self {
            id: id.into(),
            filepath: filepath.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Labels stored under `field`
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Labels> {
        self.fields.get(field)
    }

    pub fn set<S: Into<String>>(&mut self, field: S, labels: Labels) {
        self.fields.insert(field.into(), labels);
    }
}

/// Descriptive metadata of a loaded dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetInfo {
    /// Dataset name, `<zoo dataset>-<split>[-<max samples>]`
    pub name: String,
    /// Zoo dataset this was loaded from
    pub zoo_dataset: String,
    pub split: Split,
    pub label_types: BTreeSet<LabelType>,
    /// Resolved class filter, if any
    pub classes: Option<Vec<String>>,
    /// Directory holding this split's cached files
    pub dataset_dir: PathBuf,
}

/// Handle to a materialized sample collection
#[derive(Debug, Clone)]
pub struct Dataset {
    info: DatasetInfo,
    created_at: DateTime<Utc>,
    samples: Vec<Sample>,
}

impl Dataset {
    #[must_use]
    pub fn new(info: DatasetInfo, samples: Vec<Sample>) -> Self {
        Self {
            info,
            created_at: Utc::now(),
            samples,
        }
    }

    /// Conventional dataset name for a zoo request
    ///
    /// # Examples
    /// ```
    /// use zoofetch::{Dataset, Split};
    ///
    /// assert_eq!(
    ///     Dataset::default_name("open-images-v7", Split::Validation, Some(1000)),
    ///     "open-images-v7-validation-1000"
    /// );
    /// assert_eq!(
    ///     Dataset::default_name("open-images-v7", Split::Train, None),
    ///     "open-images-v7-train"
    /// );
    /// ```
    #[must_use]
    pub fn default_name(zoo_dataset: &str, split: Split, max_samples: Option<usize>) -> String {
        match max_samples {
            Some(max) => format!("{}-{}-{}", zoo_dataset, split, max),
            None => format!("{}-{}", zoo_dataset, split),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    #[must_use]
    pub fn info(&self) -> &DatasetInfo {
        &self.info
    }

    #[must_use]
    pub fn dataset_dir(&self) -> &Path {
        &self.info.dataset_dir
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Label fields every sample carries, in schema order
    #[must_use]
    pub fn label_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        for label_type in &self.info.label_types {
            match label_type {
                LabelType::Classifications => {
                    fields.push(CLASSIFICATIONS_FIELD);
                    fields.push(NEGATIVE_CLASSIFICATIONS_FIELD);
                },
                LabelType::Detections => fields.push(DETECTIONS_FIELD),
            }
        }
        fields
    }

    #[must_use]
    pub fn has_label_field(&self, field: &str) -> bool {
        self.label_fields().contains(&field)
    }

    /// Fail with `UnknownLabelField` unless `field` is part of the schema
    ///
    /// # Errors
    /// - `field` is not a label field of this dataset
    pub fn require_label_field(&self, field: &str) -> Result<()> {
        if self.has_label_field(field) {
            Ok(())
        } else {
            Err(ZooError::UnknownLabelField {
                field: field.to_string(),
                available: self.label_fields().join(", "),
            })
        }
    }

    /// Count occurrences of each label value in `field`
    ///
    /// # Errors
    /// - `field` is not a label field of this dataset
    pub fn count_values(&self, field: &str) -> Result<BTreeMap<String, usize>> {
        self.require_label_field(field)?;

        let mut counts = BTreeMap::new();
        for labels in self.samples.iter().filter_map(|s| s.get(field)) {
            for name in labels.label_names() {
                *counts.entry(name.to_string()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    /// Multi-line human-readable summary
    #[must_use]
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label_types = self
            .info
            .label_types
            .iter()
            .map(LabelType::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let classes = self
            .info
            .classes
            .as_ref()
            .map_or_else(|| "all".to_string(), |c| c.join(", "));

        writeln!(f, "Name:           {}", self.info.name)?;
        writeln!(f, "Zoo dataset:    {}", self.info.zoo_dataset)?;
        writeln!(f, "Split:          {}", self.info.split)?;
        writeln!(f, "Media type:     image")?;
        writeln!(f, "Num samples:    {}", self.samples.len())?;
        writeln!(f, "Label types:    {}", label_types)?;
        writeln!(f, "Classes:        {}", classes)?;
        writeln!(f, "Dataset dir:    {}", self.info.dataset_dir.display())?;
        writeln!(f, "Created at:     {}", self.created_at.to_rfc3339())?;
        writeln!(f, "Sample fields:")?;
        writeln!(f, "    {:<26}String", "id:")?;
        write!(f, "    {:<26}Path", "filepath:")?;
        for field in self.label_fields() {
            let kind = if field == DETECTIONS_FIELD {
                "Detections"
            } else {
                "Classifications"
            };
            write!(f, "\n    {:<26}{}", format!("{}:", field), kind)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification(label: &str, confidence: f32) -> Classification {
        Classification {
            label: label.to_string(),
            label_id: format!("/m/{}", label.to_lowercase()),
            confidence,
        }
    }

    fn test_dataset(label_types: &[LabelType]) -> Dataset {
        let mut first = Sample::new("0001", "/data/0001.jpg");
        first.set(
            CLASSIFICATIONS_FIELD,
            Labels::Classifications(vec![classification("Cat", 1.0), classification("Dog", 1.0)]),
        );
        first.set(
            NEGATIVE_CLASSIFICATIONS_FIELD,
            Labels::Classifications(vec![classification("Bird", 0.0)]),
        );

        let mut second = Sample::new("0002", "/data/0002.jpg");
        second.set(
            CLASSIFICATIONS_FIELD,
            Labels::Classifications(vec![classification("Cat", 1.0)]),
        );
        second.set(NEGATIVE_CLASSIFICATIONS_FIELD, Labels::Classifications(vec![]));

        Dataset::new(
            DatasetInfo {
                name: "open-images-v7-validation-2".to_string(),
                zoo_dataset: "open-images-v7".to_string(),
                split: Split::Validation,
                label_types: label_types.iter().copied().collect(),
                classes: Some(vec!["Cat".to_string(), "Dog".to_string()]),
                dataset_dir: PathBuf::from("/cache/open-images-v7/validation"),
            },
            vec![first, second],
        )
    }

    #[test]
    fn test_label_fields_follow_label_types() {
        let dataset = test_dataset(&[LabelType::Classifications]);
        assert_eq!(
            dataset.label_fields(),
            vec![CLASSIFICATIONS_FIELD, NEGATIVE_CLASSIFICATIONS_FIELD]
        );

        let dataset = test_dataset(&[LabelType::Detections, LabelType::Classifications]);
        assert_eq!(
            dataset.label_fields(),
            vec![
                CLASSIFICATIONS_FIELD,
                NEGATIVE_CLASSIFICATIONS_FIELD,
                DETECTIONS_FIELD
            ]
        );
    }

    #[test]
    fn test_count_values() {
        let dataset = test_dataset(&[LabelType::Classifications]);
        let counts = dataset.count_values(CLASSIFICATIONS_FIELD).unwrap();
        assert_eq!(counts.get("Cat"), Some(&2));
        assert_eq!(counts.get("Dog"), Some(&1));
        assert_eq!(counts.len(), 2);

        let err = dataset.count_values(DETECTIONS_FIELD).unwrap_err();
        assert!(matches!(err, ZooError::UnknownLabelField { .. }));
    }

    #[test]
    fn test_summary_lists_schema() {
        let dataset = test_dataset(&[LabelType::Classifications]);
        let summary = dataset.summary();

        assert!(summary.contains("open-images-v7-validation-2"));
        assert!(summary.contains("Num samples:    2"));
        assert!(summary.contains("Classes:        Cat, Dog"));
        assert!(summary.contains("negative_classifications:"));
        assert!(!summary.contains("detections:"));
    }

    #[test]
    fn test_labels_helpers() {
        let labels = Labels::Classifications(vec![classification("Cat", 1.0)]);
        assert_eq!(labels.len(), 1);
        assert!(!labels.is_empty());
        assert_eq!(labels.label_names(), vec!["Cat"]);

        let labels = Labels::Detections(vec![]);
        assert!(labels.is_empty());
    }

    #[test]
    fn test_default_name() {
        assert_eq!(
            Dataset::default_name("open-images-v7", Split::Test, Some(0)),
            "open-images-v7-test-0"
        );
    }
}
