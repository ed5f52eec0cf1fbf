//! Open Images V7 zoo dataset
//!
//! Annotations come from the public Open Images annotation bucket and media from
//! the public image bucket:
//!
//! - class vocabulary: `v7/oidv7-class-descriptions.csv` (`LabelName,DisplayName`)
//! - image-level labels: `v7/oidv7-<split>-annotations-human-imagelabels.csv`
//!   (`ImageID,Source,LabelName,Confidence`)
//! - boxes: `*-annotations-bbox.csv`
//!   (`ImageID,Source,LabelName,Confidence,XMin,XMax,YMin,YMax,IsOccluded,...`)
//! - media: `<split>/<ImageID>.jpg`
//!
//! Both mirrors can be overridden with [`OpenImagesV7::with_mirrors`].

use crate::cache::DatasetCache;
use crate::config::{DatasetRequest, LabelType, Split};
use crate::dataset::{
    Classification, Dataset, DatasetInfo, Detection, Labels, Sample, CLASSIFICATIONS_FIELD,
    DETECTIONS_FIELD, NEGATIVE_CLASSIFICATIONS_FIELD,
};
use crate::download::{DownloadJob, ProgressIndicator};
use crate::error::{Result, ZooError};
use crate::zoo::{LoadContext, ZooDataset};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::Instrument;

/// Default mirror for annotation files
pub const DEFAULT_ANNOTATIONS_MIRROR: &str = "https://storage.googleapis.com/openimages/";

/// Default mirror for image files
pub const DEFAULT_MEDIA_MIRROR: &str = "https://open-images-dataset.s3.amazonaws.com/";

const NAME: &str = "open-images-v7";

const SPLITS: &[Split] = &[Split::Train, Split::Validation, Split::Test];

const LABEL_TYPES: &[LabelType] = &[LabelType::Classifications, LabelType::Detections];

const CLASS_DESCRIPTIONS: &str = "v7/oidv7-class-descriptions.csv";

/// Remote path of the annotation file for a split and label type
#[must_use]
pub fn annotation_path(split: Split, label_type: LabelType) -> &'static str {
    match (label_type, split) {
        (LabelType::Classifications, Split::Train) => {
            "v7/oidv7-train-annotations-human-imagelabels.csv"
        },
        (LabelType::Classifications, Split::Validation) => {
            "v7/oidv7-val-annotations-human-imagelabels.csv"
        },
        (LabelType::Classifications, Split::Test) => {
            "v7/oidv7-test-annotations-human-imagelabels.csv"
        },
        (LabelType::Detections, Split::Train) => "v6/oidv6-train-annotations-bbox.csv",
        (LabelType::Detections, Split::Validation) => "v5/validation-annotations-bbox.csv",
        (LabelType::Detections, Split::Test) => "v5/test-annotations-bbox.csv",
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Open Images V7 served from configurable mirrors
#[derive(Debug, Clone)]
pub struct OpenImagesV7 {
    annotations_mirror: String,
    media_mirror: String,
}

impl Default for OpenImagesV7 {
    fn default() -> Self {
        Self {
            annotations_mirror: DEFAULT_ANNOTATIONS_MIRROR.to_string(),
            media_mirror: DEFAULT_MEDIA_MIRROR.to_string(),
        }
    }
}

impl OpenImagesV7 {
    /// Open Images V7 served from custom annotation and media mirrors
    #[must_use]
    pub fn with_mirrors<A: Into<String>, M: Into<String>>(annotations: A, media: M) -> Self {
        Self {
            annotations_mirror: annotations.into(),
            media_mirror: media.into(),
        }
    }

    #[must_use]
    pub fn annotation_url(&self, path: &str) -> String {
        join_url(&self.annotations_mirror, path)
    }

    #[must_use]
    pub fn media_url(&self, split: Split, image_id: &str) -> String {
        join_url(
            &self.media_mirror,
            &format!("{}/{}.jpg", split.as_str(), image_id),
        )
    }

    async fn fetch_annotation(
        &self,
        ctx: &LoadContext<'_>,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<()> {
        let url = self.annotation_url(remote_path);
        let progress = if ctx.show_progress && !DatasetCache::is_file_cached(local_path) {
            let pb = ProgressIndicator::for_bytes();
            pb.set_message(format!("Downloading {}", remote_path));
            Some(pb)
        } else {
            None
        };

        let downloaded = ctx
            .downloader
            .fetch_cached(&url, local_path, progress.as_ref())
            .await
            .map_err(|e| {
                if let Some(pb) = &progress {
                    pb.finish_with_message(format!("❌ {}", remote_path));
                }
                e
            })?;

        if downloaded {
            crate::tracing_config::events::cache_miss(remote_path, "annotations");
        } else {
            crate::tracing_config::events::cache_hit(remote_path, "annotations");
        }

        if let Some(pb) = progress {
            pb.finish_with_message(format!("✅ {}", remote_path));
        }
        Ok(())
    }
}

#[async_trait]
impl ZooDataset for OpenImagesV7 {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Open Images V7: ~9M images with image-level labels and bounding boxes over 20k classes"
    }

    fn splits(&self) -> &[Split] {
        SPLITS
    }

    fn label_types(&self) -> &[LabelType] {
        LABEL_TYPES
    }

    fn cache_key(&self) -> String {
        DatasetCache::dataset_key(NAME, &self.annotations_mirror, DEFAULT_ANNOTATIONS_MIRROR)
    }

    async fn load(&self, request: &DatasetRequest, ctx: &LoadContext<'_>) -> Result<Dataset> {
        let dataset_root = ctx.cache.dataset_path(&self.cache_key());
        let split_dir = dataset_root.join(request.split.as_str());
        let labels_dir = split_dir.join("labels");

        let classes_path = dataset_root.join("metadata").join("classes.csv");
        self.fetch_annotation(ctx, CLASS_DESCRIPTIONS, &classes_path)
            .await?;
        let vocabulary = ClassVocabulary::from_path(&classes_path)?;
        log::debug!("Loaded {} class descriptions", vocabulary.len());

        let class_ids = match &request.classes {
            Some(classes) => Some(vocabulary.resolve(classes).map_err(|missing| {
                ZooError::UnknownClasses {
                    dataset: NAME.to_string(),
                    classes: missing,
                }
            })?),
            None => None,
        };
        let filter = ClassFilter {
            ids: class_ids,
            only_matching: request.only_matching,
        };

        let mut table = AnnotationTable::default();
        for label_type in &request.label_types {
            let remote_path = annotation_path(request.split, *label_type);
            let local_path = labels_dir.join(format!("{}.csv", label_type.as_str()));
            self.fetch_annotation(ctx, remote_path, &local_path).await?;

            let rows = table.add_file(*label_type, &local_path, &vocabulary, &filter)?;
            log::debug!("Parsed {} {} rows", rows, label_type);
        }

        let selected = select_image_ids(
            table.matched_ids(),
            request.max_samples,
            request.shuffle,
            request.seed,
        );
        tracing::debug!(
            candidates = table.matched_count(),
            selected = selected.len(),
            "Selected samples"
        );

        let mut samples = Vec::with_capacity(selected.len());
        for image_id in selected {
            let mut annotations = table.take(&image_id);
            let filepath = media_path(&split_dir, &image_id);
            let mut sample = Sample::new(image_id, filepath);
            for label_type in &request.label_types {
                match label_type {
                    LabelType::Classifications => {
                        sample.set(
                            CLASSIFICATIONS_FIELD,
                            Labels::Classifications(std::mem::take(&mut annotations.positives)),
                        );
                        sample.set(
                            NEGATIVE_CLASSIFICATIONS_FIELD,
                            Labels::Classifications(std::mem::take(&mut annotations.negatives)),
                        );
                    },
                    LabelType::Detections => {
                        sample.set(
                            DETECTIONS_FIELD,
                            Labels::Detections(std::mem::take(&mut annotations.detections)),
                        );
                    },
                }
            }
            samples.push(sample);
        }

        if request.download_media && !samples.is_empty() {
            let jobs = samples
                .iter()
                .map(|s| DownloadJob {
                    url: self.media_url(request.split, &s.id),
                    path: s.filepath.clone(),
                })
                .collect();

            let span = crate::tracing_config::spans::media_download(samples.len());
            let stats = ctx
                .downloader
                .download_many(jobs, request.num_workers, ctx.show_progress)
                .instrument(span)
                .await?;
            log::info!(
                "Media ready: {} downloaded, {} cached",
                stats.downloaded,
                stats.cached
            );
        }

        Ok(Dataset::new(
            DatasetInfo {
                name: Dataset::default_name(NAME, request.split, request.max_samples),
                zoo_dataset: NAME.to_string(),
                split: request.split,
                label_types: request.label_types.clone(),
                classes: request.classes.clone(),
                dataset_dir: split_dir,
            },
            samples,
        ))
    }
}

/// Mapping between Open Images label ids (`/m/...`) and display names
#[derive(Debug, Default, Clone)]
pub struct ClassVocabulary {
    by_id: HashMap<String, String>,
    by_name: HashMap<String, Vec<String>>,
}

impl ClassVocabulary {
    /// Parse a class description CSV, with or without its `LabelName,DisplayName` header
    ///
    /// # Errors
    /// - Malformed CSV
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut vocabulary = Self::default();
        for (index, record) in csv_reader.records().enumerate() {
            let record = record?;
            let (Some(label_id), Some(display_name)) = (record.get(0), record.get(1)) else {
                return Err(ZooError::annotation(format!(
                    "class descriptions row {} has fewer than two columns",
                    index + 1
                )));
            };

            if index == 0 && label_id == "LabelName" {
                continue;
            }

            vocabulary.insert(label_id, display_name);
        }

        Ok(vocabulary)
    }

    /// Parse a class description file
    ///
    /// # Errors
    /// - File cannot be opened
    /// - Malformed CSV
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| ZooError::file_io_error("open class descriptions", path, &e))?;
        Self::from_reader(file)
    }

    fn insert(&mut self, label_id: &str, display_name: &str) {
        self.by_id
            .insert(label_id.to_string(), display_name.to_string());
        self.by_name
            .entry(display_name.to_string())
            .or_default()
            .push(label_id.to_string());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    #[must_use]
    pub fn display_name(&self, label_id: &str) -> Option<&str> {
        self.by_id.get(label_id).map(String::as_str)
    }

    #[must_use]
    pub fn contains_name(&self, display_name: &str) -> bool {
        self.by_name.contains_key(display_name)
    }

    /// Resolve display names to label ids
    ///
    /// A display name shared by several ids resolves to all of them.
    ///
    /// # Errors
    /// Returns every name missing from the vocabulary, in request order
    pub fn resolve(&self, names: &[String]) -> std::result::Result<HashSet<String>, Vec<String>> {
        let mut ids = HashSet::new();
        let mut missing = Vec::new();

        for name in names {
            match self.by_name.get(name) {
                Some(label_ids) => ids.extend(label_ids.iter().cloned()),
                None => missing.push(name.clone()),
            }
        }

        if missing.is_empty() {
            Ok(ids)
        } else {
            Err(missing)
        }
    }
}

/// Which label ids select images and which labels are kept
#[derive(Debug, Default)]
struct ClassFilter {
    /// None selects on every class
    ids: Option<HashSet<String>>,
    only_matching: bool,
}

impl ClassFilter {
    fn matches(&self, label_id: &str) -> bool {
        self.ids.as_ref().map_or(true, |ids| ids.contains(label_id))
    }

    fn keeps(&self, label_id: &str) -> bool {
        !self.only_matching || self.matches(label_id)
    }
}

#[derive(Debug, Deserialize)]
struct ImageLabelRow {
    #[serde(rename = "ImageID")]
    image_id: String,
    #[serde(rename = "LabelName")]
    label_name: String,
    #[serde(rename = "Confidence")]
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct BoxRow {
    #[serde(rename = "ImageID")]
    image_id: String,
    #[serde(rename = "LabelName")]
    label_name: String,
    #[serde(rename = "XMin")]
    x_min: f32,
    #[serde(rename = "XMax")]
    x_max: f32,
    #[serde(rename = "YMin")]
    y_min: f32,
    #[serde(rename = "YMax")]
    y_max: f32,
    #[serde(rename = "IsOccluded", default)]
    is_occluded: Option<i8>,
    #[serde(rename = "IsTruncated", default)]
    is_truncated: Option<i8>,
    #[serde(rename = "IsGroupOf", default)]
    is_group_of: Option<i8>,
    #[serde(rename = "IsDepiction", default)]
    is_depiction: Option<i8>,
    #[serde(rename = "IsInside", default)]
    is_inside: Option<i8>,
}

/// Open Images flags use 1/0 with -1 for unknown
fn flag(value: Option<i8>) -> Option<bool> {
    match value {
        Some(1) => Some(true),
        Some(0) => Some(false),
        _ => None,
    }
}

#[derive(Debug, Default, Clone)]
struct ImageAnnotations {
    positives: Vec<Classification>,
    negatives: Vec<Classification>,
    detections: Vec<Detection>,
    matched: bool,
}

/// Per-image labels accumulated across annotation files
///
/// Holds every row of the split's annotation files that survives the class
/// filter. `max_samples` is applied only after the table is complete, so
/// peak memory follows the size of the split rather than of the result.
#[derive(Debug, Default)]
struct AnnotationTable {
    images: BTreeMap<String, ImageAnnotations>,
}

impl AnnotationTable {
    /// Parse one cached annotation file into the table
    fn add_file(
        &mut self,
        label_type: LabelType,
        path: &Path,
        vocabulary: &ClassVocabulary,
        filter: &ClassFilter,
    ) -> Result<usize> {
        let _span = crate::tracing_config::spans::annotation_parse(path).entered();
        let file =
            File::open(path).map_err(|e| ZooError::file_io_error("open annotations", path, &e))?;

        match label_type {
            LabelType::Classifications => self.add_image_labels(file, path, vocabulary, filter),
            LabelType::Detections => self.add_detections(file, path, vocabulary, filter),
        }
    }

    fn add_image_labels<R: Read>(
        &mut self,
        reader: R,
        source: &Path,
        vocabulary: &ClassVocabulary,
        filter: &ClassFilter,
    ) -> Result<usize> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut rows = 0;

        for (index, row) in csv_reader.deserialize::<ImageLabelRow>().enumerate() {
            let row = row.map_err(|e| {
                ZooError::annotation_row_error(source, index as u64 + 2, &e.to_string())
            })?;
            rows += 1;

            if !filter.keeps(&row.label_name) {
                continue;
            }

            let positive = row.confidence > 0.5;
            let selects = positive && filter.matches(&row.label_name);
            let classification = Classification {
                label: vocabulary
                    .display_name(&row.label_name)
                    .unwrap_or(row.label_name.as_str())
                    .to_string(),
                label_id: row.label_name,
                confidence: row.confidence,
            };

            let entry = self.images.entry(row.image_id).or_default();
            entry.matched |= selects;
            if positive {
                entry.positives.push(classification);
            } else {
                entry.negatives.push(classification);
            }
        }

        Ok(rows)
    }

    fn add_detections<R: Read>(
        &mut self,
        reader: R,
        source: &Path,
        vocabulary: &ClassVocabulary,
        filter: &ClassFilter,
    ) -> Result<usize> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut rows = 0;

        for (index, row) in csv_reader.deserialize::<BoxRow>().enumerate() {
            let row = row.map_err(|e| {
                ZooError::annotation_row_error(source, index as u64 + 2, &e.to_string())
            })?;
            rows += 1;

            if !filter.keeps(&row.label_name) {
                continue;
            }

            let selects = filter.matches(&row.label_name);
            let detection = Detection {
                label: vocabulary
                    .display_name(&row.label_name)
                    .unwrap_or(row.label_name.as_str())
                    .to_string(),
                label_id: row.label_name,
                bounding_box: [
                    row.x_min,
                    row.y_min,
                    row.x_max - row.x_min,
                    row.y_max - row.y_min,
                ],
                is_occluded: flag(row.is_occluded),
                is_truncated: flag(row.is_truncated),
                is_group_of: flag(row.is_group_of),
                is_depiction: flag(row.is_depiction),
                is_inside: flag(row.is_inside),
            };

            let entry = self.images.entry(row.image_id).or_default();
            entry.matched |= selects;
            entry.detections.push(detection);
        }

        Ok(rows)
    }

    /// Ids of images carrying a selecting label, ascending
    fn matched_ids(&self) -> Vec<String> {
        self.images
            .iter()
            .filter(|(_, annotations)| annotations.matched)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn matched_count(&self) -> usize {
        self.images.values().filter(|a| a.matched).count()
    }

    fn take(&mut self, image_id: &str) -> ImageAnnotations {
        self.images.remove(image_id).unwrap_or_default()
    }
}

/// Pick which candidate images become samples
///
/// Candidates arrive in ascending id order; shuffling with the same seed always
/// picks the same images.
fn select_image_ids(
    mut candidates: Vec<String>,
    max_samples: Option<usize>,
    shuffle: bool,
    seed: Option<u64>,
) -> Vec<String> {
    if shuffle {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        candidates.shuffle(&mut rng);
    }

    if let Some(max) = max_samples {
        candidates.truncate(max);
    }

    candidates
}

/// Local media path for an image id under a split directory
#[must_use]
pub fn media_path(split_dir: &Path, image_id: &str) -> PathBuf {
    split_dir.join("data").join(format!("{}.jpg", image_id))
}
