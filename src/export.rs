//! Dataset export to flat files
//!
//! Exports are written to a temporary file next to the target and persisted in
//! one rename, so readers never observe a half-written export and a failed
//! export leaves any previous file untouched.

use crate::config::{ExportFormat, ExportRequest};
use crate::dataset::{Dataset, Labels, Sample, DETECTIONS_FIELD};
use crate::error::{Result, ZooError};
use serde_json::{Map, Value};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Outcome of an export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// File that was written
    pub path: PathBuf,
    pub format: ExportFormat,
    pub label_field: String,
    /// Samples in the exported dataset
    pub samples: usize,
    /// Records written (CSV: one per label, JSON Lines: one per sample)
    pub records: usize,
    /// Whether an existing file was replaced
    pub replaced: bool,
}

/// Write `dataset` to disk as described by `request`
///
/// # Errors
/// - Invalid export request
/// - Label field not present in the dataset
/// - `ExportTargetExists` when the target exists and `overwrite` is false
/// - I/O errors when the target directory is not writable
pub fn export_dataset(dataset: &Dataset, request: &ExportRequest) -> Result<ExportSummary> {
    request.validate()?;
    dataset.require_label_field(&request.label_field)?;

    let path = &request.output_path;
    let _span = crate::tracing_config::spans::export(path, &request.format.to_string()).entered();

    let replaced = path.exists();
    if replaced && !request.overwrite {
        return Err(ZooError::ExportTargetExists(path.clone()));
    }

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .map_err(|e| ZooError::file_io_error("create export directory", &parent, &e))?;

    let mut temp_file = NamedTempFile::new_in(&parent)
        .map_err(|e| ZooError::file_io_error("create temporary export file", &parent, &e))?;

    let records = match request.format {
        ExportFormat::Csv => write_csv(dataset, &request.label_field, temp_file.as_file_mut())?,
        ExportFormat::JsonLines => {
            write_json_lines(dataset, &request.label_field, temp_file.as_file_mut())?
        },
    };

    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| ZooError::file_io_error("sync export", temp_file.path(), &e))?;

    persist(temp_file, path, request.overwrite)?;

    log::info!(
        "Exported {} records from {} samples to {}",
        records,
        dataset.len(),
        path.display()
    );

    Ok(ExportSummary {
        path: path.clone(),
        format: request.format,
        label_field: request.label_field.clone(),
        samples: dataset.len(),
        records,
        replaced,
    })
}

fn persist(temp_file: NamedTempFile, path: &Path, overwrite: bool) -> Result<()> {
    let result = if overwrite {
        temp_file.persist(path)
    } else {
        temp_file.persist_noclobber(path)
    };

    result.map(|_| ()).map_err(|e| {
        if !overwrite && e.error.kind() == std::io::ErrorKind::AlreadyExists {
            ZooError::ExportTargetExists(path.to_path_buf())
        } else {
            ZooError::file_io_error("write export", path, &e.error)
        }
    })
}

/// Box annotations are human-verified and carry no score of their own
const DETECTION_CONFIDENCE: f32 = 1.0;

fn csv_header(label_field: &str) -> Vec<&str> {
    if label_field == DETECTIONS_FIELD {
        vec![
            "filepath",
            "open_images_id",
            label_field,
            "confidence",
            "x",
            "y",
            "width",
            "height",
        ]
    } else {
        vec!["filepath", "open_images_id", label_field, "confidence"]
    }
}

fn write_csv<W: Write>(dataset: &Dataset, label_field: &str, writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(csv_header(label_field))?;

    let mut records = 0;
    for sample in dataset.iter() {
        let filepath = sample.filepath.display().to_string();
        match sample.get(label_field) {
            Some(Labels::Classifications(items)) => {
                for item in items {
                    csv_writer.write_record([
                        filepath.as_str(),
                        sample.id.as_str(),
                        item.label.as_str(),
                        item.confidence.to_string().as_str(),
                    ])?;
                    records += 1;
                }
            },
            Some(Labels::Detections(items)) => {
                for item in items {
                    let [x, y, width, height] = item.bounding_box;
                    csv_writer.write_record([
                        filepath.clone(),
                        sample.id.clone(),
                        item.label.clone(),
                        DETECTION_CONFIDENCE.to_string(),
                        x.to_string(),
                        y.to_string(),
                        width.to_string(),
                        height.to_string(),
                    ])?;
                    records += 1;
                }
            },
            None => {},
        }
    }

    csv_writer.flush()?;
    Ok(records)
}

fn json_record(sample: &Sample, label_field: &str) -> Result<Value> {
    let mut record = Map::new();
    record.insert(
        "filepath".to_string(),
        Value::String(sample.filepath.display().to_string()),
    );
    record.insert(
        "open_images_id".to_string(),
        Value::String(sample.id.clone()),
    );
    let labels = match sample.get(label_field) {
        Some(labels) => serde_json::to_value(labels)?,
        None => Value::Null,
    };
    record.insert(label_field.to_string(), labels);
    Ok(Value::Object(record))
}

fn write_json_lines<W: Write>(dataset: &Dataset, label_field: &str, writer: W) -> Result<usize> {
    let mut writer = BufWriter::new(writer);

    for sample in dataset.iter() {
        serde_json::to_writer(&mut writer, &json_record(sample, label_field)?)?;
        writer.write_all(b"\n")?;
    }

    writer.flush()?;
    Ok(dataset.len())
}
