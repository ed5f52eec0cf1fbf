//! Error types for dataset zoo operations

use thiserror::Error;

/// Result type alias for dataset zoo operations
pub type Result<T> = std::result::Result<T, ZooError>;

/// Error types for fetching, caching and exporting zoo datasets
#[derive(Error, Debug)]
pub enum ZooError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP or transport failures while talking to a dataset mirror
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Dataset name not present in the zoo catalog
    #[error("Unknown zoo dataset '{name}'. Available datasets: {available}")]
    UnknownDataset { name: String, available: String },

    /// Split not provided by the requested dataset
    #[error("Dataset '{dataset}' has no split '{split}'. Supported splits: {supported}")]
    UnsupportedSplit {
        dataset: String,
        split: String,
        supported: String,
    },

    /// Label type not provided by the requested dataset
    #[error("Dataset '{dataset}' does not provide '{label_type}' labels")]
    UnsupportedLabelType { dataset: String, label_type: String },

    /// Class names missing from the dataset's label vocabulary
    #[error("Unknown classes for dataset '{dataset}': {}", .classes.join(", "))]
    UnknownClasses { dataset: String, classes: Vec<String> },

    /// Export requested a label field the dataset does not carry
    #[error("Dataset has no label field '{field}'. Available fields: {available}")]
    UnknownLabelField { field: String, available: String },

    /// Export target exists and overwriting was not requested
    #[error("Export target '{}' already exists. Pass overwrite to replace it", .0.display())]
    ExportTargetExists(std::path::PathBuf),

    /// Malformed annotation content
    #[error("Annotation error: {0}")]
    Annotation(String),

    /// CSV reading or writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ZooError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new annotation error
    pub fn annotation<S: Into<String>>(msg: S) -> Self {
        Self::Annotation(msg.into())
    }

    /// Create a network error wrapping the underlying cause
    pub fn network_error<S, E>(msg: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message: msg.into(),
            source: Box::new(source),
        }
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create annotation error pointing at the offending file and row
    pub fn annotation_row_error<P: AsRef<std::path::Path>>(
        path: P,
        row: u64,
        details: &str,
    ) -> Self {
        Self::Annotation(format!(
            "{} (row {}): {}",
            path.as_ref().display(),
            row,
            details
        ))
    }
}
