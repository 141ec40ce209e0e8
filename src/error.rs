//! Error types for the gnps-rdd library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum RddError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Mutually exclusive or missing inputs, or columns a request depends on.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unrecognized file extension for a tabular input.
    #[error("Unsupported file format '{path}': must be a CSV, TSV, or TXT file")]
    Format { path: String },

    #[error("File not found: {0}")]
    NotFound(String),

    /// A filter or join produced zero rows where at least one is required.
    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Missing column '{0}'")]
    MissingColumn(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RddError {
    /// True for errors caused by the caller's choice of inputs rather than data.
    pub fn is_config(&self) -> bool {
        matches!(self, RddError::Config(_) | RddError::MissingColumn(_))
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, RddError>;
