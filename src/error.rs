//! Error types for schema loading, projection and validation

use std::path::PathBuf;

use thiserror::Error;

/// Result type for projector operations
pub type Result<T> = std::result::Result<T, ProjectError>;

/// Projector errors
///
/// Configuration errors abort the whole run. Data errors abort only the
/// file being converted; the batch moves on to the next one.
#[derive(Error, Debug)]
pub enum ProjectError {
    // ---- configuration ----
    #[error("Unresolved schema reference: {reference} (in {document})")]
    UnresolvedReference { reference: String, document: String },

    #[error("Failed to read schema {path}: {reason}")]
    SchemaRead { path: PathBuf, reason: String },

    #[error("Invalid extension block in {path}: {reason}")]
    InvalidExtension { path: String, reason: String },

    #[error("Unknown content: {0}")]
    UnknownContent(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    // ---- data ----
    #[error("Cannot read '{value}' as {expected} in column '{column}'. row: {row}")]
    Coercion {
        column: String,
        value: String,
        expected: &'static str,
        row: String,
    },

    #[error("Sheet '{sheet}' not found in {file}")]
    MissingSheet { sheet: String, file: String },

    #[error("Duplicate key {key}={value} in {property}")]
    DuplicateKey {
        key: String,
        value: String,
        property: String,
    },

    #[error("Failed to read workbook {path}: {reason}")]
    Workbook { path: PathBuf, reason: String },

    // ---- validation ----
    #[error("{file} failed validation with {} error(s)", errors.len())]
    Validation { file: PathBuf, errors: Vec<String> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProjectError {
    /// Whether the error indicates a broken configuration rather than bad data
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProjectError::UnresolvedReference { .. }
                | ProjectError::SchemaRead { .. }
                | ProjectError::InvalidExtension { .. }
                | ProjectError::UnknownContent(_)
                | ProjectError::Config(_)
        )
    }
}
