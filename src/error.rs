//! Error types for the DBI pipeline

use thiserror::Error;

/// Errors that halt a pipeline run.
///
/// Row-level problems (unparseable numbers, zero totals, bad dates) are never
/// errors; they surface as absent fields on the scored rows instead.
#[derive(Debug, Error)]
pub enum DbiError {
    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Input has no header row")]
    EmptyInput,
}
