// ⚠️ Pipeline errors
//
// Only boundary problems are errors: malformed input tables, storage and
// serialization failures, or a report asking for a column its table lacks.
// Unmatched foreign keys land in JoinReport, zero denominators in Measure.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Schema mismatch: table '{table}' is missing required column '{column}'")]
    SchemaMismatch { table: String, column: String },

    #[error("Invalid order timestamp: '{value}'")]
    InvalidTimestamp { value: String },

    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Expected {expected} group key(s) for {operation}, got {actual}")]
    KeyArity {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Depends on report '{report}', which failed")]
    DependencyFailed { report: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
