//! Error types for loading records and building reports.
//!
//! Errors are classified by how far they travel:
//! - Recoverable: a single unparsable field, replaced by a default at the
//!   normalization boundary and only counted in the load diagnostics
//! - Surfaced: a referenced project or task that does not exist
//! - Fatal: an export payload with the wrong shape, or I/O on the output side

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Could not parse {field}: {value:?}")]
    Parse { field: &'static str, value: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Invalid export payload: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ReportError {
    pub fn parse(field: &'static str, value: impl Into<String>) -> Self {
        ReportError::Parse {
            field,
            value: value.into(),
        }
    }

    pub fn project_not_found(id: i64) -> Self {
        ReportError::NotFound {
            entity: "Project",
            id,
        }
    }

    /// Returns true if the caller may substitute a default and keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ReportError::Parse { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
