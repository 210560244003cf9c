//! Error types for report construction and serialization.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while building or encoding a report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A section with the same name was already added.
    #[error("duplicate report section: {0}")]
    DuplicateSection(String),

    /// The section name collides with a report metadata field.
    #[error("reserved report field used as section name: {0}")]
    ReservedSection(String),

    /// The report could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
