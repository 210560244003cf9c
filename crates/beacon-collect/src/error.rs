//! Error types for attribute collection.
//!
//! Producers never surface these to the report: a failing producer turns its
//! error into a [`beacon_core::Section::Unavailable`]. Only assembly errors
//! (a section name clash) leave the assembler.

use beacon_core::CoreError;
use thiserror::Error;

/// Result type alias for collection operations.
pub type Result<T> = std::result::Result<T, CollectError>;

/// Error conditions raised while collecting attributes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectError {
    /// HTTP lookup did not complete.
    #[error("lookup request failed: {message}")]
    Http {
        /// Error message describing the failure
        message: String,
    },

    /// Lookup service answered with something other than the expected JSON.
    #[error("invalid lookup response: {message}")]
    InvalidResponse {
        /// What was wrong with the response
        message: String,
    },

    /// Lookup service answered with an explicit error.
    #[error("lookup rejected: {reason}")]
    Rejected {
        /// Reason reported by the service
        reason: String,
    },

    /// Report could not be assembled from the collected sections.
    #[error("report assembly failed: {0}")]
    Assembly(#[from] CoreError),
}

impl CollectError {
    /// Creates an HTTP lookup error.
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http { message: message.into() }
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse { message: message.into() }
    }

    /// Creates a rejected lookup error.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected { reason: reason.into() }
    }
}

impl From<reqwest::Error> for CollectError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::invalid_response(error.to_string())
        } else {
            Self::http(error.to_string())
        }
    }
}
