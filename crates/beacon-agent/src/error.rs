//! Error types for reporting sessions.

use beacon_collect::CollectError;
use beacon_delivery::DeliveryError;
use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Failure of one stage of a reporting session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Report assembly failed.
    #[error(transparent)]
    Collect(#[from] CollectError),

    /// No endpoint accepted the report.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Session components could not be built.
    #[error("failed to set up session: {message}")]
    Setup {
        /// What could not be built
        message: String,
    },
}

impl SessionError {
    /// Creates a setup error.
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup { message: message.into() }
    }
}
