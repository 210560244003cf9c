//! Error types for report delivery.
//!
//! Covers failures of the primary transport (network, timeout, rejection),
//! failures to issue the fallback transport, and exhaustion of the whole
//! endpoint list. Only `Exhausted` ever leaves the engine; everything else
//! is recovered inside a delivery cycle and logged with its category.

use std::fmt;

use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Error conditions raised while delivering a report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Network-level failure of the primary transport.
    #[error("network request failed: {message}")]
    NetworkError {
        /// Error message describing the network failure
        message: String,
    },

    /// Primary transport did not complete before its deadline.
    #[error("request timeout after {timeout_ms}ms")]
    Timeout {
        /// Deadline that was exceeded in milliseconds
        timeout_ms: u64,
    },

    /// Primary transport observed its cancellation token.
    #[error("request cancelled")]
    Cancelled,

    /// Report could not be encoded for a transport.
    #[error("failed to encode report: {message}")]
    EncodingError {
        /// Encoding error message
        message: String,
    },

    /// Endpoint is not usable as a request target.
    #[error("invalid endpoint {endpoint}: {message}")]
    InvalidEndpoint {
        /// Offending endpoint URL
        endpoint: String,
        /// Why the endpoint was rejected
        message: String,
    },

    /// Fallback request could not be issued.
    #[error("fallback issue failed: {message}")]
    IssueFailed {
        /// Issue error message
        message: String,
    },

    /// Transport could not be constructed from its configuration.
    #[error("invalid transport configuration: {message}")]
    ConfigurationError {
        /// Configuration error message
        message: String,
    },

    /// Every endpoint was tried with both transports and none delivered.
    #[error("all delivery endpoints failed ({attempted} attempted)")]
    Exhausted {
        /// Number of endpoints attempted in the cycle
        attempted: usize,
    },
}

impl DeliveryError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Creates an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::EncodingError { message: message.into() }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEndpoint { endpoint: endpoint.into(), message: message.into() }
    }

    /// Creates a fallback issue error.
    pub fn issue_failed(message: impl Into<String>) -> Self {
        Self::IssueFailed { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Creates an exhaustion error.
    pub fn exhausted(attempted: usize) -> Self {
        Self::Exhausted { attempted }
    }
}

/// Category of delivery error for structured log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network connectivity issues, including timeouts.
    Network,
    /// Report encoding problems.
    Encoding,
    /// Endpoint or transport configuration problems.
    Configuration,
    /// Fallback issuance problems.
    Issue,
    /// Whole cycle failed.
    Exhausted,
}

impl From<&DeliveryError> for ErrorCategory {
    fn from(error: &DeliveryError) -> Self {
        match error {
            DeliveryError::NetworkError { .. }
            | DeliveryError::Timeout { .. }
            | DeliveryError::Cancelled => Self::Network,
            DeliveryError::EncodingError { .. } => Self::Encoding,
            DeliveryError::InvalidEndpoint { .. } | DeliveryError::ConfigurationError { .. } => {
                Self::Configuration
            },
            DeliveryError::IssueFailed { .. } => Self::Issue,
            DeliveryError::Exhausted { .. } => Self::Exhausted,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Encoding => write!(f, "encoding"),
            Self::Configuration => write!(f, "configuration"),
            Self::Issue => write!(f, "issue"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_categories_mapped_correctly() {
        assert_eq!(ErrorCategory::from(&DeliveryError::timeout(10)), ErrorCategory::Network);
        assert_eq!(ErrorCategory::from(&DeliveryError::encoding("x")), ErrorCategory::Encoding);
        assert_eq!(
            ErrorCategory::from(&DeliveryError::invalid_endpoint("x", "y")),
            ErrorCategory::Configuration
        );
        assert_eq!(ErrorCategory::from(&DeliveryError::exhausted(0)), ErrorCategory::Exhausted);
    }

    #[test]
    fn error_display_format() {
        assert_eq!(DeliveryError::timeout(3000).to_string(), "request timeout after 3000ms");
        assert_eq!(
            DeliveryError::exhausted(2).to_string(),
            "all delivery endpoints failed (2 attempted)"
        );
    }
}
