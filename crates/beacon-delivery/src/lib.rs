//! Multi-endpoint report delivery.
//!
//! Walks an ordered [`EndpointRegistry`] snapshot and hands the report to the
//! first endpoint that accepts it. Every endpoint is tried with a
//! deadline-bounded [`PrimaryTransport`] and, when that fails, with a one-way
//! [`FallbackTransport`]. The cycle stops at the first success and reports
//! [`DeliveryError::Exhausted`] when no endpoint accepted the report.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod engine;
pub mod error;
pub mod registry;
pub mod transport;

pub use beacon_core::USER_AGENT;
pub use client::{ClientConfig, HttpFallbackTransport, HttpPrimaryTransport};
pub use engine::{DeliveryConfig, DeliveryEngine, DeliveryOutcome};
pub use error::{DeliveryError, ErrorCategory, Result};
pub use registry::{Endpoint, EndpointRegistry, EndpointSpec};
pub use transport::{
    encode_fallback_payload, fallback_url, FallbackTransport, PrimaryReceipt, PrimaryTransport,
    TransportKind,
};

/// Endpoints used when none are configured: a collector on the local host.
pub const DEFAULT_ENDPOINTS: [&str; 2] =
    ["http://127.0.0.1:5000/metrics", "http://localhost:5000/metrics"];

/// Default deadline for one primary attempt, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Default value of the fallback `source` query parameter.
pub const DEFAULT_SOURCE: &str = "beacon";
