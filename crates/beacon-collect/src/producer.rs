//! Producer seams used by the assembler.

use std::fmt;

use beacon_core::Section;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Sentinel returned by an [`IpResolver`] that could not find the address.
pub const UNKNOWN_IP: &str = "Unknown";

/// Report sections that can be switched off by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    /// Geolocation from the resolved IP address.
    Location,
    /// CPU and memory probes.
    Hardware,
    /// Timing, load and process memory probes.
    Performance,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Location => write!(f, "location"),
            Self::Hardware => write!(f, "hardware"),
            Self::Performance => write!(f, "performance"),
        }
    }
}

/// Independent, best-effort producer of one report section.
///
/// Collectors never fail: whatever goes wrong is reported as
/// [`Section::Unavailable`].
pub trait Collector: Send + Sync + fmt::Debug {
    /// Name of the section this collector fills.
    fn name(&self) -> &str;

    /// Gathers the section.
    fn collect(&self) -> BoxFuture<'_, Section>;
}

/// Resolves the public IP address of the host.
pub trait IpResolver: Send + Sync + fmt::Debug {
    /// Returns the address, or [`UNKNOWN_IP`] when every source failed.
    fn resolve(&self) -> BoxFuture<'_, String>;
}

/// Maps an IP address to an approximate location.
pub trait LocationLookup: Send + Sync + fmt::Debug {
    /// Looks up `ip`.
    ///
    /// # Errors
    ///
    /// Returns an error when the lookup service is unreachable or answers
    /// with an error. The assembler swallows it.
    fn locate<'a>(&'a self, ip: &'a str) -> BoxFuture<'a, Result<Value>>;
}
