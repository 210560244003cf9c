//! Ordered registry of collection endpoints.
//!
//! The registry is an owned value handed to whoever runs delivery cycles.
//! Order is priority: the engine walks endpoints front to back. `replace`
//! swaps the whole list without checking for duplicates, `append` only adds
//! URLs that are not present yet.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// A collection endpoint URL.
///
/// The URL is kept verbatim. It is only parsed when a transport needs it,
/// so a malformed entry fails that endpoint's attempts instead of the
/// configuration step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    /// Wraps a URL string.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Returns the URL as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Endpoint {
    fn from(url: &str) -> Self {
        Self(url.to_string())
    }
}

impl From<String> for Endpoint {
    fn from(url: String) -> Self {
        Self(url)
    }
}

impl PartialEq<str> for Endpoint {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Endpoint {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Endpoint configuration as written by users: one URL or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EndpointSpec {
    /// A single endpoint URL.
    Single(String),
    /// Endpoint URLs in priority order.
    Many(Vec<String>),
}

impl EndpointSpec {
    /// Expands into endpoints, preserving order.
    pub fn into_endpoints(self) -> Vec<Endpoint> {
        match self {
            Self::Single(url) => vec![Endpoint(url)],
            Self::Many(urls) => urls.into_iter().map(Endpoint).collect(),
        }
    }
}

impl Default for EndpointSpec {
    fn default() -> Self {
        Self::Many(crate::DEFAULT_ENDPOINTS.iter().map(ToString::to_string).collect())
    }
}

impl From<&str> for EndpointSpec {
    fn from(url: &str) -> Self {
        Self::Single(url.to_string())
    }
}

impl From<String> for EndpointSpec {
    fn from(url: String) -> Self {
        Self::Single(url)
    }
}

impl From<Vec<String>> for EndpointSpec {
    fn from(urls: Vec<String>) -> Self {
        Self::Many(urls)
    }
}

impl From<Vec<&str>> for EndpointSpec {
    fn from(urls: Vec<&str>) -> Self {
        Self::Many(urls.into_iter().map(ToString::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for EndpointSpec {
    fn from(urls: [&str; N]) -> Self {
        Self::Many(urls.iter().map(ToString::to_string).collect())
    }
}

/// Ordered, mutable list of delivery endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointRegistry {
    endpoints: Vec<Endpoint>,
}

impl EndpointRegistry {
    /// Creates a registry holding the given endpoints.
    pub fn new(spec: impl Into<EndpointSpec>) -> Self {
        Self { endpoints: spec.into().into_endpoints() }
    }

    /// Creates a registry holding the built-in local collector endpoints.
    pub fn with_defaults() -> Self {
        Self::new(EndpointSpec::default())
    }

    /// Returns a copy of the endpoints in priority order.
    pub fn list(&self) -> Vec<Endpoint> {
        self.endpoints.clone()
    }

    /// Number of registered endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns `true` when no endpoint is registered.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Returns `true` if the exact URL is registered.
    pub fn contains(&self, url: &str) -> bool {
        self.endpoints.iter().any(|endpoint| endpoint.as_str() == url)
    }

    /// Replaces the whole registry. Duplicates in `spec` are kept.
    pub fn replace(&mut self, spec: impl Into<EndpointSpec>) {
        self.endpoints = spec.into().into_endpoints();
        debug!(endpoints = self.endpoints.len(), "endpoint registry replaced");
    }

    /// Replaces the registry from untyped configuration.
    ///
    /// Accepts a JSON string or an array of strings. Anything else leaves
    /// the registry untouched. Returns whether the registry was replaced.
    pub fn replace_value(&mut self, value: &Value) -> bool {
        match EndpointSpec::deserialize(value) {
            Ok(spec) => {
                self.replace(spec);
                true
            },
            Err(e) => {
                warn!(value = %value, error = %e, "ignoring malformed endpoint configuration");
                false
            },
        }
    }

    /// Adds an endpoint at the lowest priority unless already registered.
    ///
    /// Returns whether the endpoint was added.
    pub fn append(&mut self, endpoint: impl Into<Endpoint>) -> bool {
        let endpoint = endpoint.into();
        if self.endpoints.contains(&endpoint) {
            return false;
        }
        self.endpoints.push(endpoint);
        true
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn replace_with_single_url() {
        let mut registry = EndpointRegistry::with_defaults();
        registry.replace("https://a.test");
        assert_eq!(registry.list(), vec![Endpoint::from("https://a.test")]);
    }

    #[test]
    fn replace_keeps_duplicates_and_order() {
        let mut registry = EndpointRegistry::default();
        registry.replace(["https://b.test", "https://a.test", "https://b.test"]);
        assert_eq!(registry.list(), vec!["https://b.test", "https://a.test", "https://b.test"]);
    }

    #[test]
    fn append_skips_existing_url() {
        let mut registry = EndpointRegistry::new("https://a.test");

        assert!(!registry.append("https://a.test"));
        assert_eq!(registry.len(), 1);

        assert!(registry.append("https://b.test"));
        assert_eq!(registry.list(), vec!["https://a.test", "https://b.test"]);
    }

    #[test]
    fn replace_value_ignores_non_url_input() {
        let mut registry = EndpointRegistry::new("https://a.test");

        for malformed in [json!(42), json!(null), json!({"url": "x"}), json!(["ok", 7])] {
            assert!(!registry.replace_value(&malformed));
            assert_eq!(registry.list(), vec!["https://a.test"]);
        }
    }

    #[test]
    fn replace_value_accepts_string_and_array() {
        let mut registry = EndpointRegistry::default();

        assert!(registry.replace_value(&json!("https://a.test")));
        assert_eq!(registry.list(), vec!["https://a.test"]);

        assert!(registry.replace_value(&json!(["https://b.test", "https://c.test"])));
        assert_eq!(registry.list(), vec!["https://b.test", "https://c.test"]);

        assert!(registry.replace_value(&json!([])));
        assert!(registry.is_empty());
    }

    #[test]
    fn list_returns_independent_copy() {
        let registry = EndpointRegistry::new("https://a.test");
        let mut copy = registry.list();
        copy.push(Endpoint::from("https://evil.test"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn default_spec_points_at_local_collector() {
        let registry = EndpointRegistry::with_defaults();
        assert_eq!(registry.list(), crate::DEFAULT_ENDPOINTS.to_vec());
    }
}
