//! Transport seams used by the delivery engine.
//!
//! Each endpoint is tried with a [`PrimaryTransport`] first: a structured
//! request carrying the report as its body, which can be cancelled and whose
//! completion is observed. When it fails the engine issues the report
//! through a [`FallbackTransport`]: a plain resource fetch with the report
//! packed into the query string. The fallback is one-way. Issuing it is the
//! only thing the engine can observe.

use std::{fmt, future::Future, pin::Pin, time::Duration};

use base64::prelude::*;
use bytes::Bytes;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{DeliveryError, Result},
    registry::Endpoint,
};

/// Which transport delivered a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Structured POST with a JSON body.
    Primary,
    /// Query-string GET issued without waiting for its completion.
    Fallback,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Completion details of a primary request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryReceipt {
    /// HTTP status returned by the collector. Not used to decide success.
    pub status: u16,
}

/// Structured, cancellable transport that carries the report as a body.
pub trait PrimaryTransport: Send + Sync + fmt::Debug {
    /// Sends `body` to `endpoint`.
    ///
    /// Completes with `Ok` as soon as the exchange finishes, whatever the
    /// response status. Implementations should stop work and return
    /// `DeliveryError::Cancelled` once `cancel` fires.
    fn send<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        body: Bytes,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<PrimaryReceipt>> + Send + 'a>>;
}

/// One-way transport used when the primary one fails.
pub trait FallbackTransport: Send + Sync + fmt::Debug {
    /// Issues the fallback request for `endpoint` carrying the report JSON.
    ///
    /// Returns once the request has been handed off. The request's own
    /// outcome is not reported back.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be built or handed off.
    fn issue(&self, endpoint: &Endpoint, report_json: &[u8]) -> Result<()>;

    /// Waits up to `timeout` for issued requests to finish and returns how
    /// many were still running. Used before process exit only; delivery
    /// cycles never wait on it.
    fn flush(&self, _timeout: Duration) -> Pin<Box<dyn Future<Output = usize> + Send + '_>> {
        Box::pin(std::future::ready(0))
    }
}

/// Encodes the report JSON into the fallback `data` parameter value.
pub fn encode_fallback_payload(report_json: &[u8]) -> String {
    BASE64_STANDARD.encode(report_json)
}

/// Builds the fallback URL for an endpoint.
///
/// Appends `data`, `fallback=true` and `source` to whatever query the
/// endpoint already carries. Only `http` and `https` endpoints are accepted.
///
/// # Errors
///
/// Returns `DeliveryError::InvalidEndpoint` when the endpoint is not an
/// absolute http(s) URL.
pub fn fallback_url(endpoint: &Endpoint, report_json: &[u8], source: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint.as_str())
        .map_err(|e| DeliveryError::invalid_endpoint(endpoint.as_str(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(DeliveryError::invalid_endpoint(
            endpoint.as_str(),
            format!("unsupported scheme {}", url.scheme()),
        ));
    }

    url.query_pairs_mut()
        .append_pair("data", &encode_fallback_payload(report_json))
        .append_pair("fallback", "true")
        .append_pair("source", source);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn decode_data_param(url: &Url) -> Value {
        let data = url
            .query_pairs()
            .find(|(key, _)| key == "data")
            .map(|(_, value)| value.into_owned())
            .unwrap();
        serde_json::from_slice(&BASE64_STANDARD.decode(data).unwrap()).unwrap()
    }

    #[test]
    fn fallback_url_carries_report_and_markers() {
        let report = json!({"ip": "198.51.100.4", "note": "a+b/c=?&"});
        let body = serde_json::to_vec(&report).unwrap();

        let url = fallback_url(&Endpoint::from("https://collector.test/metrics"), &body, "beacon")
            .unwrap();

        assert_eq!(url.path(), "/metrics");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[1], ("fallback".to_string(), "true".to_string()));
        assert_eq!(pairs[2], ("source".to_string(), "beacon".to_string()));
        assert_eq!(decode_data_param(&url), report);
    }

    #[test]
    fn fallback_url_preserves_existing_query() {
        let url =
            fallback_url(&Endpoint::from("https://collector.test/m?site=7"), b"{}", "beacon")
                .unwrap();

        let keys: Vec<String> = url.query_pairs().map(|(key, _)| key.into_owned()).collect();
        assert_eq!(keys, vec!["site", "data", "fallback", "source"]);
    }

    #[test]
    fn fallback_url_percent_encodes_base64_alphabet() {
        // 0xfb 0xff encodes to "+/8=" in standard base64
        let url =
            fallback_url(&Endpoint::from("http://collector.test/"), &[0xfb, 0xff], "s").unwrap();
        let query = url.query().unwrap();

        assert!(query.starts_with("data=%2B%2F8%3D&"), "query was {query}");
    }

    #[test]
    fn fallback_url_rejects_unusable_endpoints() {
        for endpoint in ["not a url", "/relative/path", "ftp://collector.test/"] {
            let err = fallback_url(&Endpoint::from(endpoint), b"{}", "beacon").unwrap_err();
            assert!(matches!(err, DeliveryError::InvalidEndpoint { .. }), "{endpoint}: {err}");
        }
    }

    #[test]
    fn transport_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_value(TransportKind::Fallback).unwrap(), json!("fallback"));
        assert_eq!(TransportKind::Primary.to_string(), "primary");
    }
}
