//! Mock collector and lookup services backed by wiremock.

use std::time::Duration;

use anyhow::{Context, Result};
use base64::prelude::*;
use beacon_delivery::Endpoint;
use serde_json::{json, Value};
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

/// A local HTTP server standing in for collectors and lookup services.
pub struct MockCollector {
    server: MockServer,
}

impl MockCollector {
    /// Starts a server on a random local port.
    pub async fn start() -> Self {
        Self { server: MockServer::start().await }
    }

    /// Base URL of the server.
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Endpoint pointing at `path` on this server.
    pub fn endpoint(&self, path: &str) -> Endpoint {
        Endpoint::new(format!("{}{path}", self.server.uri()))
    }

    /// Accepts primary POSTs on `path` with `status`.
    pub async fn accept_primary(&self, path: &str, status: u16) {
        Mock::given(matchers::method("POST"))
            .and(matchers::path(path))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Answers primary POSTs on `path` only after `delay`.
    pub async fn stall_primary(&self, path: &str, delay: Duration) {
        Mock::given(matchers::method("POST"))
            .and(matchers::path(path))
            .respond_with(ResponseTemplate::new(200).set_delay(delay))
            .mount(&self.server)
            .await;
    }

    /// Accepts fallback GETs on `path`.
    pub async fn accept_fallback(&self, path: &str) {
        Mock::given(matchers::method("GET"))
            .and(matchers::path(path))
            .and(matchers::query_param("fallback", "true"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.server)
            .await;
    }

    /// Serves `{"ip": ip}` on `path`.
    pub async fn serve_ip(&self, path: &str, ip: &str) {
        Mock::given(matchers::method("GET"))
            .and(matchers::path(path))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ip": ip })))
            .mount(&self.server)
            .await;
    }

    /// Serves `body` with `status` on `path`.
    pub async fn serve_json(&self, path: &str, status: u16, body: Value) {
        Mock::given(matchers::method("GET"))
            .and(matchers::path(path))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Reports received through the primary transport, in arrival order.
    pub async fn primary_reports(&self) -> Result<Vec<Value>> {
        let requests = self.server.received_requests().await.unwrap_or_default();
        requests
            .iter()
            .filter(|request| request.method.as_str() == "POST")
            .map(|request| {
                serde_json::from_slice(&request.body).context("primary body is not JSON")
            })
            .collect()
    }

    /// Reports received through the fallback transport, in arrival order.
    pub async fn fallback_reports(&self) -> Result<Vec<Value>> {
        let requests = self.server.received_requests().await.unwrap_or_default();
        requests
            .iter()
            .filter(|request| request.method.as_str() == "GET")
            .filter_map(|request| {
                request
                    .url
                    .query_pairs()
                    .find(|(key, _)| key == "data")
                    .map(|(_, value)| value.into_owned())
            })
            .map(|data| decode_fallback_data(&data))
            .collect()
    }

    /// Query parameters of every fallback request, in arrival order.
    pub async fn fallback_queries(&self) -> Vec<Vec<(String, String)>> {
        let requests = self.server.received_requests().await.unwrap_or_default();
        requests
            .iter()
            .filter(|request| request.method.as_str() == "GET")
            .map(|request| request.url.query_pairs().into_owned().collect())
            .collect()
    }
}

/// Decodes the `data` query value of a fallback request into report JSON.
///
/// # Errors
///
/// Returns an error if the value is not base64 or not JSON.
pub fn decode_fallback_data(data: &str) -> Result<Value> {
    let raw = BASE64_STANDARD.decode(data).context("fallback data is not base64")?;
    serde_json::from_slice(&raw).context("fallback data is not JSON")
}
