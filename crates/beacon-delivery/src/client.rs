//! HTTP transports for report delivery.
//!
//! [`HttpPrimaryTransport`] POSTs the report JSON and reports completion
//! regardless of response status. [`HttpFallbackTransport`] issues a
//! body-less GET carrying the report in its query string on a detached task
//! and returns immediately.

use std::{future::Future, pin::Pin, time::Duration};

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, debug_span, warn, Instrument};

use crate::{
    error::{DeliveryError, Result},
    registry::Endpoint,
    transport::{fallback_url, FallbackTransport, PrimaryReceipt, PrimaryTransport},
};

/// Configuration shared by the HTTP transports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// User agent string for requests.
    pub user_agent: String,
    /// Maximum number of redirects to follow.
    pub max_redirects: u32,
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
    /// Value of the `source` query parameter on fallback requests.
    pub source: String,
    /// Upper bound on a detached fallback request.
    pub fallback_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: crate::USER_AGENT.to_string(),
            max_redirects: 3,
            verify_tls: true,
            source: crate::DEFAULT_SOURCE.to_string(),
            fallback_timeout: Duration::from_secs(10),
        }
    }
}

fn build_client(config: &ClientConfig, timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects as usize))
        .danger_accept_invalid_certs(!config.verify_tls);

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder
        .build()
        .map_err(|e| DeliveryError::configuration(format!("failed to build HTTP client: {e}")))
}

/// POSTs the report JSON to the endpoint.
///
/// The client carries no timeout of its own: the engine bounds each attempt
/// and signals expiry through the cancellation token.
#[derive(Debug, Clone)]
pub struct HttpPrimaryTransport {
    client: reqwest::Client,
}

impl HttpPrimaryTransport {
    /// Creates a primary transport with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ConfigurationError` if the HTTP client cannot
    /// be configured with the provided settings.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self { client: build_client(config, None)? })
    }
}

impl PrimaryTransport for HttpPrimaryTransport {
    fn send<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        body: Bytes,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<PrimaryReceipt>> + Send + 'a>> {
        Box::pin(async move {
            let request = self
                .client
                .post(endpoint.as_str())
                .header(CONTENT_TYPE, "application/json")
                .body(body);

            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DeliveryError::Cancelled),
                result = request.send() => result.map_err(|e| categorize(endpoint, &e))?,
            };

            let status = response.status();
            if status.is_success() {
                debug!(status = status.as_u16(), "primary request completed");
            } else {
                // Completion counts as delivered; the status is only reported.
                warn!(status = status.as_u16(), "primary request completed with error status");
            }

            Ok(PrimaryReceipt { status: status.as_u16() })
        })
    }
}

fn categorize(endpoint: &Endpoint, error: &reqwest::Error) -> DeliveryError {
    if error.is_builder() {
        return DeliveryError::invalid_endpoint(endpoint.as_str(), error.to_string());
    }
    if error.is_connect() {
        return DeliveryError::network(format!("connection failed: {error}"));
    }
    DeliveryError::network(error.to_string())
}

/// Issues report-in-query GET requests without waiting for them.
///
/// Issued requests run on the current tokio runtime. [`flush`] lets a
/// process that is about to exit give them a bounded chance to finish.
///
/// [`flush`]: FallbackTransport::flush
#[derive(Debug, Clone)]
pub struct HttpFallbackTransport {
    client: reqwest::Client,
    source: String,
    in_flight: TaskTracker,
}

impl HttpFallbackTransport {
    /// Creates a fallback transport with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ConfigurationError` if the HTTP client cannot
    /// be configured with the provided settings.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config, Some(config.fallback_timeout))?,
            source: config.source.clone(),
            in_flight: TaskTracker::new(),
        })
    }

    /// Number of issued requests that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl FallbackTransport for HttpFallbackTransport {
    fn issue(&self, endpoint: &Endpoint, report_json: &[u8]) -> Result<()> {
        let url = fallback_url(endpoint, report_json, &self.source)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DeliveryError::issue_failed(format!("no async runtime: {e}")))?;

        let client = self.client.clone();
        let span = debug_span!("fallback_request", endpoint = %endpoint);
        let request = async move {
            match client.get(url).send().await {
                Ok(response) => {
                    debug!(status = response.status().as_u16(), "fallback request completed");
                },
                Err(e) => debug!(error = %e, "fallback request failed"),
            }
        }
        .instrument(span);

        runtime.spawn(self.in_flight.track_future(request));
        Ok(())
    }

    fn flush(&self, timeout: Duration) -> Pin<Box<dyn Future<Output = usize> + Send + '_>> {
        Box::pin(async move {
            self.in_flight.close();
            let _ = tokio::time::timeout(timeout, self.in_flight.wait()).await;
            self.in_flight.reopen();
            self.in_flight.len()
        })
    }
}
