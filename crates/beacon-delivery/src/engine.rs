//! Delivery engine walking endpoints in priority order.
//!
//! One delivery cycle takes an assembled report and a snapshot of the
//! endpoint list. Each endpoint gets a deadline-bounded primary attempt and,
//! if that fails, a fallback issue. The first endpoint that accepts either
//! ends the cycle. Endpoints are never retried within a cycle.

use std::{sync::Arc, time::Duration};

use beacon_core::{Clock, Report};
use bytes::Bytes;
use serde::{ser::SerializeStruct, Deserialize, Serialize, Serializer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    client::{ClientConfig, HttpFallbackTransport, HttpPrimaryTransport},
    error::{DeliveryError, ErrorCategory, Result},
    registry::{Endpoint, EndpointRegistry},
    transport::{FallbackTransport, PrimaryReceipt, PrimaryTransport, TransportKind},
};

/// Configuration for the delivery engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Deadline for a single primary attempt.
    pub timeout: Duration,
}

impl DeliveryConfig {
    /// Primary attempt deadline in whole milliseconds.
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self { timeout: Duration::from_millis(crate::DEFAULT_TIMEOUT_MS) }
    }
}

/// Successful end of a delivery cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Endpoint that took the report.
    pub endpoint: Endpoint,
    /// Transport that carried it.
    pub transport: TransportKind,
}

impl Serialize for DeliveryOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DeliveryOutcome", 3)?;
        state.serialize_field("success", &true)?;
        state.serialize_field("endpoint", &self.endpoint)?;
        state.serialize_field("transport", &self.transport)?;
        state.end()
    }
}

/// Delivers reports to the first endpoint that accepts them.
#[derive(Debug, Clone)]
pub struct DeliveryEngine {
    config: DeliveryConfig,
    primary: Arc<dyn PrimaryTransport>,
    fallback: Arc<dyn FallbackTransport>,
    clock: Arc<dyn Clock>,
}

impl DeliveryEngine {
    /// Creates an engine using the HTTP transports.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ConfigurationError` if an HTTP client cannot
    /// be built from `client_config`.
    pub fn new(
        config: DeliveryConfig,
        client_config: &ClientConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let primary = Arc::new(HttpPrimaryTransport::new(client_config)?);
        let fallback = Arc::new(HttpFallbackTransport::new(client_config)?);
        Ok(Self::with_transports(config, primary, fallback, clock))
    }

    /// Creates an engine with explicit transports.
    pub fn with_transports(
        config: DeliveryConfig,
        primary: Arc<dyn PrimaryTransport>,
        fallback: Arc<dyn FallbackTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { config, primary, fallback, clock }
    }

    /// Runs a delivery cycle against the registry's current endpoints.
    ///
    /// # Errors
    ///
    /// See [`DeliveryEngine::deliver`].
    pub async fn deliver_to(
        &self,
        report: &Report,
        registry: &EndpointRegistry,
    ) -> Result<DeliveryOutcome> {
        let snapshot = registry.list();
        self.deliver(report, &snapshot).await
    }

    /// Runs a delivery cycle over `endpoints` in order.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Exhausted` when no endpoint accepted the
    /// report through either transport, including when `endpoints` is empty.
    pub async fn deliver(
        &self,
        report: &Report,
        endpoints: &[Endpoint],
    ) -> Result<DeliveryOutcome> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("delivery_cycle", %cycle_id, endpoints = endpoints.len());

        async move {
            if endpoints.is_empty() {
                warn!("no delivery endpoints configured");
                return Err(DeliveryError::exhausted(0));
            }

            let payload =
                report.to_json_bytes().map_err(|e| DeliveryError::encoding(e.to_string()));

            for endpoint in endpoints {
                let attempt_span = debug_span!("endpoint_attempt", endpoint = %endpoint);
                if let Some(transport) =
                    self.deliver_to_endpoint(endpoint, &payload).instrument(attempt_span).await
                {
                    info!(endpoint = %endpoint, transport = %transport, "report delivered");
                    return Ok(DeliveryOutcome { endpoint: endpoint.clone(), transport });
                }
            }

            error!(attempted = endpoints.len(), "all delivery endpoints failed");
            Err(DeliveryError::exhausted(endpoints.len()))
        }
        .instrument(span)
        .await
    }

    /// Waits up to `timeout` for issued fallback requests to finish.
    ///
    /// Returns how many were still running when the wait ended.
    pub async fn flush(&self, timeout: Duration) -> usize {
        self.fallback.flush(timeout).await
    }

    /// Tries both transports against one endpoint.
    ///
    /// Returns the transport that took the report, or `None` when the
    /// endpoint should be skipped.
    async fn deliver_to_endpoint(
        &self,
        endpoint: &Endpoint,
        payload: &Result<Bytes>,
    ) -> Option<TransportKind> {
        let started = self.clock.now();

        match self.attempt_primary(endpoint, payload).await {
            Ok(receipt) => {
                debug!(
                    status = receipt.status,
                    duration_ms = self.clock.now().duration_since(started).as_millis(),
                    "primary transport completed"
                );
                return Some(TransportKind::Primary);
            },
            Err(error) => {
                debug!(
                    error = %error,
                    category = %ErrorCategory::from(&error),
                    duration_ms = self.clock.now().duration_since(started).as_millis(),
                    "primary transport failed, issuing fallback"
                );
            },
        }

        match self.attempt_fallback(endpoint, payload) {
            Ok(()) => Some(TransportKind::Fallback),
            Err(error) => {
                warn!(
                    endpoint = %endpoint,
                    error = %error,
                    category = %ErrorCategory::from(&error),
                    "failed to send to endpoint"
                );
                None
            },
        }
    }

    /// Races one primary attempt against its deadline.
    ///
    /// The deadline is armed here and dropped with the `select!`, so it can
    /// never fire after the attempt resolved. When the deadline wins, the
    /// attempt is dropped and its token cancelled.
    async fn attempt_primary(
        &self,
        endpoint: &Endpoint,
        payload: &Result<Bytes>,
    ) -> Result<PrimaryReceipt> {
        let body = payload.clone()?;
        let cancel = CancellationToken::new();

        let attempt = self.primary.send(endpoint, body, cancel.clone());
        let deadline = self.clock.sleep(self.config.timeout);

        tokio::select! {
            biased;
            result = attempt => result,
            () = deadline => {
                cancel.cancel();
                Err(DeliveryError::timeout(self.config.timeout_ms()))
            },
        }
    }

    fn attempt_fallback(&self, endpoint: &Endpoint, payload: &Result<Bytes>) -> Result<()> {
        let body = payload.as_ref().map_err(Clone::clone)?;
        self.fallback.issue(endpoint, body)
    }
}

#[cfg(test)]
mod tests {
    use std::{future::Future, pin::Pin, sync::Mutex};

    use beacon_core::{PageContext, Section, TestClock};
    use serde_json::json;

    use super::*;

    /// Primary transport that never completes.
    #[derive(Debug, Default)]
    struct StalledPrimary {
        cancelled: Mutex<Vec<CancellationToken>>,
    }

    impl PrimaryTransport for StalledPrimary {
        fn send<'a>(
            &'a self,
            _endpoint: &'a Endpoint,
            _body: Bytes,
            cancel: CancellationToken,
        ) -> Pin<Box<dyn Future<Output = Result<PrimaryReceipt>> + Send + 'a>> {
            self.cancelled.lock().unwrap().push(cancel);
            Box::pin(std::future::pending())
        }
    }

    #[derive(Debug, Default)]
    struct RecordingFallback {
        issued: Mutex<Vec<Endpoint>>,
    }

    impl FallbackTransport for RecordingFallback {
        fn issue(&self, endpoint: &Endpoint, _report_json: &[u8]) -> Result<()> {
            self.issued.lock().unwrap().push(endpoint.clone());
            Ok(())
        }
    }

    fn report(clock: &TestClock) -> Report {
        Report::builder(clock.now_utc(), PageContext::default())
            .section("ip", Section::Available(json!("Unknown")))
            .unwrap()
            .build()
    }

    #[tokio::test]
    async fn stalled_primary_times_out_and_cancels_attempt() {
        let clock = TestClock::new();
        let primary = Arc::new(StalledPrimary::default());
        let fallback = Arc::new(RecordingFallback::default());
        let engine = DeliveryEngine::with_transports(
            DeliveryConfig { timeout: Duration::from_millis(250) },
            primary.clone(),
            fallback.clone(),
            Arc::new(clock.clone()),
        );

        let outcome =
            engine.deliver(&report(&clock), &[Endpoint::from("https://a.test")]).await.unwrap();

        assert_eq!(outcome.transport, TransportKind::Fallback);
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
        let tokens = primary.cancelled.lock().unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_cancelled());
    }

    #[tokio::test]
    async fn empty_endpoint_list_fails_cleanly() {
        let clock = TestClock::new();
        let engine = DeliveryEngine::with_transports(
            DeliveryConfig::default(),
            Arc::new(StalledPrimary::default()),
            Arc::new(RecordingFallback::default()),
            Arc::new(clock.clone()),
        );

        let result = engine.deliver(&report(&clock), &[]).await;

        assert_eq!(result.unwrap_err(), DeliveryError::exhausted(0));
    }

    #[test]
    fn outcome_serializes_with_success_flag() {
        let outcome = DeliveryOutcome {
            endpoint: Endpoint::from("https://e2.test"),
            transport: TransportKind::Primary,
        };

        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"success": true, "endpoint": "https://e2.test", "transport": "primary"})
        );
    }

    #[test]
    fn default_timeout_is_three_seconds() {
        assert_eq!(DeliveryConfig::default().timeout_ms(), 3000);
    }
}
