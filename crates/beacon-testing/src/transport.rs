//! Scripted transports for deterministic delivery tests.
//!
//! Each endpoint is given a behavior up front. Unscripted endpoints fail,
//! so a test only has to describe the endpoints it expects to succeed or
//! stall. Every call is recorded for later assertions.

use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{Mutex, MutexGuard, PoisonError},
};

use beacon_delivery::{
    DeliveryError, Endpoint, FallbackTransport, PrimaryReceipt, PrimaryTransport,
    Result as DeliveryResult,
};
use bytes::Bytes;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Behavior of a scripted primary attempt.
#[derive(Debug, Clone)]
pub enum PrimaryStep {
    /// Complete with the given HTTP status.
    Succeed(u16),
    /// Fail immediately with the given error.
    Fail(DeliveryError),
    /// Never complete unless cancelled.
    Hang,
}

/// Behavior of a scripted fallback issue.
#[derive(Debug, Clone)]
pub enum FallbackStep {
    /// Issue successfully.
    Issue,
    /// Fail to issue with the given error.
    Fail(DeliveryError),
}

/// Primary transport following a per-endpoint script.
#[derive(Debug, Default)]
pub struct ScriptedPrimary {
    steps: HashMap<String, PrimaryStep>,
    calls: Mutex<Vec<Endpoint>>,
    bodies: Mutex<Vec<Bytes>>,
    tokens: Mutex<Vec<CancellationToken>>,
}

impl ScriptedPrimary {
    /// Creates a transport where every endpoint fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the behavior for `endpoint`.
    #[must_use]
    pub fn on(mut self, endpoint: impl Into<String>, step: PrimaryStep) -> Self {
        self.steps.insert(endpoint.into(), step);
        self
    }

    /// Endpoints attempted, in call order.
    pub fn calls(&self) -> Vec<Endpoint> {
        lock(&self.calls).clone()
    }

    /// Request bodies sent, in call order.
    pub fn bodies(&self) -> Vec<Bytes> {
        lock(&self.bodies).clone()
    }

    /// Number of attempts whose cancellation token fired.
    pub fn cancelled_attempts(&self) -> usize {
        lock(&self.tokens).iter().filter(|token| token.is_cancelled()).count()
    }
}

impl PrimaryTransport for ScriptedPrimary {
    fn send<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        body: Bytes,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = DeliveryResult<PrimaryReceipt>> + Send + 'a>> {
        lock(&self.calls).push(endpoint.clone());
        lock(&self.bodies).push(body);
        lock(&self.tokens).push(cancel.clone());

        let step = self
            .steps
            .get(endpoint.as_str())
            .cloned()
            .unwrap_or_else(|| PrimaryStep::Fail(DeliveryError::network("connection refused")));

        Box::pin(async move {
            match step {
                PrimaryStep::Succeed(status) => Ok(PrimaryReceipt { status }),
                PrimaryStep::Fail(error) => Err(error),
                PrimaryStep::Hang => {
                    cancel.cancelled().await;
                    Err(DeliveryError::Cancelled)
                },
            }
        })
    }
}

/// Fallback transport following a per-endpoint script.
#[derive(Debug, Default)]
pub struct ScriptedFallback {
    steps: HashMap<String, FallbackStep>,
    calls: Mutex<Vec<Endpoint>>,
    issued: Mutex<Vec<(Endpoint, Value)>>,
}

impl ScriptedFallback {
    /// Creates a transport where every issue fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the behavior for `endpoint`.
    #[must_use]
    pub fn on(mut self, endpoint: impl Into<String>, step: FallbackStep) -> Self {
        self.steps.insert(endpoint.into(), step);
        self
    }

    /// Endpoints the engine tried to issue to, in call order.
    pub fn calls(&self) -> Vec<Endpoint> {
        lock(&self.calls).clone()
    }

    /// Successfully issued reports with their endpoint.
    pub fn issued(&self) -> Vec<(Endpoint, Value)> {
        lock(&self.issued).clone()
    }
}

impl FallbackTransport for ScriptedFallback {
    fn issue(&self, endpoint: &Endpoint, report_json: &[u8]) -> DeliveryResult<()> {
        lock(&self.calls).push(endpoint.clone());

        let step = self.steps.get(endpoint.as_str()).cloned().unwrap_or_else(|| {
            FallbackStep::Fail(DeliveryError::issue_failed("no fallback scripted"))
        });

        match step {
            FallbackStep::Issue => {
                let report = serde_json::from_slice(report_json)
                    .map_err(|e| DeliveryError::encoding(e.to_string()))?;
                lock(&self.issued).push((endpoint.clone(), report));
                Ok(())
            },
            FallbackStep::Fail(error) => Err(error),
        }
    }
}
