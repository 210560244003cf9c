//! Reporting session: assemble one report and deliver it.
//!
//! A [`Session`] owns the endpoint registry. Callers mutate it through
//! [`Session::endpoints_mut`] between runs; each run delivers to the
//! registry's contents at the time the delivery cycle starts.

use std::{sync::Arc, time::Duration};

use beacon_collect::ReportAssembler;
use beacon_core::{Clock, RealClock, Report};
use beacon_delivery::{DeliveryEngine, DeliveryOutcome, EndpointRegistry};
use serde::{ser::SerializeStruct, Serialize, Serializer};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::{
    config::Config,
    error::{Result, SessionError},
};

/// Result of [`Session::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// The report was assembled and accepted by an endpoint.
    Delivered {
        /// Report that was sent
        report: Report,
        /// Where and how it was accepted
        delivery: DeliveryOutcome,
    },
    /// Assembly or delivery failed.
    Failed {
        /// Human-readable failure
        error: String,
    },
}

impl SessionOutcome {
    /// Returns `true` when the report was delivered.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    /// The delivered report, if any.
    pub fn report(&self) -> Option<&Report> {
        match self {
            Self::Delivered { report, .. } => Some(report),
            Self::Failed { .. } => None,
        }
    }

    /// The delivery result, if any.
    pub fn delivery(&self) -> Option<&DeliveryOutcome> {
        match self {
            Self::Delivered { delivery, .. } => Some(delivery),
            Self::Failed { .. } => None,
        }
    }

    /// The failure message, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Delivered { .. } => None,
            Self::Failed { error } => Some(error),
        }
    }
}

impl Serialize for SessionOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Delivered { report, delivery } => {
                let mut state = serializer.serialize_struct("SessionOutcome", 3)?;
                state.serialize_field("success", &true)?;
                state.serialize_field("data", report)?;
                state.serialize_field("sendResult", delivery)?;
                state.end()
            },
            Self::Failed { error } => {
                let mut state = serializer.serialize_struct("SessionOutcome", 2)?;
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
                state.end()
            },
        }
    }
}

/// Collects a report and delivers it to the first accepting endpoint.
#[derive(Debug, Clone)]
pub struct Session {
    assembler: ReportAssembler,
    engine: DeliveryEngine,
    registry: EndpointRegistry,
}

impl Session {
    /// Creates a session from its parts.
    pub fn new(
        assembler: ReportAssembler,
        engine: DeliveryEngine,
        registry: EndpointRegistry,
    ) -> Self {
        Self { assembler, engine, registry }
    }

    /// Builds a session with the host producers and HTTP transports.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Setup` if an HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_config_with_clock(config, Arc::new(RealClock::new()))
    }

    /// Same as [`Session::from_config`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Setup` if an HTTP client cannot be built.
    pub fn from_config_with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let assembler = ReportAssembler::for_host(
            config.to_assembler_config(),
            config.page_context(),
            clock.clone(),
            &config.to_lookup_config(),
        )
        .map_err(|e| SessionError::setup(e.to_string()))?;

        let engine =
            DeliveryEngine::new(config.to_delivery_config(), &config.to_client_config(), clock)
                .map_err(|e| SessionError::setup(e.to_string()))?;

        Ok(Self::new(assembler, engine, config.endpoint_registry()))
    }

    /// The endpoint registry.
    pub fn endpoints(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// Mutable access to the endpoint registry between runs.
    pub fn endpoints_mut(&mut self) -> &mut EndpointRegistry {
        &mut self.registry
    }

    /// Assembles a report without delivering it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Collect` if the report cannot be assembled.
    pub async fn collect(&self) -> Result<Report> {
        Ok(self.assembler.assemble().await?)
    }

    /// Assembles a report and delivers it.
    ///
    /// Never fails: errors from either stage become
    /// [`SessionOutcome::Failed`].
    pub async fn run(&self) -> SessionOutcome {
        let span = info_span!("session", session_id = %Uuid::new_v4());

        async move {
            match self.collect_and_deliver().await {
                Ok((report, delivery)) => {
                    info!(
                        endpoint = %delivery.endpoint,
                        transport = %delivery.transport,
                        "session completed"
                    );
                    SessionOutcome::Delivered { report, delivery }
                },
                Err(e) => {
                    error!(error = %e, "session failed");
                    SessionOutcome::Failed { error: e.to_string() }
                },
            }
        }
        .instrument(span)
        .await
    }

    /// Gives fallback requests still in flight up to `timeout` to finish.
    ///
    /// Returns how many were abandoned. Call before the process exits.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        let abandoned = self.engine.flush(timeout).await;
        if abandoned > 0 {
            info!(abandoned, "fallback requests still in flight at shutdown");
        }
        abandoned
    }

    async fn collect_and_deliver(&self) -> Result<(Report, DeliveryOutcome)> {
        let report = self.assembler.assemble().await?;
        let delivery = self.engine.deliver_to(&report, &self.registry).await?;
        Ok((report, delivery))
    }
}
