//! Test infrastructure for deterministic beacon tests.
//!
//! Provides scripted transports, a wiremock-backed mock collector, report
//! fixtures and static producers, plus a [`DeliveryHarness`] wiring them to
//! a [`DeliveryEngine`] on a controllable clock.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::{sync::Arc, time::Duration};

pub use beacon_core::{Clock, TestClock};
use beacon_delivery::{DeliveryConfig, DeliveryEngine};

pub mod fixtures;
pub mod http;
pub mod transport;

pub use fixtures::{
    sample_report, static_assembler, CountingLocation, ReportBuilderFixture, StaticCollector,
    StaticIp,
};
pub use http::{decode_fallback_data, MockCollector};
pub use transport::{FallbackStep, PrimaryStep, ScriptedFallback, ScriptedPrimary};

/// Scripted transports and a test clock wired into a delivery engine.
pub struct DeliveryHarness {
    /// Deterministic clock driving attempt deadlines
    pub clock: TestClock,
    /// Primary transport script and call log
    pub primary: Arc<ScriptedPrimary>,
    /// Fallback transport script and call log
    pub fallback: Arc<ScriptedFallback>,
    /// Engine configuration
    pub config: DeliveryConfig,
}

impl DeliveryHarness {
    /// Creates a harness with the default engine configuration.
    pub fn new(primary: ScriptedPrimary, fallback: ScriptedFallback) -> Self {
        Self {
            clock: TestClock::with_start_time(fixtures::fixed_start()),
            primary: Arc::new(primary),
            fallback: Arc::new(fallback),
            config: DeliveryConfig::default(),
        }
    }

    /// Overrides the primary attempt deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Builds an engine over the scripted transports.
    pub fn engine(&self) -> DeliveryEngine {
        DeliveryEngine::with_transports(
            self.config.clone(),
            self.primary.clone(),
            self.fallback.clone(),
            Arc::new(self.clock.clone()),
        )
    }
}
