//! Report assembly.
//!
//! Runs every registered collector concurrently together with IP
//! resolution, then the optional location lookup, and merges the sections
//! with the timestamp and page metadata into one [`Report`].

use std::sync::Arc;

use beacon_core::{Clock, PageContext, Report, Section};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info_span, Instrument};

use crate::{
    error::Result,
    lookup::{HttpIpResolver, HttpLocationLookup, LookupConfig},
    producer::{Collector, Feature, IpResolver, LocationLookup, UNKNOWN_IP},
    producers::{
        ConnectionCollector, DeviceCollector, HardwareCollector, PerformanceCollector,
        RuntimeCollector,
    },
};

/// Section holding the resolved public address.
pub const IP_SECTION: &str = "ip";

/// Section holding the geolocation of the public address.
pub const LOCATION_SECTION: &str = "location";

/// Switches for the optional report sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblerConfig {
    /// Look up the location of the resolved address.
    pub enable_location: bool,
    /// Probe CPU and memory.
    pub enable_hardware: bool,
    /// Probe timing, load and process memory.
    pub enable_performance: bool,
}

impl AssemblerConfig {
    /// Returns whether `feature` is switched on.
    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Location => self.enable_location,
            Feature::Hardware => self.enable_hardware,
            Feature::Performance => self.enable_performance,
        }
    }
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self { enable_location: true, enable_hardware: true, enable_performance: true }
    }
}

#[derive(Debug, Clone)]
struct Registered {
    gate: Option<Feature>,
    collector: Arc<dyn Collector>,
}

/// Builds reports from independent producers.
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    config: AssemblerConfig,
    context: PageContext,
    clock: Arc<dyn Clock>,
    ip: Arc<dyn IpResolver>,
    location: Arc<dyn LocationLookup>,
    collectors: Vec<Registered>,
}

impl ReportAssembler {
    /// Creates an assembler with IP and location sources and no collectors.
    pub fn new(
        config: AssemblerConfig,
        context: PageContext,
        clock: Arc<dyn Clock>,
        ip: Arc<dyn IpResolver>,
        location: Arc<dyn LocationLookup>,
    ) -> Self {
        Self { config, context, clock, ip, location, collectors: Vec::new() }
    }

    /// Creates an assembler with the HTTP lookups and every built-in
    /// host producer.
    ///
    /// # Errors
    ///
    /// Returns an error if a lookup HTTP client cannot be built.
    pub fn for_host(
        config: AssemblerConfig,
        context: PageContext,
        clock: Arc<dyn Clock>,
        lookup: &LookupConfig,
    ) -> Result<Self> {
        let ip = Arc::new(HttpIpResolver::new(lookup)?);
        let location = Arc::new(HttpLocationLookup::new(lookup)?);

        Ok(Self::new(config, context, clock.clone(), ip, location)
            .collector(Arc::new(ConnectionCollector))
            .collector(Arc::new(RuntimeCollector::new(lookup.user_agent.clone())))
            .collector(Arc::new(DeviceCollector))
            .gated_collector(Feature::Hardware, Arc::new(HardwareCollector::new(clock.clone())))
            .gated_collector(Feature::Performance, Arc::new(PerformanceCollector::new(clock))))
    }

    /// Registers a collector that always runs.
    #[must_use]
    pub fn collector(mut self, collector: Arc<dyn Collector>) -> Self {
        self.collectors.push(Registered { gate: None, collector });
        self
    }

    /// Registers a collector that only runs when `feature` is enabled.
    #[must_use]
    pub fn gated_collector(mut self, feature: Feature, collector: Arc<dyn Collector>) -> Self {
        self.collectors.push(Registered { gate: Some(feature), collector });
        self
    }

    /// Collects every section and builds the report.
    ///
    /// Disabled collectors contribute an empty section and are never
    /// invoked.
    ///
    /// # Errors
    ///
    /// Returns `CollectError::Assembly` when two sections share a name or a
    /// collector uses a reserved name.
    pub async fn assemble(&self) -> Result<Report> {
        let span = info_span!("assemble_report", collectors = self.collectors.len());

        async move {
            let started = self.clock.now();

            let (ip, sections) = tokio::join!(
                self.ip.resolve(),
                join_all(self.collectors.iter().map(|entry| self.run(entry)))
            );
            let location = self.locate(&ip).await;

            let mut builder = Report::builder(self.clock.now_utc(), self.context.clone())
                .section(IP_SECTION, Section::Available(Value::String(ip)))?;
            for (name, section) in sections {
                builder = builder.section(name, section)?;
            }
            let report = builder.section(LOCATION_SECTION, location)?.build();

            debug!(
                sections = report.section_count(),
                duration_ms = self.clock.now().duration_since(started).as_millis(),
                "report assembled"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn run(&self, entry: &Registered) -> (String, Section) {
        let name = entry.collector.name().to_string();
        if let Some(feature) = entry.gate {
            if !self.config.is_enabled(feature) {
                debug!(section = %name, %feature, "section disabled");
                return (name, Section::empty());
            }
        }

        let section = entry.collector.collect().await;
        if let Some(reason) = section.reason() {
            debug!(section = %name, reason, "section unavailable");
        }
        (name, section)
    }

    async fn locate(&self, ip: &str) -> Section {
        if !self.config.enable_location || ip.is_empty() || ip == UNKNOWN_IP {
            return Section::empty();
        }

        match self.location.locate(ip).await {
            Ok(location) => Section::Available(location),
            Err(e) => {
                debug!(error = %e, "location lookup failed");
                Section::empty()
            },
        }
    }
}
