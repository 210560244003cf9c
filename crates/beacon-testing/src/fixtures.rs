//! Report fixtures and static producers.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, UNIX_EPOCH},
};

use beacon_collect::{
    AssemblerConfig, CollectError, Collector, IpResolver, LocationLookup, ReportAssembler,
};
use beacon_core::{Clock, PageContext, Report, Section, TestClock};
use futures::future::BoxFuture;
use serde_json::{json, Value};

/// Fixed start time for deterministic timestamps: 2024-01-01T00:00:00Z.
pub fn fixed_start() -> std::time::SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_704_067_200)
}

/// Page context used by fixture reports.
pub fn page_context() -> PageContext {
    PageContext::new("file:///srv/beacon", "https://referrer.test/")
}

/// A small, fully populated report.
pub fn sample_report() -> Report {
    let clock = TestClock::with_start_time(fixed_start());
    ReportBuilderFixture::default().build(&clock)
}

/// Builder for fixture reports with arbitrary sections.
#[derive(Debug, Clone)]
pub struct ReportBuilderFixture {
    sections: Vec<(String, Section)>,
}

impl Default for ReportBuilderFixture {
    fn default() -> Self {
        Self::empty()
            .with("ip", Section::Available(json!("198.51.100.4")))
            .with("runtime", Section::Available(json!({"userAgent": "beacon/test"})))
            .with("hardware", Section::unavailable("probe failed"))
            .with("location", Section::empty())
    }
}

impl ReportBuilderFixture {
    /// Starts without any section.
    pub fn empty() -> Self {
        Self { sections: Vec::new() }
    }

    /// Adds a section.
    #[must_use]
    pub fn with(mut self, name: &str, section: Section) -> Self {
        self.sections.push((name.to_string(), section));
        self
    }

    /// Builds the report timestamped with `clock`.
    ///
    /// # Panics
    ///
    /// Panics if a section name is reserved or duplicated.
    pub fn build(self, clock: &dyn Clock) -> Report {
        let mut builder = Report::builder(clock.now_utc(), page_context());
        for (name, section) in self.sections {
            builder = match builder.section(name.clone(), section) {
                Ok(builder) => builder,
                Err(e) => panic!("invalid fixture section {name}: {e}"),
            };
        }
        builder.build()
    }
}

/// Collector returning a fixed section and counting its invocations.
#[derive(Debug)]
pub struct StaticCollector {
    name: String,
    section: Section,
    calls: AtomicUsize,
}

impl StaticCollector {
    /// Creates a collector for `name` returning `section`.
    pub fn new(name: impl Into<String>, section: Section) -> Self {
        Self { name: name.into(), section, calls: AtomicUsize::new(0) }
    }

    /// Number of times the collector ran.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Collector for StaticCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect(&self) -> BoxFuture<'_, Section> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let section = self.section.clone();
        Box::pin(async move { section })
    }
}

/// IP resolver returning a fixed address.
#[derive(Debug, Clone)]
pub struct StaticIp(pub String);

impl IpResolver for StaticIp {
    fn resolve(&self) -> BoxFuture<'_, String> {
        let ip = self.0.clone();
        Box::pin(async move { ip })
    }
}

/// Location lookup returning a fixed result and counting its invocations.
#[derive(Debug)]
pub struct CountingLocation {
    result: Result<Value, CollectError>,
    calls: AtomicUsize,
}

impl CountingLocation {
    /// Lookup that succeeds with `location`.
    pub fn found(location: Value) -> Self {
        Self { result: Ok(location), calls: AtomicUsize::new(0) }
    }

    /// Lookup that fails.
    pub fn failing() -> Self {
        Self { result: Err(CollectError::rejected("RateLimited")), calls: AtomicUsize::new(0) }
    }

    /// Number of lookups performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LocationLookup for CountingLocation {
    fn locate<'a>(&'a self, _ip: &'a str) -> BoxFuture<'a, beacon_collect::Result<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self.result.clone();
        Box::pin(async move { result })
    }
}

/// Assembler wired to static sources, for sessions and end-to-end tests.
pub fn static_assembler(
    config: AssemblerConfig,
    clock: Arc<dyn Clock>,
    ip: &str,
    location: Arc<CountingLocation>,
) -> ReportAssembler {
    let ip = Arc::new(StaticIp(ip.to_string()));
    let runtime = Arc::new(StaticCollector::new(
        "runtime",
        Section::Available(json!({"userAgent": "beacon/test"})),
    ));

    ReportAssembler::new(config, page_context(), clock, ip, location).collector(runtime)
}
