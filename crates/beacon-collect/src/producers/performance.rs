//! Performance section: agent timing, system load and process memory.
//!
//! Host probes read `/proc`. When none of them can be read the whole
//! section is reported unavailable.

use std::{path::PathBuf, sync::Arc, time::Instant};

use beacon_core::{Clock, Section};
use futures::future::BoxFuture;
use serde_json::{json, Value};
use tracing::debug;

use crate::producer::Collector;

/// Reason recorded when no host probe can be read.
pub const PERFORMANCE_UNAVAILABLE: &str = "Performance API not available";

/// Value of `memory` when process memory cannot be read.
pub const MEMORY_UNAVAILABLE: &str = "Memory API not available";

/// Collects the `performance` section.
#[derive(Debug, Clone)]
pub struct PerformanceCollector {
    clock: Arc<dyn Clock>,
    started: Instant,
    proc_root: PathBuf,
}

impl PerformanceCollector {
    /// Creates a collector measuring agent time from now.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let started = clock.now();
        Self { clock, started, proc_root: PathBuf::from("/proc") }
    }

    /// Reads host probes below `root` instead of `/proc`.
    #[must_use]
    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    async fn read_probe(&self, relative: &str) -> Option<String> {
        let path = self.proc_root.join(relative);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Some(contents),
            Err(e) => {
                debug!(probe = %path.display(), error = %e, "performance probe unavailable");
                None
            },
        }
    }
}

impl Collector for PerformanceCollector {
    fn name(&self) -> &str {
        "performance"
    }

    fn collect(&self) -> BoxFuture<'_, Section> {
        Box::pin(async move {
            let (uptime, loadavg, status) = tokio::join!(
                self.read_probe("uptime"),
                self.read_probe("loadavg"),
                self.read_probe("self/status"),
            );

            let uptime = uptime.as_deref().and_then(parse_uptime);
            let load = loadavg.as_deref().and_then(parse_loadavg);
            let resident = status.as_deref().and_then(parse_resident_bytes);

            if uptime.is_none() && load.is_none() && resident.is_none() {
                return Section::unavailable(PERFORMANCE_UNAVAILABLE);
            }

            let since_start = self.clock.now().duration_since(self.started);
            let memory = resident
                .map_or_else(|| json!(MEMORY_UNAVAILABLE), |bytes| json!({"resident": bytes}));

            Section::Available(json!({
                "timing": {
                    "sinceStartMs": u64::try_from(since_start.as_millis()).unwrap_or(u64::MAX),
                    "uptimeSeconds": uptime,
                },
                "loadAverage": load.map_or(Value::Null, |l| json!(l)),
                "memory": memory,
            }))
        })
    }
}

/// Parses the system uptime in seconds from `/proc/uptime`.
pub fn parse_uptime(contents: &str) -> Option<f64> {
    contents.split_whitespace().next()?.parse().ok()
}

/// Parses the 1, 5 and 15 minute load averages from `/proc/loadavg`.
pub fn parse_loadavg(contents: &str) -> Option<[f64; 3]> {
    let mut fields = contents.split_whitespace().map(str::parse::<f64>);
    let one = fields.next()?.ok()?;
    let five = fields.next()?.ok()?;
    let fifteen = fields.next()?.ok()?;
    Some([one, five, fifteen])
}

/// Parses resident set size in bytes from `/proc/self/status`.
pub fn parse_resident_bytes(contents: &str) -> Option<u64> {
    let line = contents.lines().find(|line| line.starts_with("VmRSS:"))?;
    let kib: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    kib.checked_mul(1024)
}
