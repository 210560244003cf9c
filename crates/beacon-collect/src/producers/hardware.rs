//! Hardware section: CPU heuristics and installed memory.

use std::{hint::black_box, sync::Arc};

use beacon_core::{Clock, Section};
use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use crate::producer::Collector;

const MEMINFO_PATH: &str = "/proc/meminfo";
const PROBE_ITERATIONS: u32 = 1000;

/// Collects the `hardware` section.
#[derive(Debug, Clone)]
pub struct HardwareCollector {
    clock: Arc<dyn Clock>,
}

impl HardwareCollector {
    /// Creates a collector timing its feature probe with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn performance_test_ms(&self) -> f64 {
        let started = self.clock.now();
        let mut accumulator = 0.0_f64;
        for i in 0..PROBE_ITERATIONS {
            accumulator += black_box(f64::from(i)).sqrt();
        }
        black_box(accumulator);
        self.clock.now().duration_since(started).as_secs_f64() * 1000.0
    }
}

impl Collector for HardwareCollector {
    fn name(&self) -> &str {
        "hardware"
    }

    fn collect(&self) -> BoxFuture<'_, Section> {
        Box::pin(async move {
            let cores = num_cpus::get();
            let pointer_width = if cfg!(target_pointer_width = "64") { 64 } else { 32 };

            let device_memory = match tokio::fs::read_to_string(MEMINFO_PATH).await {
                Ok(meminfo) => {
                    mem_total_gb(&meminfo).map_or_else(|| json!("unknown"), |gb| json!(gb))
                },
                Err(e) => {
                    debug!(error = %e, "memory probe unavailable");
                    json!("unknown")
                },
            };

            Section::Available(json!({
                "cpu": {
                    "cores": cores,
                    "physicalCores": num_cpus::get_physical(),
                    "architecture": architecture_label(
                        std::env::consts::OS,
                        std::env::consts::ARCH,
                        pointer_width,
                    ),
                    "model": model_tier(cores),
                    "features": {
                        "multithreading": cores > 1,
                        "performanceTest": format!("{:.2}ms", self.performance_test_ms()),
                    },
                },
                "deviceMemory": device_memory,
            }))
        })
    }
}

/// Human-readable platform and bitness label.
pub fn architecture_label(os: &str, arch: &str, pointer_width: u32) -> String {
    let bits = if pointer_width >= 64 { "64-bit" } else { "32-bit" };
    match os {
        "windows" => format!("Windows ({bits})"),
        "macos" if arch == "aarch64" => "macOS (Apple Silicon)".to_string(),
        "macos" => "macOS (Intel)".to_string(),
        "linux" => format!("Linux ({bits})"),
        "android" => "Android".to_string(),
        "ios" => "iOS".to_string(),
        other => format!("{other} ({bits})"),
    }
}

/// Rough CPU class by logical core count.
pub fn model_tier(cores: usize) -> &'static str {
    match cores {
        0..=2 => "Low-end CPU (2 cores or less)",
        3..=4 => "Mid-range CPU (3-4 cores)",
        5..=8 => "High-end CPU (5-8 cores)",
        _ => "Workstation CPU (8+ cores)",
    }
}

/// Parses `MemTotal` from `/proc/meminfo` into gigabytes, two decimals.
pub fn mem_total_gb(meminfo: &str) -> Option<f64> {
    let line = meminfo.lines().find(|line| line.starts_with("MemTotal:"))?;
    let kib: f64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some((kib / (1024.0 * 1024.0) * 100.0).round() / 100.0)
}
