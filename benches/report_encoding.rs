//! Benchmarks for report encoding and delivery cycles.
//!
//! Tracks the cost of the work done once per report: serializing it,
//! building the fallback query, and walking the endpoint list with
//! in-memory transports.

use std::hint::black_box;

use beacon_core::Section;
use beacon_delivery::{encode_fallback_payload, fallback_url, Endpoint};
use beacon_testing::{
    fixtures::fixed_start, DeliveryHarness, FallbackStep, PrimaryStep, ReportBuilderFixture,
    ScriptedFallback, ScriptedPrimary, TestClock,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use tokio::runtime::Runtime;

/// Report with `extra` additional sections of moderate size.
fn report_with_sections(extra: usize) -> beacon_core::Report {
    let clock = TestClock::with_start_time(fixed_start());
    (0..extra)
        .fold(ReportBuilderFixture::default(), |fixture, i| {
            fixture.with(
                &format!("probe{i}"),
                Section::Available(json!({
                    "cores": i,
                    "model": "Mid-range CPU (4-8 cores)",
                    "features": {"multithreading": true, "performanceTest": "12.34ms"},
                })),
            )
        })
        .build(&clock)
}

/// Benchmarks report serialization and fallback encoding.
fn bench_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoding");
    let endpoint = Endpoint::from("https://collector.test/metrics?site=lobby");

    for sections in [0, 8, 64] {
        let report = report_with_sections(sections);
        let body = report.to_json_bytes().unwrap_or_default();
        group.throughput(Throughput::Bytes(body.len() as u64));

        group.bench_with_input(BenchmarkId::new("serialize", sections), &report, |b, report| {
            b.iter(|| black_box(report.to_json_bytes()));
        });

        group.bench_with_input(BenchmarkId::new("base64", sections), &body, |b, body| {
            b.iter(|| black_box(encode_fallback_payload(body)));
        });

        group.bench_with_input(BenchmarkId::new("fallback_url", sections), &body, |b, body| {
            b.iter(|| black_box(fallback_url(&endpoint, body, "beacon")));
        });
    }

    group.finish();
}

/// Benchmarks delivery cycles that succeed at different list positions.
fn bench_delivery_cycle(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let report = report_with_sections(8);

    let mut group = c.benchmark_group("delivery_cycle");

    for position in [1usize, 4, 16] {
        let endpoints: Vec<Endpoint> = (0..position)
            .map(|i| Endpoint::from(format!("https://e{i}.test/collect")))
            .collect();
        let last = endpoints[position - 1].to_string();

        let primary_harness = DeliveryHarness::new(
            ScriptedPrimary::new().on(last.clone(), PrimaryStep::Succeed(200)),
            ScriptedFallback::new(),
        );
        let fallback_harness = DeliveryHarness::new(
            ScriptedPrimary::new(),
            ScriptedFallback::new().on(last, FallbackStep::Issue),
        );

        for (name, harness) in [("primary", &primary_harness), ("fallback", &fallback_harness)] {
            let engine = harness.engine();
            group.bench_with_input(BenchmarkId::new(name, position), &endpoints, |b, endpoints| {
                b.to_async(&rt).iter(|| async {
                    black_box(engine.deliver(&report, endpoints).await.is_ok());
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_encoding, bench_delivery_cycle);
criterion_main!(benches);
