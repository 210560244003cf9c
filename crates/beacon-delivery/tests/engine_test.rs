//! Integration tests for the delivery engine.
//!
//! Drives full delivery cycles over scripted transports and a test clock:
//! endpoint ordering, short-circuiting, primary/fallback switching,
//! timeouts and exhaustion.

use std::time::Duration;

use anyhow::Result;
use beacon_delivery::{DeliveryError, Endpoint, EndpointRegistry, TransportKind};
use beacon_testing::{
    sample_report, DeliveryHarness, FallbackStep, PrimaryStep, ScriptedFallback, ScriptedPrimary,
};

const E1: &str = "https://e1.test/metrics";
const E2: &str = "https://e2.test/metrics";
const E3: &str = "https://e3.test/metrics";

fn endpoints(urls: &[&str]) -> Vec<Endpoint> {
    urls.iter().map(|url| Endpoint::from(*url)).collect()
}

#[tokio::test]
async fn first_primary_success_short_circuits() -> Result<()> {
    let harness = DeliveryHarness::new(
        ScriptedPrimary::new().on(E1, PrimaryStep::Succeed(200)),
        ScriptedFallback::new(),
    );

    let outcome = harness.engine().deliver(&sample_report(), &endpoints(&[E1, E2, E3])).await?;

    assert_eq!(outcome.endpoint, E1);
    assert_eq!(outcome.transport, TransportKind::Primary);
    assert_eq!(harness.primary.calls(), endpoints(&[E1]));
    assert!(harness.fallback.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn prompt_primary_success_does_not_consume_deadline() -> Result<()> {
    let harness = DeliveryHarness::new(
        ScriptedPrimary::new().on(E1, PrimaryStep::Succeed(200)),
        ScriptedFallback::new(),
    );

    harness.engine().deliver(&sample_report(), &endpoints(&[E1])).await?;

    assert_eq!(harness.clock.elapsed(), Duration::ZERO);
    Ok(())
}

#[tokio::test]
async fn fallback_success_ends_cycle_at_same_endpoint() -> Result<()> {
    let harness = DeliveryHarness::new(
        ScriptedPrimary::new().on(E2, PrimaryStep::Succeed(200)),
        ScriptedFallback::new().on(E1, FallbackStep::Issue),
    );

    let outcome = harness.engine().deliver(&sample_report(), &endpoints(&[E1, E2])).await?;

    assert_eq!(outcome.endpoint, E1);
    assert_eq!(outcome.transport, TransportKind::Fallback);
    assert_eq!(harness.primary.calls(), endpoints(&[E1]));
    assert_eq!(harness.fallback.calls(), endpoints(&[E1]));
    Ok(())
}

#[tokio::test]
async fn every_endpoint_failing_exhausts_cycle() -> Result<()> {
    let harness = DeliveryHarness::new(ScriptedPrimary::new(), ScriptedFallback::new());

    let err = harness
        .engine()
        .deliver(&sample_report(), &endpoints(&[E1, E2, E3]))
        .await
        .unwrap_err();

    assert_eq!(err, DeliveryError::Exhausted { attempted: 3 });
    assert_eq!(harness.primary.calls(), endpoints(&[E1, E2, E3]));
    assert_eq!(harness.fallback.calls(), endpoints(&[E1, E2, E3]));
    Ok(())
}

#[tokio::test]
async fn hung_primary_with_failed_fallback_moves_to_next_endpoint() -> Result<()> {
    let harness = DeliveryHarness::new(
        ScriptedPrimary::new().on(E1, PrimaryStep::Hang).on(E2, PrimaryStep::Succeed(200)),
        ScriptedFallback::new()
            .on(E1, FallbackStep::Fail(DeliveryError::issue_failed("blocked by policy"))),
    );

    let outcome = harness.engine().deliver(&sample_report(), &endpoints(&[E1, E2])).await?;

    assert_eq!(
        serde_json::to_value(&outcome)?,
        serde_json::json!({"success": true, "endpoint": E2, "transport": "primary"})
    );
    assert_eq!(harness.primary.cancelled_attempts(), 1);
    assert_eq!(harness.fallback.calls(), endpoints(&[E1]));
    Ok(())
}

#[tokio::test]
async fn timed_out_primary_triggers_fallback() -> Result<()> {
    let harness = DeliveryHarness::new(
        ScriptedPrimary::new().on(E1, PrimaryStep::Hang),
        ScriptedFallback::new().on(E1, FallbackStep::Issue),
    )
    .with_timeout(Duration::from_millis(1500));

    let outcome = harness.engine().deliver(&sample_report(), &endpoints(&[E1])).await?;

    assert_eq!(outcome.transport, TransportKind::Fallback);
    assert_eq!(harness.clock.elapsed(), Duration::from_millis(1500));
    assert_eq!(harness.primary.cancelled_attempts(), 1);
    Ok(())
}

#[tokio::test]
async fn error_status_counts_as_primary_delivery() -> Result<()> {
    let harness = DeliveryHarness::new(
        ScriptedPrimary::new().on(E1, PrimaryStep::Succeed(503)),
        ScriptedFallback::new().on(E1, FallbackStep::Issue),
    );

    let outcome = harness.engine().deliver(&sample_report(), &endpoints(&[E1])).await?;

    assert_eq!(outcome.transport, TransportKind::Primary);
    assert!(harness.fallback.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn primary_and_fallback_carry_the_same_report() -> Result<()> {
    let report = sample_report();
    let harness = DeliveryHarness::new(
        ScriptedPrimary::new(),
        ScriptedFallback::new().on(E1, FallbackStep::Issue),
    );

    harness.engine().deliver(&report, &endpoints(&[E1])).await?;

    let sent: serde_json::Value = serde_json::from_slice(&harness.primary.bodies()[0])?;
    let issued = harness.fallback.issued();
    assert_eq!(sent, report.to_value()?);
    assert_eq!(issued, vec![(Endpoint::from(E1), sent)]);
    Ok(())
}

#[tokio::test]
async fn duplicate_endpoints_are_each_attempted() -> Result<()> {
    let harness = DeliveryHarness::new(ScriptedPrimary::new(), ScriptedFallback::new());

    let err = harness.engine().deliver(&sample_report(), &endpoints(&[E1, E1])).await.unwrap_err();

    assert_eq!(err, DeliveryError::exhausted(2));
    assert_eq!(harness.primary.calls(), endpoints(&[E1, E1]));
    Ok(())
}

#[tokio::test]
async fn cycle_reads_registry_snapshot() -> Result<()> {
    let harness = DeliveryHarness::new(
        ScriptedPrimary::new().on(E3, PrimaryStep::Succeed(204)),
        ScriptedFallback::new(),
    );
    let mut registry = EndpointRegistry::new([E1, E2]);
    registry.append(E3);

    let outcome = harness.engine().deliver_to(&sample_report(), &registry).await?;

    assert_eq!(outcome.endpoint, E3);
    assert_eq!(harness.primary.calls(), endpoints(&[E1, E2, E3]));
    Ok(())
}

#[tokio::test]
async fn empty_registry_fails_without_attempts() -> Result<()> {
    let harness = DeliveryHarness::new(ScriptedPrimary::new(), ScriptedFallback::new());

    let err = harness
        .engine()
        .deliver_to(&sample_report(), &EndpointRegistry::default())
        .await
        .unwrap_err();

    assert_eq!(err, DeliveryError::exhausted(0));
    assert!(harness.primary.calls().is_empty());
    assert!(harness.fallback.calls().is_empty());
    Ok(())
}
