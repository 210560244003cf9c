//! IP resolution and location lookup against mock services.

use std::time::Duration;

use anyhow::Result;
use beacon_collect::{
    CollectError, HttpIpResolver, HttpLocationLookup, IpResolver, LocationLookup, LookupConfig,
    UNKNOWN_IP,
};
use beacon_testing::MockCollector;
use serde_json::json;

fn config(services: &MockCollector, ip_paths: &[&str]) -> LookupConfig {
    LookupConfig {
        ip_lookup_urls: ip_paths.iter().map(|path| format!("{}{path}", services.url())).collect(),
        location_lookup_url: format!("{}/geo/{{ip}}/json/", services.url()),
        timeout: Duration::from_secs(2),
        ..LookupConfig::default()
    }
}

#[tokio::test]
async fn resolver_falls_through_to_second_service() -> Result<()> {
    let services = MockCollector::start().await;
    services.serve_json("/primary", 500, json!({"message": "down"})).await;
    services.serve_ip("/secondary", "203.0.113.9").await;

    let resolver = HttpIpResolver::new(&config(&services, &["/primary", "/secondary"]))?;

    assert_eq!(resolver.resolve().await, "203.0.113.9");
    Ok(())
}

#[tokio::test]
async fn resolver_returns_sentinel_when_all_services_fail() -> Result<()> {
    let services = MockCollector::start().await;
    services.serve_json("/primary", 200, json!({"address": "nope"})).await;

    let resolver = HttpIpResolver::new(&config(&services, &["/primary", "/missing"]))?;

    assert_eq!(resolver.resolve().await, UNKNOWN_IP);
    Ok(())
}

#[tokio::test]
async fn location_is_mapped_from_service_fields() -> Result<()> {
    let services = MockCollector::start().await;
    services
        .serve_json(
            "/geo/203.0.113.9/json/",
            200,
            json!({
                "country_name": "Iceland",
                "country_code": "IS",
                "region": "Capital Region",
                "city": "Reykjavik",
                "latitude": 64.14,
                "longitude": -21.9,
                "timezone": "Atlantic/Reykjavik",
                "org": "Example Net",
                "postal": "101",
            }),
        )
        .await;

    let lookup = HttpLocationLookup::new(&config(&services, &[]))?;
    let location = lookup.locate("203.0.113.9").await?;

    assert_eq!(
        location,
        json!({
            "ip": "203.0.113.9",
            "country": "Iceland",
            "countryCode": "IS",
            "region": "Capital Region",
            "city": "Reykjavik",
            "latitude": 64.14,
            "longitude": -21.9,
            "timezone": "Atlantic/Reykjavik",
            "org": "Example Net",
            "postal": "101",
        })
    );
    Ok(())
}

#[tokio::test]
async fn service_error_flag_is_a_failure() -> Result<()> {
    let services = MockCollector::start().await;
    let body = json!({"error": true, "reason": "Reserved IP Address"});
    services.serve_json("/geo/10.0.0.1/json/", 200, body).await;

    let lookup = HttpLocationLookup::new(&config(&services, &[]))?;
    let err = lookup.locate("10.0.0.1").await.unwrap_err();

    assert_eq!(err, CollectError::rejected("Reserved IP Address"));
    Ok(())
}
