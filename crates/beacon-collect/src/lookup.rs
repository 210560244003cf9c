//! HTTP-backed IP resolution and geolocation.

use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    error::{CollectError, Result},
    producer::{IpResolver, LocationLookup, UNKNOWN_IP},
};

/// Public IP lookup services, tried in order.
pub const DEFAULT_IP_LOOKUP_URLS: [&str; 2] =
    ["https://api.ipify.org?format=json", "https://api64.ipify.org?format=json"];

/// Geolocation service; `{ip}` is replaced with the address.
pub const DEFAULT_LOCATION_LOOKUP_URL: &str = "https://ipapi.co/{ip}/json/";

/// Configuration for the lookup services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupConfig {
    /// IP lookup URLs answering `{"ip": "..."}`.
    pub ip_lookup_urls: Vec<String>,
    /// Location lookup URL template containing `{ip}`.
    pub location_lookup_url: String,
    /// Upper bound on a single lookup request.
    pub timeout: Duration,
    /// User agent sent with lookup requests.
    pub user_agent: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            ip_lookup_urls: DEFAULT_IP_LOOKUP_URLS.iter().map(ToString::to_string).collect(),
            location_lookup_url: DEFAULT_LOCATION_LOOKUP_URL.to_string(),
            timeout: Duration::from_millis(5000),
            user_agent: beacon_core::USER_AGENT.to_string(),
        }
    }
}

fn build_client(config: &LookupConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout)
        .build()
        .map_err(|e| CollectError::http(format!("failed to build HTTP client: {e}")))
}

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: String,
}

/// Resolves the public address through JSON lookup services.
#[derive(Debug, Clone)]
pub struct HttpIpResolver {
    client: reqwest::Client,
    urls: Vec<String>,
}

impl HttpIpResolver {
    /// Creates a resolver from the lookup configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &LookupConfig) -> Result<Self> {
        Ok(Self { client: build_client(config)?, urls: config.ip_lookup_urls.clone() })
    }

    async fn lookup(&self, url: &str) -> Result<String> {
        let response: IpResponse = self.client.get(url).send().await?.json().await?;
        if response.ip.is_empty() {
            return Err(CollectError::invalid_response("empty ip field"));
        }
        Ok(response.ip)
    }
}

impl IpResolver for HttpIpResolver {
    fn resolve(&self) -> BoxFuture<'_, String> {
        Box::pin(async move {
            for url in &self.urls {
                match self.lookup(url).await {
                    Ok(ip) => {
                        debug!(service = %url, "public ip resolved");
                        return ip;
                    },
                    Err(e) => debug!(service = %url, error = %e, "ip lookup failed"),
                }
            }
            warn!(services = self.urls.len(), "could not resolve public ip");
            UNKNOWN_IP.to_string()
        })
    }
}

/// Looks up an approximate location through an ipapi-style service.
#[derive(Debug, Clone)]
pub struct HttpLocationLookup {
    client: reqwest::Client,
    url_template: String,
}

impl HttpLocationLookup {
    /// Creates a lookup from the lookup configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &LookupConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            url_template: config.location_lookup_url.clone(),
        })
    }
}

impl LocationLookup for HttpLocationLookup {
    fn locate<'a>(&'a self, ip: &'a str) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            let url = self.url_template.replace("{ip}", ip);
            let response = self.client.get(&url).send().await?;
            let status = response.status();
            let body: Value = response.json().await?;

            if !status.is_success() || body.get("error") == Some(&Value::Bool(true)) {
                let reason = body
                    .get("reason")
                    .and_then(Value::as_str)
                    .map_or_else(|| format!("status {}", status.as_u16()), ToString::to_string);
                return Err(CollectError::rejected(reason));
            }

            Ok(location_from_response(ip, &body))
        })
    }
}

/// Maps an ipapi-style response onto the location section layout.
///
/// Missing fields become `null`.
pub fn location_from_response(ip: &str, body: &Value) -> Value {
    json!({
        "ip": ip,
        "country": body["country_name"],
        "countryCode": body["country_code"],
        "region": body["region"],
        "city": body["city"],
        "latitude": body["latitude"],
        "longitude": body["longitude"],
        "timezone": body["timezone"],
        "org": body["org"],
        "postal": body["postal"],
    })
}
