//! Configuration management for the beacon agent.

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use beacon_collect::{
    AssemblerConfig, LookupConfig, DEFAULT_IP_LOOKUP_URLS, DEFAULT_LOCATION_LOOKUP_URL,
};
use beacon_core::PageContext;
use beacon_delivery::{
    ClientConfig, DeliveryConfig, EndpointRegistry, EndpointSpec, DEFAULT_SOURCE,
    DEFAULT_TIMEOUT_MS,
};
use figment::{
    providers::{Env, Format, Toml},
    value::{Dict, Map},
    Figment, Metadata, Profile, Provider,
};
use serde::{Deserialize, Serialize};

/// Configuration file looked up when no path is given.
pub const CONFIG_FILE: &str = "beacon.toml";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "BEACON_";

/// Alternate option spellings, lowercased, and the key each one stands for.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("timeout", "timeout_ms"),
    ("enablelocation", "enable_location"),
    ("enablehardware", "enable_hardware"),
    ("enableperformance", "enable_performance"),
];

/// Complete agent configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables prefixed with `BEACON_` (highest priority)
/// 2. Configuration file (`beacon.toml`, or the path given to
///    [`Config::load_from`])
/// 3. Built-in defaults (lowest priority)
///
/// Option names also accept the camel-case spelling used by embedding
/// pages (`enableLocation`, `timeout`). Every source is rewritten to the
/// canonical names before merging, so an environment variable overrides a
/// file option whichever spelling either of them uses.
///
/// # Example
///
/// ```no_run
/// use beacon_agent::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
///
/// println!("Reporting to {} endpoints", config.endpoint_registry().len());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    // Delivery
    /// Collection endpoints in priority order, one URL or a list.
    ///
    /// Environment variable: `BEACON_ENDPOINTS`
    #[serde(default)]
    pub endpoints: EndpointSpec,
    /// Primary attempt deadline in milliseconds.
    ///
    /// Environment variable: `BEACON_TIMEOUT_MS` or `BEACON_TIMEOUT`
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Value of the `source` parameter on fallback requests.
    ///
    /// Environment variable: `BEACON_SOURCE`
    #[serde(default = "default_source")]
    pub source: String,

    // Sections
    /// Look up the approximate location of the public address.
    ///
    /// Environment variable: `BEACON_ENABLE_LOCATION`
    #[serde(default = "default_enabled")]
    pub enable_location: bool,
    /// Collect the hardware section.
    ///
    /// Environment variable: `BEACON_ENABLE_HARDWARE`
    #[serde(default = "default_enabled")]
    pub enable_hardware: bool,
    /// Collect the performance section.
    ///
    /// Environment variable: `BEACON_ENABLE_PERFORMANCE`
    #[serde(default = "default_enabled")]
    pub enable_performance: bool,

    // Lookups
    /// Public IP lookup services, tried in order.
    ///
    /// Environment variable: `BEACON_IP_LOOKUP_URLS`
    #[serde(default = "default_ip_lookup_urls")]
    pub ip_lookup_urls: Vec<String>,
    /// Geolocation service URL template containing `{ip}`.
    ///
    /// Environment variable: `BEACON_LOCATION_LOOKUP_URL`
    #[serde(default = "default_location_lookup_url")]
    pub location_lookup_url: String,
    /// Upper bound on a single lookup request in milliseconds.
    ///
    /// Environment variable: `BEACON_LOOKUP_TIMEOUT_MS`
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,

    // Page metadata
    /// Location reported as `url`; the working directory when unset.
    ///
    /// Environment variable: `BEACON_PAGE_URL`
    #[serde(default)]
    pub page_url: Option<String>,
    /// Location reported as `referrer`.
    ///
    /// Environment variable: `BEACON_REFERRER`
    #[serde(default)]
    pub referrer: String,

    // Logging
    /// Log filter used when `RUST_LOG` is not set.
    ///
    /// Environment variable: `BEACON_RUST_LOG`
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, `beacon.toml`, and environment
    /// variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or a value is invalid.
    pub fn load() -> Result<Self> {
        Self::extract(Figment::new().merge(Aliased(Toml::file(CONFIG_FILE))))
    }

    /// Load configuration from an explicit file instead of `beacon.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be parsed, or a
    /// value is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.is_file() {
            anyhow::bail!("configuration file {} not found", path.display());
        }
        Self::extract(Figment::new().merge(Aliased(Toml::file(path))))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .merge(Aliased(Env::prefixed(ENV_PREFIX)))
            .extract()
            .context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Convert to the delivery engine configuration.
    pub fn to_delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig { timeout: Duration::from_millis(self.timeout_ms) }
    }

    /// Convert to HTTP transport configuration.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig { source: self.source.clone(), ..ClientConfig::default() }
    }

    /// Convert to the assembler's section switches.
    pub fn to_assembler_config(&self) -> AssemblerConfig {
        AssemblerConfig {
            enable_location: self.enable_location,
            enable_hardware: self.enable_hardware,
            enable_performance: self.enable_performance,
        }
    }

    /// Convert to lookup service configuration.
    pub fn to_lookup_config(&self) -> LookupConfig {
        LookupConfig {
            ip_lookup_urls: self.ip_lookup_urls.clone(),
            location_lookup_url: self.location_lookup_url.clone(),
            timeout: Duration::from_millis(self.lookup_timeout_ms),
            ..LookupConfig::default()
        }
    }

    /// Page metadata attached to reports.
    pub fn page_context(&self) -> PageContext {
        match &self.page_url {
            Some(url) => PageContext::new(url.clone(), self.referrer.clone()),
            None => {
                PageContext { referrer: self.referrer.clone(), ..PageContext::from_current_dir() }
            },
        }
    }

    /// Registry holding the configured endpoints.
    pub fn endpoint_registry(&self) -> EndpointRegistry {
        EndpointRegistry::new(self.endpoints.clone())
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            anyhow::bail!("timeout must be greater than 0");
        }

        if self.lookup_timeout_ms == 0 {
            anyhow::bail!("lookup_timeout_ms must be greater than 0");
        }

        if self.source.trim().is_empty() {
            anyhow::bail!("source must not be empty");
        }

        if !self.location_lookup_url.contains("{ip}") {
            anyhow::bail!("location_lookup_url must contain an {{ip}} placeholder");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: EndpointSpec::default(),
            timeout_ms: default_timeout_ms(),
            source: default_source(),
            enable_location: default_enabled(),
            enable_hardware: default_enabled(),
            enable_performance: default_enabled(),
            ip_lookup_urls: default_ip_lookup_urls(),
            location_lookup_url: default_location_lookup_url(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            page_url: None,
            referrer: String::new(),
            rust_log: default_log_level(),
        }
    }
}

/// Provider wrapper that renames alternate option spellings to their
/// canonical keys.
struct Aliased<P>(P);

impl<P: Provider> Provider for Aliased<P> {
    fn metadata(&self) -> Metadata {
        self.0.metadata()
    }

    fn data(&self) -> std::result::Result<Map<Profile, Dict>, figment::Error> {
        let mut data = self.0.data()?;
        for dict in data.values_mut() {
            canonicalize_keys(dict);
        }
        Ok(data)
    }

    fn profile(&self) -> Option<Profile> {
        self.0.profile()
    }
}

/// Moves aliased keys to their canonical name. A canonical key already
/// present in the same source wins.
fn canonicalize_keys(dict: &mut Dict) {
    let aliased: Vec<(String, &str)> = dict
        .keys()
        .filter_map(|key| {
            let lower = key.to_ascii_lowercase();
            KEY_ALIASES
                .iter()
                .find(|(alias, _)| *alias == lower)
                .map(|(_, canonical)| (key.clone(), *canonical))
        })
        .collect();

    for (key, canonical) in aliased {
        if let Some(value) = dict.remove(&key) {
            dict.entry(canonical.to_string()).or_insert(value);
        }
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_ip_lookup_urls() -> Vec<String> {
    DEFAULT_IP_LOOKUP_URLS.iter().map(ToString::to_string).collect()
}

fn default_location_lookup_url() -> String {
    DEFAULT_LOCATION_LOOKUP_URL.to_string()
}

fn default_lookup_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}
