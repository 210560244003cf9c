//! Beacon reporting agent.
//!
//! Main entry point for the `beacon` command. Loads configuration, applies
//! command line overrides, runs one reporting session and prints its
//! outcome as JSON on stdout. Logs go to stderr.

use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::{Context, Result};
use beacon_agent::{Config, Session};
use beacon_delivery::Endpoint;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Upper bound on waiting for fallback requests before exiting.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "beacon", version, about = "Report a host environment snapshot")]
struct Cli {
    /// Configuration file used instead of ./beacon.toml.
    #[arg(long, short, value_name = "PATH", env = "BEACON_CONFIG")]
    config: Option<PathBuf>,

    /// Replace the configured endpoints (repeatable, tried in order).
    #[arg(long = "endpoint", short = 'e', value_name = "URL")]
    endpoints: Vec<String>,

    /// Append an endpoint unless it is already listed (repeatable).
    #[arg(long = "add-endpoint", value_name = "URL")]
    add_endpoints: Vec<String>,

    /// Primary attempt deadline in milliseconds.
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Skip the location lookup.
    #[arg(long)]
    no_location: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Collect a report and deliver it (default).
    Send,
    /// Collect a report and print it without delivering.
    Collect,
    /// Print the endpoints a delivery would try, in order.
    Endpoints,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("beacon: {e:#}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.apply(load_config(cli.config.as_deref())?)?;
    init_tracing(&config.rust_log);

    let mut session = Session::from_config(&config)?;
    for url in &cli.add_endpoints {
        if !session.endpoints_mut().append(url.as_str()) {
            debug!(endpoint = %url, "endpoint already registered");
        }
    }

    match cli.command.unwrap_or(Command::Send) {
        Command::Send => {
            info!(endpoints = session.endpoints().len(), "sending report");
            let outcome = session.run().await;
            let abandoned = session.shutdown(SHUTDOWN_GRACE).await;
            if abandoned > 0 {
                warn!(abandoned, "exiting with fallback requests in flight");
            }

            print_json(&outcome)?;
            Ok(if outcome.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        },
        Command::Collect => {
            let report = session.collect().await?;
            print_json(&report)?;
            Ok(ExitCode::SUCCESS)
        },
        Command::Endpoints => {
            let endpoints: Vec<Endpoint> = session.endpoints().list();
            print_json(&endpoints)?;
            Ok(ExitCode::SUCCESS)
        },
    }
}

impl Cli {
    /// Applies command line overrides on top of loaded configuration and
    /// validates the result.
    fn apply(&self, mut config: Config) -> Result<Config> {
        if !self.endpoints.is_empty() {
            config.endpoints = self.endpoints.clone().into();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if self.no_location {
            config.enable_location = false;
        }
        config.validate().context("Invalid command line options")?;
        Ok(config)
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{json}");
    Ok(())
}

/// Initializes tracing on stderr, preferring `RUST_LOG` over the configured
/// filter.
fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn send_is_the_default_command() {
        let cli = Cli::parse_from(["beacon"]);
        assert_eq!(cli.command, None);

        let cli = Cli::parse_from(["beacon", "collect"]);
        assert_eq!(cli.command, Some(Command::Collect));
    }

    #[test]
    fn endpoint_flags_replace_configured_list() {
        let cli = Cli::parse_from([
            "beacon",
            "--endpoint",
            "https://a.test",
            "-e",
            "https://b.test",
            "--timeout-ms",
            "250",
            "--no-location",
        ]);

        let config = cli.apply(Config::default()).unwrap();

        assert_eq!(config.endpoint_registry().list(), vec!["https://a.test", "https://b.test"]);
        assert_eq!(config.timeout_ms, 250);
        assert!(!config.enable_location);
    }

    #[test]
    fn no_flags_keep_configuration() {
        let cli = Cli::parse_from(["beacon", "endpoints"]);
        assert_eq!(cli.apply(Config::default()).unwrap(), Config::default());
    }

    #[test]
    fn zero_timeout_flag_is_rejected() {
        let cli = Cli::parse_from(["beacon", "--timeout-ms", "0"]);

        let err = cli.apply(Config::default()).unwrap_err();

        assert!(format!("{err:#}").contains("timeout must be greater than 0"));
    }
}
