//! # sshdesk
//!
//! Headless driver for the sshdesk session lifecycle.
//!
//! ## Overview
//!
//! Reads JSON-line commands from stdin (`connect`, `retry`, `close`,
//! `reconnect`, `activate`, `monitor`, `close_connection`, `rename`, `list`)
//! and writes JSON-line responses and notices to stdout. Remote sessions are
//! served by an in-process simulated transport.
//!
//! ## Architecture
//!
//! This is Layer 2 - the binary that ties together:
//! - sshdesk-core: Core types and configuration
//! - sshdesk-session: Session lifecycle

use std::time::Duration;

use anyhow::Context;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use sshdesk::Driver;
use sshdesk_core::ClientConfig;

/// Simulated open latency when `--latency-ms` is not given.
const DEFAULT_LATENCY_MS: u64 = 200;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let config = match arg_value(&args, "--config") {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("loading config from {path}"))?,
        None => ClientConfig::default(),
    };
    config.validate()?;
    let latency_ms = match arg_value(&args, "--latency-ms") {
        Some(value) => value
            .parse::<u64>()
            .with_context(|| format!("invalid --latency-ms value '{value}'"))?,
        None => DEFAULT_LATENCY_MS,
    };

    // Initialize logging; stdout is reserved for JSON lines
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.client.log_level)),
        )
        .init();

    tracing::info!(
        "sshdesk driver v{} starting: {} connection(s), latency={}ms",
        env!("CARGO_PKG_VERSION"),
        config.connections.len(),
        latency_ms
    );

    let (mut driver, _transport) = Driver::with_simulation(
        &config,
        Duration::from_millis(latency_ms),
        tokio::io::stdout(),
    );
    driver.run(BufReader::new(tokio::io::stdin())).await?;

    tracing::info!("sshdesk driver shutting down");

    Ok(())
}

/// Value following `flag` in the argument list.
fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .map(String::as_str)
}
