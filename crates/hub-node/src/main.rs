//! WebSub hub entry point.

use anyhow::{Context, Result};
use clap::Parser;
use hub_node::{load_config, start, Args};
use hub_telemetry::{init_telemetry, TelemetryConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(level) = &args.log_level {
        telemetry = telemetry.with_log_level(level.clone());
    }
    init_telemetry(&telemetry).context("initializing logging")?;

    let config = load_config(&args, |key| std::env::var(key).ok())?;
    info!(
        version = hub_core::VERSION,
        addr = %config.http_addr(),
        "Starting WebSub hub"
    );

    let shutdown = CancellationToken::new();
    let mut server = tokio::spawn(start(config, shutdown.clone()));

    let joined = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl-C")?;
            info!("Shutdown requested");
            shutdown.cancel();
            server.await
        }
        joined = &mut server => joined,
    };

    match joined {
        Ok(Ok(())) => {
            info!("Hub stopped");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "Hub failed");
            Err(e)
        }
        Err(e) => Err(e).context("hub task panicked"),
    }
}
