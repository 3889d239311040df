//! # Hub Node
//!
//! Runtime for the WebSub hub binary.
//!
//! ## Startup Sequence
//!
//! 1. Parse command line flags
//! 2. Load configuration (file → env → flags) and validate it
//! 3. Install logging
//! 4. Build the [`HubService`] and start the lease sweeper
//! 5. Serve the hub endpoint until shutdown

pub mod cli;
pub mod config_loader;

use anyhow::{Context, Result};
use hub_core::{HubConfig, HubService};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use cli::Args;
pub use config_loader::{apply_env_overrides, load_config};

/// Run the hub on an already bound listener until `shutdown` fires.
pub async fn run(config: HubConfig, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
    let service = Arc::new(HubService::with_defaults(config.clone()).context("building hub service")?);
    let sweeper = service.spawn_lease_sweeper();

    info!(
        verify_attempts = config.verification.max_attempts,
        signature = %config.delivery.signature_algorithm,
        "Hub service ready"
    );

    let served = hub_gateway::serve(
        listener,
        Arc::clone(&service) as Arc<dyn hub_core::HubApi>,
        config.http.max_body_bytes,
        shutdown,
    )
    .await;

    service.shutdown();
    let _ = sweeper.await;
    served.context("hub endpoint failed")
}

/// Bind the configured address and run until `shutdown` fires.
pub async fn start(config: HubConfig, shutdown: CancellationToken) -> Result<()> {
    let addr = config.http_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    run(config, listener, shutdown).await
}
