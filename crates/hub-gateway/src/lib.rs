//! # Hub Gateway
//!
//! HTTP surface of the WebSub hub.
//!
//! ```text
//! POST /  (form)  ──► hub.mode=subscribe|unsubscribe ──► HubApi::subscribe
//!                 └─► hub.mode=publish               ──► HubApi::publish
//! GET  /?hub.mode=status&hub.topic=…&hub.callback=… ──► HubApi::subscription_status
//! ```
//!
//! `/subscribe` and `/publish` are aliases of `/`. Every request passes
//! through a body size limit and the [`middleware::TracingLayer`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod form;
pub mod middleware;
pub mod router;

pub use error::{ApiError, GatewayError};
pub use form::FormFields;
pub use router::{build_router, AppState};

use hub_core::HubApi;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Serve the hub on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    hub: Arc<dyn HubApi>,
    max_body_bytes: usize,
    shutdown: CancellationToken,
) -> Result<(), GatewayError> {
    let addr: SocketAddr = listener.local_addr()?;
    info!(addr = %addr, "Hub endpoint listening");

    let router = build_router(hub, max_body_bytes);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Hub endpoint stopped");
    Ok(())
}
