//! # Inbound Ports
//!
//! What the hub offers to its HTTP surface. Requests arrive as raw form
//! values; validation happens inside the engine so every surface gets the
//! same error bodies.

use async_trait::async_trait;

use crate::domain::{HubError, SubscriptionStatus};

/// Raw `hub.mode=subscribe|unsubscribe` form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionRequest {
    /// `hub.mode`
    pub mode: Option<String>,
    /// `hub.callback`
    pub callback: Option<String>,
    /// `hub.topic`
    pub topic: Option<String>,
    /// `hub.verify`, in submission order.
    pub verify: Vec<String>,
    /// `hub.verify_token`
    pub verify_token: Option<String>,
    /// `hub.secret`
    pub secret: Option<String>,
    /// `hub.lease_seconds`
    pub lease_seconds: Option<String>,
    /// `hub.debug.retry_after`
    pub debug_retry_after: Option<String>,
}

/// Raw `hub.mode=publish` form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublishRequest {
    /// `hub.url`, one per updated topic.
    pub urls: Vec<String>,
}

/// How a valid subscription request was answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// Sync verification succeeded (204).
    Verified,
    /// Async verification scheduled (202).
    Accepted,
}

/// Hub API - inbound port.
#[async_trait]
pub trait HubApi: Send + Sync {
    /// Handle a subscribe or unsubscribe request.
    ///
    /// In sync mode this returns only after the verification round-trip.
    async fn subscribe(&self, request: SubscriptionRequest) -> Result<SubscribeOutcome, HubError>;

    /// Accept a publish notification. The fetch/notify pipeline runs in the
    /// background; this returns as soon as the request is validated.
    async fn publish(&self, request: PublishRequest) -> Result<(), HubError>;

    /// Committed status of a `(topic, callback)` pair.
    fn subscription_status(&self, topic: &str, callback: &str)
        -> Result<SubscriptionStatus, HubError>;
}
