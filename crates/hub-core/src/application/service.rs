//! # Hub Service
//!
//! Wires the stores, the verification engine, the fetcher and the dispatcher
//! together and implements the inbound [`HubApi`].

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::adapters::{AtomFeedParser, ReqwestTransport};
use crate::config::HubConfig;
use crate::domain::{HubError, HubUrl, SubscriptionKey, SubscriptionStatus};
use crate::ports::inbound::{HubApi, PublishRequest, SubscribeOutcome, SubscriptionRequest};
use crate::ports::outbound::{FeedParser, HttpTransport, SystemTimeSource, TimeSource};
use crate::store::{SnapshotStore, SubscriptionStore};

use super::dispatcher::NotificationDispatcher;
use super::fetcher::ContentFetcher;
use super::publish::PublishIngestor;
use super::request_handler::SubscriptionRequestHandler;
use super::verification::VerificationEngine;

/// Hub Service - owns every component of the protocol engine.
pub struct HubService {
    config: HubConfig,
    store: Arc<SubscriptionStore>,
    snapshots: Arc<SnapshotStore>,
    requests: SubscriptionRequestHandler,
    ingestor: Arc<PublishIngestor>,
    dispatcher: Arc<NotificationDispatcher>,
    time: Arc<dyn TimeSource>,
    shutdown: CancellationToken,
}

impl HubService {
    /// Create a service over explicit collaborators.
    pub fn new(
        config: HubConfig,
        transport: Arc<dyn HttpTransport>,
        parser: Arc<dyn FeedParser>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let store = Arc::new(SubscriptionStore::with_shutdown(shutdown.clone()));
        let snapshots = Arc::new(SnapshotStore::new());

        let engine = Arc::new(VerificationEngine::new(
            Arc::clone(&transport),
            Arc::clone(&store),
            Arc::clone(&time),
            config.verification.clone(),
        ));
        let requests =
            SubscriptionRequestHandler::new(Arc::clone(&store), engine, config.clone());

        let fetcher = Arc::new(ContentFetcher::new(
            Arc::clone(&transport),
            parser,
            Arc::clone(&snapshots),
            Arc::clone(&time),
            config.fetch.clone(),
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            transport,
            config.delivery.clone(),
        ));
        let ingestor = Arc::new(PublishIngestor::new(
            Arc::clone(&store),
            fetcher,
            Arc::clone(&dispatcher),
            Arc::clone(&time),
            config.fetch.clone(),
        ));

        Self {
            config,
            store,
            snapshots,
            requests,
            ingestor,
            dispatcher,
            time,
            shutdown,
        }
    }

    /// Service with the reqwest transport, the Atom parser and the system clock.
    pub fn with_defaults(config: HubConfig) -> Result<Self, HubError> {
        let transport = ReqwestTransport::new(config.fetch.timeout, &config.fetch.user_agent)?;
        Ok(Self::new(
            config,
            Arc::new(transport),
            Arc::new(AtomFeedParser::new()),
            Arc::new(SystemTimeSource),
        ))
    }

    /// Configuration in use.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Subscription store.
    pub fn store(&self) -> &Arc<SubscriptionStore> {
        &self.store
    }

    /// Topic snapshots.
    pub fn snapshots(&self) -> &Arc<SnapshotStore> {
        &self.snapshots
    }

    /// Publish ingestor, for callers that want to await processing.
    pub fn ingestor(&self) -> &Arc<PublishIngestor> {
        &self.ingestor
    }

    /// Periodically purge expired leases until [`HubService::shutdown`].
    pub fn spawn_lease_sweeper(&self) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let dispatcher = Arc::clone(&self.dispatcher);
        let time = Arc::clone(&self.time);
        let shutdown = self.shutdown.clone();
        let period = self.config.lease.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let expired = store.purge_expired(time.now());
                        if !expired.is_empty() {
                            info!(count = expired.len(), "Expired subscriptions removed");
                        }
                        let pruned = dispatcher.prune();
                        if pruned > 0 {
                            debug!(pruned, "Idle delivery workers pruned");
                        }
                    }
                }
            }
        })
    }

    /// Stop the lease sweeper, async verifications and delivery workers.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl HubApi for HubService {
    async fn subscribe(&self, request: SubscriptionRequest) -> Result<SubscribeOutcome, HubError> {
        self.requests.handle(request).await
    }

    async fn publish(&self, request: PublishRequest) -> Result<(), HubError> {
        self.ingestor.ingest(&request).map(|_| ())
    }

    fn subscription_status(
        &self,
        topic: &str,
        callback: &str,
    ) -> Result<SubscriptionStatus, HubError> {
        if callback.is_empty() {
            return Err(HubError::MissingField { field: "hub.callback" });
        }
        if topic.is_empty() {
            return Err(HubError::MissingField { field: "hub.topic" });
        }
        let key = SubscriptionKey::new(
            HubUrl::parse("hub.topic", topic)?,
            HubUrl::parse("hub.callback", callback)?,
        );
        Ok(self.store.committed_status(&key))
    }
}
