//! # Publish Ingestor
//!
//! Validates publish pings and runs fetch → delta → dispatch for each topic
//! in the background.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::FetchConfig;
use crate::domain::{HubError, HubUrl};
use crate::ports::inbound::PublishRequest;
use crate::ports::outbound::TimeSource;
use crate::store::SubscriptionStore;

use super::dispatcher::NotificationDispatcher;
use super::fetcher::{ContentFetcher, FetchOutcome};

/// Publish ingestor.
pub struct PublishIngestor {
    store: Arc<SubscriptionStore>,
    fetcher: Arc<ContentFetcher>,
    dispatcher: Arc<NotificationDispatcher>,
    time: Arc<dyn TimeSource>,
    config: FetchConfig,
}

impl PublishIngestor {
    /// Create an ingestor.
    pub fn new(
        store: Arc<SubscriptionStore>,
        fetcher: Arc<ContentFetcher>,
        dispatcher: Arc<NotificationDispatcher>,
        time: Arc<dyn TimeSource>,
        config: FetchConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            dispatcher,
            time,
            config,
        }
    }

    /// Distinct topics named by `hub.url`, in submission order.
    pub fn validate(&self, request: &PublishRequest) -> Result<Vec<HubUrl>, HubError> {
        let mut topics: Vec<HubUrl> = Vec::new();
        for raw in request.urls.iter().filter(|u| !u.is_empty()) {
            let topic = HubUrl::parse("hub.url", raw)?;
            if !topics.contains(&topic) {
                topics.push(topic);
            }
        }
        if topics.is_empty() {
            return Err(HubError::MissingField { field: "hub.url" });
        }
        Ok(topics)
    }

    /// Validate and schedule processing of every topic.
    ///
    /// The caller answers the publisher as soon as this returns.
    pub fn ingest(
        self: &Arc<Self>,
        request: &PublishRequest,
    ) -> Result<Vec<JoinHandle<usize>>, HubError> {
        let topics = self.validate(request)?;
        info!(topics = topics.len(), "Publish accepted");

        Ok(topics
            .into_iter()
            .map(|topic| {
                let ingestor = Arc::clone(self);
                tokio::spawn(async move { ingestor.process(&topic).await })
            })
            .collect())
    }

    /// Fetch one topic and queue its delta. Returns how many subscribers
    /// the delta was queued for.
    pub async fn process(&self, topic: &HubUrl) -> usize {
        let subscriber_count = self.store.subscriber_count(topic, self.time.now());
        if subscriber_count == 0 && self.config.skip_without_subscribers {
            debug!(topic = %topic, "No subscribers, fetch skipped");
            return 0;
        }

        match self.fetcher.fetch(topic, subscriber_count).await {
            FetchOutcome::Delta(delta) => {
                let subscribers = self.store.active_subscribers(topic, self.time.now());
                self.dispatcher.dispatch(&delta, subscribers)
            }
            FetchOutcome::Unchanged | FetchOutcome::Failed(_) => 0,
        }
    }
}
