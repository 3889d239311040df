//! # Content Fetcher
//!
//! Pulls a topic's current representation and turns it into a delta against
//! the stored snapshot. Fetches of one topic never overlap.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::algorithms::{compute_delta, merge_index};
use crate::config::FetchConfig;
use crate::domain::{Delta, HubUrl, TopicSnapshot};
use crate::ports::outbound::{FeedParser, HttpTransport, OutboundRequest, TimeSource};
use crate::store::SnapshotStore;

/// Header telling publishers how many subscribers a topic has.
pub const SUBSCRIBERS_HEADER: &str = "X-Hub-Subscribers";

/// Result of one fetch.
#[derive(Clone, Debug)]
pub enum FetchOutcome {
    /// New or changed entries found; the snapshot was advanced.
    Delta(Delta),
    /// Fetched fine, nothing to deliver.
    Unchanged,
    /// Transport failure, non-2xx or unparseable body. Snapshot untouched.
    Failed(String),
}

/// Content fetcher.
pub struct ContentFetcher {
    transport: Arc<dyn HttpTransport>,
    parser: Arc<dyn FeedParser>,
    snapshots: Arc<SnapshotStore>,
    time: Arc<dyn TimeSource>,
    config: FetchConfig,
}

impl ContentFetcher {
    /// Create a fetcher.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        parser: Arc<dyn FeedParser>,
        snapshots: Arc<SnapshotStore>,
        time: Arc<dyn TimeSource>,
        config: FetchConfig,
    ) -> Self {
        Self {
            transport,
            parser,
            snapshots,
            time,
            config,
        }
    }

    /// Fetch `topic` and advance its snapshot.
    pub async fn fetch(&self, topic: &HubUrl, subscriber_count: usize) -> FetchOutcome {
        let lock = self.snapshots.fetch_lock(topic);
        let _guard = lock.lock().await;

        let mut request = OutboundRequest::get(topic.url().clone()).with_timeout(self.config.timeout);
        if self.config.send_subscriber_count {
            request = request.with_header(SUBSCRIBERS_HEADER, subscriber_count.to_string());
        }

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(topic = %topic, error = %e, "Topic fetch failed");
                return FetchOutcome::Failed(e.to_string());
            }
        };
        if !response.is_success() {
            warn!(topic = %topic, status = response.status, "Topic fetch returned non-2xx");
            return FetchOutcome::Failed(format!("HTTP {}", response.status));
        }

        let feed = match self.parser.parse(&response.body) {
            Ok(feed) => feed,
            Err(e) => {
                warn!(topic = %topic, error = %e, "Topic content could not be parsed");
                return FetchOutcome::Failed(e.to_string());
            }
        };

        let previous = self.snapshots.get(topic);
        let previous_index = previous.as_ref().map(|s| &s.entries);
        let entries = compute_delta(previous_index, &feed.entries);
        let index = merge_index(previous_index, &feed.entries);
        let version = previous.as_ref().map_or(0, |s| s.version) + u64::from(!entries.is_empty());

        self.snapshots.put(TopicSnapshot {
            topic: topic.clone(),
            content: String::from_utf8_lossy(&response.body).into_owned(),
            entries: index,
            fetched_at: self.time.now(),
            version,
        });

        if entries.is_empty() {
            debug!(topic = %topic, "No new entries");
            return FetchOutcome::Unchanged;
        }

        debug!(topic = %topic, version, entries = entries.len(), "Delta computed");
        FetchOutcome::Delta(Delta {
            topic: topic.clone(),
            version,
            header: feed.header,
            entries,
        })
    }
}
