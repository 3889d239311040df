//! # Topic Snapshots
//!
//! Last fetched state of every topic, plus the per-topic locks that keep
//! fetches of one topic strictly sequential.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::{HubUrl, TopicSnapshot};

/// Snapshot store. Only the content fetcher writes to it.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: DashMap<HubUrl, TopicSnapshot>,
    fetch_locks: DashMap<HubUrl, Arc<Mutex<()>>>,
}

impl SnapshotStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of a topic's snapshot.
    pub fn get(&self, topic: &HubUrl) -> Option<TopicSnapshot> {
        self.snapshots.get(topic).map(|s| s.value().clone())
    }

    /// Replace a topic's snapshot.
    pub fn put(&self, snapshot: TopicSnapshot) {
        self.snapshots.insert(snapshot.topic.clone(), snapshot);
    }

    /// Lock serialising fetches of `topic`.
    pub fn fetch_lock(&self, topic: &HubUrl) -> Arc<Mutex<()>> {
        self.fetch_locks
            .entry(topic.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Number of topics with a snapshot.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// No snapshot stored yet.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
