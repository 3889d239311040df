//! # Delta Computation
//!
//! Decides which entries of a freshly fetched feed are new or changed.

use chrono::DateTime;
use std::collections::{HashMap, HashSet};

use crate::domain::FeedEntry;

/// Entry id → `<updated>` text, as stored in a topic snapshot.
pub type EntryIndex = HashMap<String, Option<String>>;

/// Whether `current` is a newer update than `previous`.
///
/// Timestamps are compared as RFC 3339 instants when both parse; otherwise
/// any difference counts as an update.
pub fn is_updated(previous: Option<&str>, current: Option<&str>) -> bool {
    match (previous, current) {
        (Some(prev), Some(cur)) => match (
            DateTime::parse_from_rfc3339(prev.trim()),
            DateTime::parse_from_rfc3339(cur.trim()),
        ) {
            (Ok(prev), Ok(cur)) => cur > prev,
            _ => prev != cur,
        },
        (None, None) => false,
        _ => previous != current,
    }
}

/// New and changed entries, in document order.
///
/// With no previous snapshot every entry is new. An id repeated inside one
/// document is only considered once.
pub fn compute_delta(previous: Option<&EntryIndex>, entries: &[FeedEntry]) -> Vec<FeedEntry> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|entry| seen.insert(entry.id.as_str()))
        .filter(|entry| match previous.and_then(|index| index.get(&entry.id)) {
            None => true,
            Some(prev) => is_updated(prev.as_deref(), entry.updated.as_deref()),
        })
        .cloned()
        .collect()
}

/// Fold a fetched document into the stored index.
///
/// Ids that disappeared from the feed are kept so that an entry falling out
/// of the window and coming back unchanged is not redelivered.
pub fn merge_index(previous: Option<&EntryIndex>, entries: &[FeedEntry]) -> EntryIndex {
    let mut index = previous.cloned().unwrap_or_default();
    for entry in entries {
        let replace = match index.get(&entry.id) {
            None => true,
            Some(prev) => is_updated(prev.as_deref(), entry.updated.as_deref()),
        };
        if replace {
            index.insert(entry.id.clone(), entry.updated.clone());
        }
    }
    index
}
