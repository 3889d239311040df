//! # Domain Entities
//!
//! Subscription records, topic snapshots, deltas and the attempt records the
//! verification engine and the dispatcher keep while they work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::value_objects::{Challenge, HubUrl, Mode, Secret, SubscriptionKey, VerifyMode};

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

/// Observable state of a `(topic, callback)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionStatus {
    /// No active subscription and nothing pending.
    None,
    /// A subscribe/unsubscribe request is waiting for verification.
    PendingVerification,
    /// Verified and receiving notifications.
    Subscribed,
}

impl SubscriptionStatus {
    /// Wire/diagnostic representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::None => "none",
            SubscriptionStatus::PendingVerification => "pendingVerification",
            SubscriptionStatus::Subscribed => "subscribed",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request that has been accepted but not yet verified.
#[derive(Clone, Debug)]
pub struct PendingChange {
    /// Store-wide sequence number; only the latest pending change may commit.
    pub generation: u64,
    /// Intent being verified.
    pub mode: Mode,
    /// Token echoed in the verification request.
    pub verify_token: Option<String>,
    /// Secret to install on success.
    pub secret: Option<Secret>,
    /// Lease to install on success (subscribe only).
    pub lease: Option<Duration>,
    /// Cancelled when superseded or when the record is removed.
    pub cancel: CancellationToken,
}

/// Subscription record.
///
/// The committed fields (`active`, `verify_token`, `secret`, `lease_expiry`)
/// only change when a verification succeeds; everything in flight lives in
/// `pending`. Dropping `pending` is therefore enough to restore the exact
/// prior state after a failed verification.
#[derive(Clone, Debug)]
pub struct Subscription {
    /// Identity.
    pub key: SubscriptionKey,
    /// Committed: verified and receiving notifications.
    pub active: bool,
    /// Committed verify token.
    pub verify_token: Option<String>,
    /// Committed secret used to sign notifications.
    pub secret: Option<Secret>,
    /// Committed lease expiry.
    pub lease_expiry: Option<DateTime<Utc>>,
    /// When the current committed state was verified.
    pub verified_at: Option<DateTime<Utc>>,
    /// In-flight request, if any.
    pub pending: Option<PendingChange>,
    /// Cancels the delivery worker and its retries; present while active.
    pub delivery: Option<CancellationToken>,
}

impl Subscription {
    /// Fresh, inactive record.
    pub fn new(key: SubscriptionKey) -> Self {
        Self {
            key,
            active: false,
            verify_token: None,
            secret: None,
            lease_expiry: None,
            verified_at: None,
            pending: None,
            delivery: None,
        }
    }

    /// Current status including pending requests.
    pub fn status(&self) -> SubscriptionStatus {
        if self.pending.is_some() {
            SubscriptionStatus::PendingVerification
        } else {
            self.committed_status()
        }
    }

    /// Status ignoring pending requests.
    pub fn committed_status(&self) -> SubscriptionStatus {
        if self.active {
            SubscriptionStatus::Subscribed
        } else {
            SubscriptionStatus::None
        }
    }

    /// Pending intent, if a request is waiting for verification.
    pub fn mode(&self) -> Option<Mode> {
        self.pending.as_ref().map(|p| p.mode)
    }

    /// Whether the committed lease has run out.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.lease_expiry.is_some_and(|expiry| expiry <= now)
    }

    /// Active and within its lease.
    pub fn is_deliverable(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired(now)
    }

    /// Nothing committed and nothing pending: the record can be dropped.
    pub fn is_vacant(&self) -> bool {
        !self.active && self.pending.is_none()
    }
}

/// Snapshot of an active subscription handed to the dispatcher.
#[derive(Clone, Debug)]
pub struct ActiveSubscription {
    /// Identity.
    pub key: SubscriptionKey,
    /// Signing key, if any.
    pub secret: Option<Secret>,
    /// Delivery cancellation token.
    pub delivery: CancellationToken,
}

/// Result of committing a verified change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Verified subscribe; record now `subscribed`.
    Activated,
    /// Verified subscribe on an already active record.
    Renewed,
    /// Verified unsubscribe; record removed.
    Removed,
    /// Failed verification; committed state untouched.
    Reverted,
    /// A newer request replaced this one; nothing changed.
    Superseded,
}

// =============================================================================
// FEEDS
// =============================================================================

/// One entry of a topic feed, carried byte-for-byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedEntry {
    /// Raw `<id>` text, never normalised.
    pub id: String,
    /// Raw `<updated>` text.
    pub updated: Option<String>,
    /// Raw XML of the whole `<entry>` element.
    pub raw: String,
    /// Entry already carries an `atom:source` child.
    pub has_source: bool,
}

/// Feed-level metadata used to build `atom:source`.
///
/// Values are kept in their escaped XML form so they can be written back
/// without another round of escaping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedMetadata {
    /// Feed `<id>`.
    pub id: Option<String>,
    /// Feed `<title>`.
    pub title: Option<String>,
    /// Feed `<updated>`.
    pub updated: Option<String>,
    /// `href` of `<link rel="self">`.
    pub self_link: Option<String>,
}

/// Everything in a feed document except its entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedHeader {
    /// Original `<feed ...>` start tag (namespaces included).
    pub root_open_tag: String,
    /// Raw feed-level children with the entries cut out.
    pub head: String,
    /// Parsed metadata.
    pub metadata: FeedMetadata,
}

/// Parsed topic content.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    /// Feed-level part.
    pub header: FeedHeader,
    /// Entries in document order.
    pub entries: Vec<FeedEntry>,
}

/// Last successfully fetched state of a topic.
#[derive(Clone, Debug)]
pub struct TopicSnapshot {
    /// Topic URL.
    pub topic: HubUrl,
    /// Raw fetched body.
    pub content: String,
    /// Entry id → latest `<updated>` seen.
    pub entries: HashMap<String, Option<String>>,
    /// Time of the fetch.
    pub fetched_at: DateTime<Utc>,
    /// Incremented for every fetch that produced a non-empty delta.
    pub version: u64,
}

/// New and changed entries between two fetches of a topic.
#[derive(Clone, Debug)]
pub struct Delta {
    /// Topic URL.
    pub topic: HubUrl,
    /// Snapshot version this delta produced.
    pub version: u64,
    /// Feed-level part of the fetched document.
    pub header: FeedHeader,
    /// New/changed entries in document order.
    pub entries: Vec<FeedEntry>,
}

impl Delta {
    /// No entries to deliver.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// ATTEMPTS
// =============================================================================

/// Delivery bookkeeping for one delta to one subscriber.
#[derive(Clone, Debug)]
pub struct NotificationAttempt {
    /// Target subscription.
    pub key: SubscriptionKey,
    /// Delta version being delivered.
    pub delta_version: u64,
    /// Attempts made so far.
    pub attempts: u32,
    /// When the next attempt is due.
    pub next_retry_at: Option<Instant>,
    /// Set once delivered. Failures never set it.
    pub terminal: bool,
}

impl NotificationAttempt {
    /// New attempt record.
    pub fn new(key: SubscriptionKey, delta_version: u64) -> Self {
        Self {
            key,
            delta_version,
            attempts: 0,
            next_retry_at: None,
            terminal: false,
        }
    }

    /// Record a failed attempt and schedule the next one.
    pub fn record_failure(&mut self, backoff: Duration) {
        self.attempts += 1;
        self.next_retry_at = Some(Instant::now() + backoff);
    }

    /// Record the successful attempt.
    pub fn record_success(&mut self) {
        self.attempts += 1;
        self.next_retry_at = None;
        self.terminal = true;
    }
}

/// Verification bookkeeping for one subscribe/unsubscribe request.
#[derive(Clone, Debug)]
pub struct VerificationAttempt {
    /// Target subscription.
    pub key: SubscriptionKey,
    /// Challenge of the most recent attempt.
    pub challenge: Challenge,
    /// Sync or async.
    pub mode: VerifyMode,
    /// Attempts made so far.
    pub attempts: u32,
    /// Definitive outcome reached.
    pub terminal: bool,
}

impl VerificationAttempt {
    /// New attempt record with a first challenge.
    pub fn new(key: SubscriptionKey, mode: VerifyMode, challenge: Challenge) -> Self {
        Self {
            key,
            challenge,
            mode,
            attempts: 0,
            terminal: false,
        }
    }
}
