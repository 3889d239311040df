//! # Subscription Store
//!
//! Arena of subscription records keyed by `(topic, callback)`. All status
//! transitions happen under one lock, so a status read never observes a
//! half-applied change.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::{
    invariant_secret_compatible, ActiveSubscription, HubError, HubUrl, Mode, PendingChange,
    Secret, Subscription, SubscriptionKey, SubscriptionStatus, Transition,
};

/// A validated request about to be verified.
#[derive(Clone, Debug)]
pub struct ChangeRequest {
    /// Target record.
    pub key: SubscriptionKey,
    /// Intent.
    pub mode: Mode,
    /// Token to echo during verification.
    pub verify_token: Option<String>,
    /// Secret to install on success.
    pub secret: Option<Secret>,
    /// Lease to install on success.
    pub lease: Option<Duration>,
}

/// Handle on an installed pending change.
#[derive(Clone, Debug)]
pub struct ChangeTicket {
    /// Target record.
    pub key: SubscriptionKey,
    /// Generation the completion must match.
    pub generation: u64,
    /// Intent.
    pub mode: Mode,
    /// Token to echo during verification.
    pub verify_token: Option<String>,
    /// Lease offered to the subscriber.
    pub lease: Option<Duration>,
    /// Cancelled when this change is superseded or the record goes away.
    pub cancel: CancellationToken,
}

/// In-memory subscription store.
#[derive(Debug, Default)]
pub struct SubscriptionStore {
    records: Mutex<HashMap<SubscriptionKey, Subscription>>,
    generation: AtomicU64,
    shutdown: CancellationToken,
}

impl SubscriptionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store whose pending and delivery tokens are children of
    /// `shutdown`.
    pub fn with_shutdown(shutdown: CancellationToken) -> Self {
        Self {
            shutdown,
            ..Self::default()
        }
    }

    /// Install a pending change, superseding any older one on the record.
    ///
    /// Secret conflicts are checked against the committed and pending secret
    /// of the same record and against every other topic the callback is
    /// subscribed (or subscribing) to. A rejected request leaves the store
    /// untouched.
    pub fn begin_change(&self, request: ChangeRequest) -> Result<ChangeTicket, HubError> {
        let mut records = self.records.lock();

        if request.mode == Mode::Subscribe && request.secret.is_some() {
            for (key, record) in records.iter() {
                if key.callback != request.key.callback {
                    continue;
                }
                let held = record.active.then_some(record.secret.as_ref()).flatten();
                invariant_secret_compatible(held, request.secret.as_ref())?;
                if let Some(pending) = &record.pending {
                    if pending.mode == Mode::Subscribe {
                        invariant_secret_compatible(
                            pending.secret.as_ref(),
                            request.secret.as_ref(),
                        )?;
                    }
                }
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = self.shutdown.child_token();
        let record = records
            .entry(request.key.clone())
            .or_insert_with(|| Subscription::new(request.key.clone()));

        if let Some(previous) = record.pending.take() {
            debug!(
                subscription = %request.key,
                superseded = previous.generation,
                generation,
                "Pending change superseded"
            );
            previous.cancel.cancel();
        }

        record.pending = Some(PendingChange {
            generation,
            mode: request.mode,
            verify_token: request.verify_token.clone(),
            secret: request.secret,
            lease: request.lease,
            cancel: cancel.clone(),
        });

        Ok(ChangeTicket {
            key: request.key,
            generation,
            mode: request.mode,
            verify_token: request.verify_token,
            lease: request.lease,
            cancel,
        })
    }

    /// Commit or discard a pending change after verification.
    ///
    /// Only the record's current generation may commit; anything older is
    /// reported as [`Transition::Superseded`] and changes nothing.
    pub fn complete_change(
        &self,
        ticket: &ChangeTicket,
        verified: bool,
        now: DateTime<Utc>,
    ) -> Transition {
        let mut records = self.records.lock();
        let Some(record) = records.get_mut(&ticket.key) else {
            return Transition::Superseded;
        };
        if record.pending.as_ref().map(|p| p.generation) != Some(ticket.generation) {
            return Transition::Superseded;
        }
        let Some(pending) = record.pending.take() else {
            return Transition::Superseded;
        };

        if !verified {
            if record.is_vacant() {
                records.remove(&ticket.key);
            }
            return Transition::Reverted;
        }

        match pending.mode {
            Mode::Subscribe => {
                let renewed = record.active;
                record.active = true;
                record.verify_token = pending.verify_token;
                record.secret = pending.secret;
                record.lease_expiry = pending.lease.and_then(|lease| {
                    chrono::Duration::from_std(lease)
                        .ok()
                        .and_then(|lease| now.checked_add_signed(lease))
                });
                record.verified_at = Some(now);
                if record.delivery.is_none() {
                    record.delivery = Some(self.shutdown.child_token());
                }
                if renewed {
                    Transition::Renewed
                } else {
                    Transition::Activated
                }
            }
            Mode::Unsubscribe => {
                if let Some(delivery) = record.delivery.take() {
                    delivery.cancel();
                }
                records.remove(&ticket.key);
                Transition::Removed
            }
        }
    }

    /// Status including pending requests.
    pub fn status(&self, key: &SubscriptionKey) -> SubscriptionStatus {
        self.records
            .lock()
            .get(key)
            .map(Subscription::status)
            .unwrap_or(SubscriptionStatus::None)
    }

    /// Status ignoring pending requests.
    pub fn committed_status(&self, key: &SubscriptionKey) -> SubscriptionStatus {
        self.records
            .lock()
            .get(key)
            .map(Subscription::committed_status)
            .unwrap_or(SubscriptionStatus::None)
    }

    /// Copy of a record.
    pub fn get(&self, key: &SubscriptionKey) -> Option<Subscription> {
        self.records.lock().get(key).cloned()
    }

    /// Deliverable subscriptions for a topic.
    pub fn active_subscribers(&self, topic: &HubUrl, now: DateTime<Utc>) -> Vec<ActiveSubscription> {
        self.records
            .lock()
            .values()
            .filter(|record| &record.key.topic == topic && record.is_deliverable(now))
            .filter_map(|record| {
                record.delivery.as_ref().map(|delivery| ActiveSubscription {
                    key: record.key.clone(),
                    secret: record.secret.clone(),
                    delivery: delivery.clone(),
                })
            })
            .collect()
    }

    /// Number of deliverable subscriptions for a topic.
    pub fn subscriber_count(&self, topic: &HubUrl, now: DateTime<Utc>) -> usize {
        self.records
            .lock()
            .values()
            .filter(|record| &record.key.topic == topic && record.is_deliverable(now))
            .count()
    }

    /// Deactivate subscriptions whose lease ran out.
    ///
    /// Delivery workers are cancelled. Records with a pending renewal keep
    /// the pending change; the rest are removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Vec<SubscriptionKey> {
        let mut records = self.records.lock();
        let expired: Vec<SubscriptionKey> = records
            .values()
            .filter(|record| record.active && record.is_expired(now))
            .map(|record| record.key.clone())
            .collect();

        for key in &expired {
            let Some(record) = records.get_mut(key) else {
                continue;
            };
            if let Some(delivery) = record.delivery.take() {
                delivery.cancel();
            }
            record.active = false;
            record.secret = None;
            record.verify_token = None;
            record.lease_expiry = None;
            if record.is_vacant() {
                records.remove(key);
            }
        }
        expired
    }

    /// Number of records (active or pending).
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// No records at all.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
