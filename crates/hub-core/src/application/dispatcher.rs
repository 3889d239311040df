//! # Notification Dispatcher
//!
//! One worker per subscription, fed through an unbounded queue. A worker
//! delivers its queue strictly in order and retries each notification until
//! it gets a 2xx or its subscription's delivery token is cancelled, so a
//! slow or failing subscriber only ever delays itself.

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::algorithms::{
    build_notification, sign_body, RetryPolicy, SignatureAlgorithm, SIGNATURE_HEADER,
};
use crate::config::DeliveryConfig;
use crate::domain::{
    ActiveSubscription, Delta, HubUrl, NotificationAttempt, Secret, SubscriptionKey,
    ATOM_CONTENT_TYPE,
};
use crate::ports::outbound::{HttpTransport, OutboundRequest};

/// Rendered notification shared by every subscriber of a delta.
#[derive(Debug)]
pub struct Notification {
    /// Topic the delta belongs to.
    pub topic: HubUrl,
    /// Delta version.
    pub version: u64,
    /// Atom document.
    pub body: Bytes,
}

#[derive(Debug)]
struct Job {
    notification: Arc<Notification>,
    secret: Option<Secret>,
}

#[derive(Debug)]
struct Worker {
    sender: mpsc::UnboundedSender<Job>,
    delivery: CancellationToken,
}

impl Worker {
    fn is_live(&self) -> bool {
        !self.delivery.is_cancelled() && !self.sender.is_closed()
    }
}

/// Notification dispatcher.
pub struct NotificationDispatcher {
    transport: Arc<dyn HttpTransport>,
    config: DeliveryConfig,
    workers: DashMap<SubscriptionKey, Worker>,
}

impl NotificationDispatcher {
    /// Create a dispatcher.
    pub fn new(transport: Arc<dyn HttpTransport>, config: DeliveryConfig) -> Self {
        Self {
            transport,
            config,
            workers: DashMap::new(),
        }
    }

    /// Render a delta once and queue it for every subscriber.
    ///
    /// Returns the number of subscribers it was queued for.
    pub fn dispatch(&self, delta: &Delta, subscribers: Vec<ActiveSubscription>) -> usize {
        if delta.is_empty() || subscribers.is_empty() {
            return 0;
        }

        let notification = Arc::new(Notification {
            topic: delta.topic.clone(),
            version: delta.version,
            body: Bytes::from(build_notification(&delta.header, &delta.entries)),
        });

        let mut queued = 0;
        for subscriber in subscribers {
            let job = Job {
                notification: Arc::clone(&notification),
                secret: subscriber.secret.clone(),
            };
            let mut worker = self
                .workers
                .entry(subscriber.key.clone())
                .or_insert_with(|| self.spawn_worker(&subscriber));
            // A cancelled token is never reused: a new subscription means a new worker.
            if !worker.is_live() {
                *worker = self.spawn_worker(&subscriber);
            }
            if worker.sender.send(job).is_ok() {
                queued += 1;
            }
        }

        debug!(
            topic = %delta.topic,
            version = delta.version,
            subscribers = queued,
            "Notification queued"
        );
        queued
    }

    /// Drop workers whose subscription is gone.
    pub fn prune(&self) -> usize {
        let before = self.workers.len();
        self.workers.retain(|_, worker| worker.is_live());
        before - self.workers.len()
    }

    /// Number of live delivery workers.
    pub fn worker_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_live()).count()
    }

    fn spawn_worker(&self, subscriber: &ActiveSubscription) -> Worker {
        let (sender, receiver) = mpsc::unbounded_channel();
        let delivery = subscriber.delivery.clone();
        let context = DeliveryContext {
            transport: Arc::clone(&self.transport),
            policy: self.config.retry_policy(),
            timeout: self.config.timeout,
            algorithm: self.config.signature_algorithm,
            key: subscriber.key.clone(),
            delivery: delivery.clone(),
        };
        tokio::spawn(context.run(receiver));
        Worker { sender, delivery }
    }
}

struct DeliveryContext {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
    timeout: Duration,
    algorithm: SignatureAlgorithm,
    key: SubscriptionKey,
    delivery: CancellationToken,
}

impl DeliveryContext {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<Job>) {
        loop {
            let job = tokio::select! {
                _ = self.delivery.cancelled() => break,
                job = receiver.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            if !self.deliver(job).await {
                break;
            }
        }
        debug!(subscription = %self.key, "Delivery worker stopped");
    }

    /// Deliver one notification. Returns `false` when cancelled.
    async fn deliver(&self, job: Job) -> bool {
        let mut attempt = NotificationAttempt::new(self.key.clone(), job.notification.version);

        let signature = match &job.secret {
            Some(secret) => match sign_body(self.algorithm, secret, &job.notification.body) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(subscription = %self.key, error = %e, "Could not sign notification");
                    None
                }
            },
            None => None,
        };

        loop {
            let mut request =
                OutboundRequest::post(self.key.callback.url().clone(), job.notification.body.clone())
                    .with_header("Content-Type", ATOM_CONTENT_TYPE)
                    .with_timeout(self.timeout);
            if let Some(signature) = &signature {
                request = request.with_header(SIGNATURE_HEADER, signature.clone());
            }

            let result = tokio::select! {
                _ = self.delivery.cancelled() => return false,
                result = self.transport.send(request) => result,
            };

            let failure = match result {
                Ok(response) if response.is_success() => None,
                Ok(response) => Some(format!("HTTP {}", response.status)),
                Err(e) => Some(e.to_string()),
            };

            let Some(reason) = failure else {
                attempt.record_success();
                info!(
                    subscription = %self.key,
                    version = attempt.delta_version,
                    attempts = attempt.attempts,
                    "Notification delivered"
                );
                return true;
            };

            let delay = self
                .policy
                .next_delay(attempt.attempts + 1)
                .unwrap_or(Duration::from_secs(1));
            attempt.record_failure(delay);
            warn!(
                subscription = %self.key,
                version = attempt.delta_version,
                attempt = attempt.attempts,
                %reason,
                retry_in = ?delay,
                "Notification delivery failed"
            );

            tokio::select! {
                _ = self.delivery.cancelled() => return false,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
