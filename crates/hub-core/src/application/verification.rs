//! # Verification Engine
//!
//! Drives the challenge/response handshake against a subscriber callback.
//! Sync mode makes exactly one attempt; async mode retries on a fixed
//! schedule until the pending change is committed, rejected, exhausted or
//! superseded.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::algorithms::{build_verification_url, VerificationParams};
use crate::config::VerificationConfig;
use crate::domain::{Challenge, HubError, Transition, VerificationAttempt, VerifyMode};
use crate::ports::outbound::{HttpTransport, OutboundRequest, TimeSource};
use crate::store::{ChangeTicket, SubscriptionStore};

/// Result of one verification GET.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// 2xx with the challenge echoed exactly.
    Verified,
    /// 404: the subscriber does not want this. Never retried.
    Rejected,
    /// Anything else; async mode may try again.
    Failed(String),
}

/// Verification engine.
pub struct VerificationEngine {
    transport: Arc<dyn HttpTransport>,
    store: Arc<SubscriptionStore>,
    time: Arc<dyn TimeSource>,
    config: VerificationConfig,
}

impl VerificationEngine {
    /// Create an engine.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Arc<SubscriptionStore>,
        time: Arc<dyn TimeSource>,
        config: VerificationConfig,
    ) -> Self {
        Self {
            transport,
            store,
            time,
            config,
        }
    }

    /// One GET with a fresh challenge.
    pub async fn attempt(
        &self,
        ticket: &ChangeTicket,
        attempt: &mut VerificationAttempt,
    ) -> VerificationOutcome {
        attempt.challenge = Challenge::generate(self.config.challenge_length);
        attempt.attempts += 1;

        let url = build_verification_url(
            &ticket.key.callback,
            &VerificationParams {
                mode: ticket.mode,
                topic: &ticket.key.topic,
                challenge: &attempt.challenge,
                verify_token: ticket.verify_token.as_deref(),
                lease_seconds: ticket.lease.map(|lease| lease.as_secs()),
            },
        );
        let request = OutboundRequest::get(url).with_timeout(self.config.timeout);

        let sent = tokio::time::timeout(self.config.timeout, self.transport.send(request)).await;
        let outcome = match sent {
            Err(_) => VerificationOutcome::Failed("callback did not answer in time".to_string()),
            Ok(Err(e)) => VerificationOutcome::Failed(e.to_string()),
            Ok(Ok(response)) if response.status == 404 => VerificationOutcome::Rejected,
            Ok(Ok(response)) if !response.is_success() => {
                VerificationOutcome::Failed(format!("callback answered HTTP {}", response.status))
            }
            Ok(Ok(response)) if attempt.challenge.matches(&response.body) => {
                VerificationOutcome::Verified
            }
            Ok(Ok(_)) => VerificationOutcome::Failed("challenge not echoed".to_string()),
        };

        debug!(
            subscription = %ticket.key,
            mode = %ticket.mode,
            attempt = attempt.attempts,
            outcome = ?outcome,
            "Verification attempt"
        );
        outcome
    }

    /// Verify before answering the subscriber.
    ///
    /// Exactly one attempt. Success commits the pending change; any failure
    /// drops it and surfaces as a client error. The round-trip runs on its
    /// own task, so the pending change is settled even if the caller goes
    /// away mid-flight.
    pub async fn verify_sync(
        self: &Arc<Self>,
        ticket: ChangeTicket,
    ) -> Result<Transition, HubError> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run_sync(ticket).await })
            .await
            .map_err(|e| HubError::Internal(format!("verification task failed: {}", e)))?
    }

    async fn run_sync(&self, ticket: ChangeTicket) -> Result<Transition, HubError> {
        let mut attempt = VerificationAttempt::new(
            ticket.key.clone(),
            VerifyMode::Sync,
            Challenge::generate(self.config.challenge_length),
        );

        let outcome = tokio::select! {
            _ = ticket.cancel.cancelled() => {
                return Err(HubError::VerificationFailed(
                    "superseded by a newer request".to_string(),
                ));
            }
            outcome = self.attempt(&ticket, &mut attempt) => outcome,
        };
        attempt.terminal = true;

        let verified = outcome == VerificationOutcome::Verified;
        let transition = self.store.complete_change(&ticket, verified, self.time.now());

        match outcome {
            VerificationOutcome::Verified => {
                info!(subscription = %ticket.key, mode = %ticket.mode, ?transition, "Verified");
                Ok(transition)
            }
            VerificationOutcome::Rejected => {
                info!(subscription = %ticket.key, mode = %ticket.mode, "Callback refused verification");
                Err(HubError::VerificationRejected)
            }
            VerificationOutcome::Failed(reason) => {
                info!(subscription = %ticket.key, mode = %ticket.mode, %reason, "Verification failed");
                Err(HubError::VerificationFailed(reason))
            }
        }
    }

    /// Verify in the background.
    ///
    /// Retries every `retry_interval` (or the per-request override) up to
    /// `max_attempts`. 404 and exhaustion drop the pending change. A newer
    /// request for the same subscription cancels the loop.
    pub fn spawn_async(
        self: &Arc<Self>,
        ticket: ChangeTicket,
        retry_override: Option<Duration>,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run_async(ticket, retry_override).await })
    }

    async fn run_async(&self, ticket: ChangeTicket, retry_override: Option<Duration>) {
        let policy = self.config.retry_policy(retry_override);
        let mut attempt = VerificationAttempt::new(
            ticket.key.clone(),
            VerifyMode::Async,
            Challenge::generate(self.config.challenge_length),
        );

        loop {
            let outcome = tokio::select! {
                _ = ticket.cancel.cancelled() => {
                    debug!(subscription = %ticket.key, "Async verification superseded");
                    return;
                }
                outcome = self.attempt(&ticket, &mut attempt) => outcome,
            };

            match outcome {
                VerificationOutcome::Verified => {
                    attempt.terminal = true;
                    let transition = self.store.complete_change(&ticket, true, self.time.now());
                    info!(
                        subscription = %ticket.key,
                        mode = %ticket.mode,
                        attempts = attempt.attempts,
                        ?transition,
                        "Verified"
                    );
                    return;
                }
                VerificationOutcome::Rejected => {
                    attempt.terminal = true;
                    self.store.complete_change(&ticket, false, self.time.now());
                    info!(subscription = %ticket.key, mode = %ticket.mode, "Callback refused verification");
                    return;
                }
                VerificationOutcome::Failed(reason) => match policy.next_delay(attempt.attempts) {
                    Some(delay) => {
                        debug!(
                            subscription = %ticket.key,
                            attempt = attempt.attempts,
                            %reason,
                            retry_in = ?delay,
                            "Verification failed, will retry"
                        );
                        tokio::select! {
                            _ = ticket.cancel.cancelled() => return,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    None => {
                        attempt.terminal = true;
                        self.store.complete_change(&ticket, false, self.time.now());
                        warn!(
                            subscription = %ticket.key,
                            attempts = attempt.attempts,
                            %reason,
                            "Verification abandoned"
                        );
                        return;
                    }
                },
            }
        }
    }
}
