//! # Subscription Request Handler
//!
//! Validates subscribe/unsubscribe forms, installs the pending change and
//! hands it to the verification engine.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::HubConfig;
use crate::domain::{
    invariant_secret_length, HubError, HubUrl, Mode, Secret, SubscriptionKey, VerifyMode,
};
use crate::ports::inbound::{SubscribeOutcome, SubscriptionRequest};
use crate::store::{ChangeRequest, SubscriptionStore};

use super::verification::VerificationEngine;

/// A subscription form that passed validation.
#[derive(Clone, Debug)]
pub struct ValidatedSubscription {
    /// Target record.
    pub key: SubscriptionKey,
    /// Intent.
    pub mode: Mode,
    /// Verification style.
    pub verify: VerifyMode,
    /// Token to echo.
    pub verify_token: Option<String>,
    /// Secret to install.
    pub secret: Option<Secret>,
    /// Granted lease (subscribe only).
    pub lease: Option<Duration>,
    /// `hub.debug.retry_after`, when honoured.
    pub retry_override: Option<Duration>,
}

fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, HubError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(HubError::MissingField { field }),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Subscription request handler.
pub struct SubscriptionRequestHandler {
    store: Arc<SubscriptionStore>,
    engine: Arc<VerificationEngine>,
    config: HubConfig,
}

impl SubscriptionRequestHandler {
    /// Create a handler.
    pub fn new(
        store: Arc<SubscriptionStore>,
        engine: Arc<VerificationEngine>,
        config: HubConfig,
    ) -> Self {
        Self {
            store,
            engine,
            config,
        }
    }

    /// Check the form in field order: mode, callback, topic, verify, secret,
    /// lease. The first failure wins.
    pub fn validate(&self, request: &SubscriptionRequest) -> Result<ValidatedSubscription, HubError> {
        let mode_raw = required("hub.mode", &request.mode)?;
        let mode = Mode::parse(mode_raw).ok_or_else(|| HubError::InvalidMode(mode_raw.to_string()))?;

        let callback = HubUrl::parse("hub.callback", required("hub.callback", &request.callback)?)?;
        let topic = HubUrl::parse("hub.topic", required("hub.topic", &request.topic)?)?;

        if request.verify.iter().all(|v| v.is_empty()) {
            return Err(HubError::MissingField { field: "hub.verify" });
        }
        let verify = VerifyMode::select(&request.verify).ok_or(HubError::InvalidVerifyMode)?;

        let secret = match non_empty(&request.secret) {
            Some(value) => {
                invariant_secret_length(value, self.config.limits.max_secret_bytes)?;
                Some(Secret::new(value))
            }
            None => None,
        };

        let requested_lease = match non_empty(&request.lease_seconds) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(secs),
                _ => return Err(HubError::InvalidLease(raw.to_string())),
            },
            None => None,
        };
        let lease = match mode {
            Mode::Subscribe => self.config.lease.grant(requested_lease),
            Mode::Unsubscribe => None,
        };

        let retry_override = if self.config.verification.allow_debug_retry_override {
            non_empty(&request.debug_retry_after).and_then(|raw| match raw.trim().parse::<u64>() {
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    debug!(value = raw, "Ignoring unparseable hub.debug.retry_after");
                    None
                }
            })
        } else {
            None
        };

        Ok(ValidatedSubscription {
            key: SubscriptionKey::new(topic, callback),
            mode,
            verify,
            verify_token: non_empty(&request.verify_token).map(str::to_string),
            secret,
            lease,
            retry_override,
        })
    }

    /// Validate, install the pending change, verify.
    ///
    /// Sync requests return after the round-trip; async requests return
    /// [`SubscribeOutcome::Accepted`] as soon as verification is scheduled.
    pub async fn handle(&self, request: SubscriptionRequest) -> Result<SubscribeOutcome, HubError> {
        let validated = self.validate(&request)?;
        let ticket = self.store.begin_change(ChangeRequest {
            key: validated.key.clone(),
            mode: validated.mode,
            verify_token: validated.verify_token,
            secret: validated.secret,
            lease: validated.lease,
        })?;

        info!(
            subscription = %validated.key,
            mode = %validated.mode,
            verify = ?validated.verify,
            generation = ticket.generation,
            "Subscription request accepted"
        );

        match validated.verify {
            VerifyMode::Sync => {
                self.engine.verify_sync(ticket).await?;
                Ok(SubscribeOutcome::Verified)
            }
            VerifyMode::Async => {
                self.engine.spawn_async(ticket, validated.retry_override);
                Ok(SubscribeOutcome::Accepted)
            }
        }
    }
}
