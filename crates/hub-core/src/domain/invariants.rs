//! # Domain Invariants
//!
//! Rules the subscription store and request handler must never break.

use super::entities::SubscriptionStatus;
use super::errors::HubError;
use super::value_objects::Secret;

/// Default upper bound on `hub.secret`, in bytes.
pub const DEFAULT_MAX_SECRET_BYTES: usize = 200;

/// Default length of generated challenges.
pub const DEFAULT_CHALLENGE_LENGTH: usize = 32;

/// Content type of every notification body.
pub const ATOM_CONTENT_TYPE: &str = "application/atom+xml";

/// Invariant: status moves only along
/// `none → pendingVerification → {subscribed, none}` and
/// `subscribed → pendingVerification → {subscribed, none}`.
///
/// A record can never become `subscribed` without passing through
/// `pendingVerification`.
pub fn invariant_valid_transition(from: SubscriptionStatus, to: SubscriptionStatus) -> bool {
    use SubscriptionStatus::*;
    match (from, to) {
        (a, b) if a == b => true,
        (None, PendingVerification) | (Subscribed, PendingVerification) => true,
        (PendingVerification, Subscribed) | (PendingVerification, None) => true,
        // Lease expiry and verified unsubscribe both remove an active record.
        (Subscribed, None) => true,
        _ => false,
    }
}

/// Invariant: a callback holds at most one secret.
///
/// A request without a secret never conflicts; neither does re-sending the
/// same secret.
pub fn invariant_secret_compatible(
    held: Option<&Secret>,
    requested: Option<&Secret>,
) -> Result<(), HubError> {
    match (held, requested) {
        (Some(held), Some(requested)) if held != requested => Err(HubError::SecretConflict),
        _ => Ok(()),
    }
}

/// Invariant: secrets stay below the configured size.
pub fn invariant_secret_length(secret: &str, max: usize) -> Result<(), HubError> {
    if secret.len() >= max {
        return Err(HubError::InvalidSecret { max });
    }
    Ok(())
}
