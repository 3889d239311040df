//! # Retry Policies
//!
//! Verification retries are bounded; deliveries are not.

use std::time::Duration;

/// Schedule for repeated attempts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RetryPolicy {
    /// Same interval every time, at most `max_attempts` attempts in total.
    Fixed {
        /// Delay between attempts.
        interval: Duration,
        /// Total attempts, including the first.
        max_attempts: u32,
    },
    /// Growing delay, never gives up.
    Exponential {
        /// Delay after the first failure.
        initial: Duration,
        /// Growth factor per failure.
        multiplier: f64,
        /// Upper bound on any single delay.
        max: Duration,
    },
}

impl RetryPolicy {
    /// Delay before the next attempt after `failures` failed attempts, or
    /// `None` when the policy is exhausted.
    pub fn next_delay(&self, failures: u32) -> Option<Duration> {
        match *self {
            RetryPolicy::Fixed {
                interval,
                max_attempts,
            } => (failures < max_attempts).then_some(interval),
            RetryPolicy::Exponential {
                initial,
                multiplier,
                max,
            } => {
                let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = initial.as_secs_f64() * multiplier.max(1.0).powi(exponent);
                let capped = secs.min(max.as_secs_f64());
                Some(Duration::from_secs_f64(capped.max(0.0)))
            }
        }
    }

    /// Whether this policy ever stops retrying.
    pub fn is_bounded(&self) -> bool {
        matches!(self, RetryPolicy::Fixed { .. })
    }
}
