//! # Hub Configuration
//!
//! Every tunable of the hub in one explicit value passed to constructors.
//! Durations are written as `"30s"`, `"500ms"`, `"5m"`, `"12h"` or `"30d"`.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

use crate::algorithms::{RetryPolicy, SignatureAlgorithm};
use crate::domain::{DEFAULT_CHALLENGE_LENGTH, DEFAULT_MAX_SECRET_BYTES};

/// Main hub configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Inbound HTTP listener.
    pub http: HttpConfig,
    /// Verification handshake.
    pub verification: VerificationConfig,
    /// Notification delivery.
    pub delivery: DeliveryConfig,
    /// Topic fetching.
    pub fetch: FetchConfig,
    /// Subscription leases.
    pub lease: LeaseConfig,
    /// Request limits.
    pub limits: LimitsConfig,
}

impl HubConfig {
    /// Short intervals for tests.
    pub fn for_testing() -> Self {
        Self {
            http: HttpConfig {
                host: IpAddr::V4(Ipv4Addr::LOCALHOST),
                port: 0,
                ..HttpConfig::default()
            },
            verification: VerificationConfig {
                timeout: Duration::from_secs(2),
                retry_interval: Duration::from_secs(1),
                max_attempts: 5,
                ..VerificationConfig::default()
            },
            delivery: DeliveryConfig {
                timeout: Duration::from_secs(2),
                initial_backoff: Duration::from_millis(100),
                max_backoff: Duration::from_secs(1),
                ..DeliveryConfig::default()
            },
            fetch: FetchConfig {
                timeout: Duration::from_secs(2),
                ..FetchConfig::default()
            },
            lease: LeaseConfig {
                sweep_interval: Duration::from_millis(200),
                ..LeaseConfig::default()
            },
            limits: LimitsConfig::default(),
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.max_body_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "http.max_body_bytes cannot be 0".into(),
            ));
        }

        if self.verification.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "verification.timeout cannot be 0".into(),
            ));
        }
        if self.verification.max_attempts == 0 {
            return Err(ConfigError::InvalidRetry(
                "verification.max_attempts cannot be 0".into(),
            ));
        }
        if self.verification.challenge_length < 8 {
            return Err(ConfigError::Invalid(
                "verification.challenge_length must be at least 8".into(),
            ));
        }

        if self.delivery.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "delivery.timeout cannot be 0".into(),
            ));
        }
        if self.delivery.initial_backoff.is_zero() {
            return Err(ConfigError::InvalidRetry(
                "delivery.initial_backoff cannot be 0".into(),
            ));
        }
        if self.delivery.max_backoff < self.delivery.initial_backoff {
            return Err(ConfigError::InvalidRetry(
                "delivery.max_backoff must be >= delivery.initial_backoff".into(),
            ));
        }
        if !(self.delivery.backoff_multiplier >= 1.0) {
            return Err(ConfigError::InvalidRetry(
                "delivery.backoff_multiplier must be >= 1.0".into(),
            ));
        }

        if self.fetch.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "fetch.timeout cannot be 0".into(),
            ));
        }

        if self.lease.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "lease.sweep_interval cannot be 0".into(),
            ));
        }
        if let Some(default) = self.lease.default_lease {
            if default > self.lease.max_lease {
                return Err(ConfigError::Invalid(
                    "lease.default_lease exceeds lease.max_lease".into(),
                ));
            }
        }

        if self.limits.max_secret_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "limits.max_secret_bytes cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Listener address.
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// Inbound HTTP listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address.
    pub host: IpAddr,
    /// Port (default: 8080)
    pub port: u16,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Verification handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Deadline for one verification GET.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Delay between async attempts.
    #[serde(with = "humantime_serde")]
    pub retry_interval: Duration,
    /// Async attempts before the pending change is dropped.
    pub max_attempts: u32,
    /// Length of generated challenges.
    pub challenge_length: usize,
    /// Honour `hub.debug.retry_after`.
    pub allow_debug_retry_override: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry_interval: Duration::from_secs(300),
            max_attempts: 5,
            challenge_length: DEFAULT_CHALLENGE_LENGTH,
            allow_debug_retry_override: true,
        }
    }
}

impl VerificationConfig {
    /// Retry schedule for async verification.
    pub fn retry_policy(&self, interval_override: Option<Duration>) -> RetryPolicy {
        RetryPolicy::Fixed {
            interval: interval_override.unwrap_or(self.retry_interval),
            max_attempts: self.max_attempts,
        }
    }
}

/// Notification delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Deadline for one delivery POST.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Delay after the first failure.
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Cap on any single delay.
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    /// Growth factor per failure.
    pub backoff_multiplier: f64,
    /// HMAC digest for `X-Hub-Signature`.
    pub signature_algorithm: SignatureAlgorithm,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(3600),
            backoff_multiplier: 2.0,
            signature_algorithm: SignatureAlgorithm::Sha1,
        }
    }
}

impl DeliveryConfig {
    /// Retry schedule for deliveries. Never exhausted.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::Exponential {
            initial: self.initial_backoff,
            multiplier: self.backoff_multiplier,
            max: self.max_backoff,
        }
    }
}

/// Topic fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Deadline for one topic GET.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Send `X-Hub-Subscribers`.
    pub send_subscriber_count: bool,
    /// Do not fetch topics nobody is subscribed to.
    pub skip_without_subscribers: bool,
    /// `User-Agent` for every outbound request.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            send_subscriber_count: true,
            skip_without_subscribers: true,
            user_agent: format!("websub-hub/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Subscription leases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    /// Lease granted when the subscriber asks for none (`None` = no expiry).
    #[serde(with = "humantime_serde::option")]
    pub default_lease: Option<Duration>,
    /// Longest lease granted.
    #[serde(with = "humantime_serde")]
    pub max_lease: Duration,
    /// How often expired subscriptions are purged.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            default_lease: None,
            max_lease: Duration::from_secs(30 * 24 * 3600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl LeaseConfig {
    /// Lease to grant for a requested number of seconds.
    pub fn grant(&self, requested_secs: Option<u64>) -> Option<Duration> {
        requested_secs
            .map(Duration::from_secs)
            .or(self.default_lease)
            .map(|lease| lease.min(self.max_lease))
    }
}

/// Request limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// `hub.secret` must be shorter than this.
    pub max_secret_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_secret_bytes: DEFAULT_MAX_SECRET_BYTES,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Invalid retry schedule
    #[error("invalid retry policy: {0}")]
    InvalidRetry(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Duration (de)serialization as `"<n><unit>"` strings.
pub mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize as whole seconds, or milliseconds when sub-second.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(duration))
    }

    /// Deserialize from a duration string.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    /// Render a duration.
    pub fn format_duration(duration: &Duration) -> String {
        if duration.subsec_nanos() == 0 {
            format!("{}s", duration.as_secs())
        } else {
            format!("{}ms", duration.as_millis())
        }
    }

    /// Parse `ms`, `s`, `m`, `h`, `d` suffixes; a bare number is seconds.
    pub fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        let (number, scale_ms): (&str, u64) = if let Some(ms) = s.strip_suffix("ms") {
            (ms, 1)
        } else if let Some(secs) = s.strip_suffix('s') {
            (secs, 1_000)
        } else if let Some(mins) = s.strip_suffix('m') {
            (mins, 60_000)
        } else if let Some(hours) = s.strip_suffix('h') {
            (hours, 3_600_000)
        } else if let Some(days) = s.strip_suffix('d') {
            (days, 86_400_000)
        } else {
            (s, 1_000)
        };
        number
            .trim()
            .parse::<u64>()
            .map_err(|_| "invalid duration format")
            .and_then(|n| n.checked_mul(scale_ms).ok_or("duration too large"))
            .map(Duration::from_millis)
    }

    /// Same encoding for optional durations; absent or `"none"` is `None`.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        /// Serialize an optional duration.
        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => serializer.serialize_str(&super::format_duration(d)),
                None => serializer.serialize_str("none"),
            }
        }

        /// Deserialize an optional duration.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = Option::<String>::deserialize(deserializer)?;
            match s.as_deref().map(str::trim) {
                None | Some("") | Some("none") => Ok(None),
                Some(value) => super::parse_duration(value)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
            }
        }
    }
}
