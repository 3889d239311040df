//! # Value Objects
//!
//! Immutable protocol values: URLs, modes, subscription keys, challenges.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use super::errors::HubError;

/// An absolute `http(s)` URL as submitted by a client.
///
/// The raw string is kept verbatim: it is what identifies the subscription
/// and what the hub echoes back in `hub.topic`. The parsed form is used only
/// to issue requests.
#[derive(Clone, Debug)]
pub struct HubUrl {
    raw: String,
    parsed: Url,
}

impl HubUrl {
    /// Parse a client-supplied URL for the given form field.
    ///
    /// Rejects relative URLs, non-HTTP schemes and URLs carrying a fragment.
    pub fn parse(field: &'static str, raw: &str) -> Result<Self, HubError> {
        let parsed = Url::parse(raw).map_err(|_| HubError::InvalidUrl { field })?;

        if !matches!(parsed.scheme(), "http" | "https") || !parsed.has_host() {
            return Err(HubError::InvalidUrl { field });
        }
        if parsed.fragment().is_some() || raw.contains('#') {
            return Err(HubError::FragmentInUrl { field });
        }

        Ok(Self {
            raw: raw.to_string(),
            parsed,
        })
    }

    /// The URL exactly as the client sent it.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed form for issuing requests.
    pub fn url(&self) -> &Url {
        &self.parsed
    }
}

impl PartialEq for HubUrl {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for HubUrl {}

impl std::hash::Hash for HubUrl {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Display for HubUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Identity of a subscription record: `(topic, callback)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    /// Topic URL.
    pub topic: HubUrl,
    /// Subscriber callback URL.
    pub callback: HubUrl,
}

impl SubscriptionKey {
    /// Create a key.
    pub fn new(topic: HubUrl, callback: HubUrl) -> Self {
        Self { topic, callback }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.topic, self.callback)
    }
}

/// Subscriber intent carried by `hub.mode`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Start (or renew) a subscription.
    Subscribe,
    /// End a subscription.
    Unsubscribe,
}

impl Mode {
    /// Parse the wire value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "subscribe" => Some(Mode::Subscribe),
            "unsubscribe" => Some(Mode::Unsubscribe),
            _ => None,
        }
    }

    /// Wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Subscribe => "subscribe",
            Mode::Unsubscribe => "unsubscribe",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verification style requested through `hub.verify`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyMode {
    /// Verify before answering the subscriber.
    Sync,
    /// Answer 202 and verify in the background.
    Async,
}

impl VerifyMode {
    /// Pick the first keyword the hub understands. Unknown keywords are skipped.
    pub fn select<S: AsRef<str>>(keywords: &[S]) -> Option<Self> {
        keywords.iter().find_map(|k| match k.as_ref() {
            "sync" => Some(VerifyMode::Sync),
            "async" => Some(VerifyMode::Async),
            _ => None,
        })
    }
}

/// Opaque token the callback must echo back verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenge(String);

impl Challenge {
    /// Generate a fresh random alphanumeric challenge.
    pub fn generate(length: usize) -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length.max(1))
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Challenge value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Byte-for-byte comparison against a callback response body.
    pub fn matches(&self, body: &[u8]) -> bool {
        self.0.as_bytes() == body
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subscriber-provided HMAC key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Key bytes for signing.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}
