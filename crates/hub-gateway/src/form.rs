//! `application/x-www-form-urlencoded` decoding.
//!
//! Hub forms repeat keys (`hub.verify`, `hub.url`), so fields are kept as an
//! ordered list of pairs rather than a map.

use axum::http::{header, HeaderMap};
use hub_core::{HubError, PublishRequest, SubscriptionRequest};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Decoded form fields in submission order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormFields {
    pairs: Vec<(String, String)>,
}

impl FormFields {
    /// Decode a urlencoded body or query string.
    pub fn parse(input: &[u8]) -> Self {
        Self {
            pairs: url::form_urlencoded::parse(input).into_owned().collect(),
        }
    }

    /// First value of `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Every value of `name`.
    pub fn all(&self, name: &str) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .collect()
    }

    fn owned(&self, name: &str) -> Option<String> {
        self.first(name).map(str::to_string)
    }

    /// Subscribe/unsubscribe form.
    pub fn subscription_request(&self) -> SubscriptionRequest {
        SubscriptionRequest {
            mode: self.owned("hub.mode"),
            callback: self.owned("hub.callback"),
            topic: self.owned("hub.topic"),
            verify: self.all("hub.verify"),
            verify_token: self.owned("hub.verify_token"),
            secret: self.owned("hub.secret"),
            lease_seconds: self.owned("hub.lease_seconds"),
            debug_retry_after: self.owned("hub.debug.retry_after"),
        }
    }

    /// Publish form.
    pub fn publish_request(&self) -> PublishRequest {
        PublishRequest {
            urls: self.all("hub.url"),
        }
    }
}

/// Reject bodies that are not urlencoded forms. Parameters such as
/// `charset` are allowed.
pub fn require_form(headers: &HeaderMap) -> Result<(), HubError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case(FORM_CONTENT_TYPE) {
        Ok(())
    } else {
        Err(HubError::UnsupportedMediaType)
    }
}
