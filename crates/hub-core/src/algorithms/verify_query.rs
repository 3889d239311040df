//! # Verification Query
//!
//! Builds the GET URL for the challenge handshake.

use url::form_urlencoded;
use url::Url;

use crate::domain::{Challenge, HubUrl, Mode};

/// Parameters the hub adds to a callback for verification.
#[derive(Clone, Debug)]
pub struct VerificationParams<'a> {
    /// Intent being verified.
    pub mode: Mode,
    /// Topic, echoed exactly as submitted.
    pub topic: &'a HubUrl,
    /// Fresh challenge for this attempt.
    pub challenge: &'a Challenge,
    /// Subscriber-supplied token.
    pub verify_token: Option<&'a str>,
    /// Granted lease (subscribe only).
    pub lease_seconds: Option<u64>,
}

/// Query string for a verification GET.
///
/// The callback's existing query is taken from the URL text the subscriber
/// submitted, kept verbatim and placed first. Hub parameters are appended
/// after it, so a same-named parameter already on the callback is never
/// rewritten.
pub fn verification_query(callback: &HubUrl, params: &VerificationParams<'_>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    serializer
        .append_pair("hub.mode", params.mode.as_str())
        .append_pair("hub.topic", params.topic.as_str())
        .append_pair("hub.challenge", params.challenge.as_str());
    if let Some(token) = params.verify_token {
        serializer.append_pair("hub.verify_token", token);
    }
    if let (Mode::Subscribe, Some(lease)) = (params.mode, params.lease_seconds) {
        serializer.append_pair("hub.lease_seconds", &lease.to_string());
    }
    let appended = serializer.finish();

    match raw_query(callback.as_str()) {
        Some(existing) => format!("{}&{}", existing, appended),
        None => appended,
    }
}

/// Request URL for a verification GET.
///
/// Only bytes that cannot appear on the request line are escaped; the
/// callback's own parameters otherwise go out as submitted.
pub fn build_verification_url(callback: &HubUrl, params: &VerificationParams<'_>) -> Url {
    let mut url = callback.url().clone();
    url.set_query(Some(&verification_query(callback, params)));
    url
}

fn raw_query(raw: &str) -> Option<&str> {
    raw.split_once('?')
        .map(|(_, query)| query)
        .filter(|query| !query.is_empty())
}
