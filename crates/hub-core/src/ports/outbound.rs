//! # Outbound Ports
//!
//! Dependencies the engine talks to: the HTTP client used for callbacks and
//! topics, the feed parser, and the clock.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::domain::{FeedError, ParsedFeed, TransportError};

/// HTTP method used by the hub for outbound calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    /// Verification and topic fetches.
    Get,
    /// Notification delivery.
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

/// A request the engine wants sent.
#[derive(Clone, Debug)]
pub struct OutboundRequest {
    /// Method.
    pub method: HttpMethod,
    /// Fully built target URL.
    pub url: Url,
    /// Extra headers, in order.
    pub headers: Vec<(String, String)>,
    /// Body (empty for GET).
    pub body: Bytes,
    /// Per-request deadline; the transport default applies when unset.
    pub timeout: Option<Duration>,
}

impl OutboundRequest {
    /// Bodiless GET.
    pub fn get(url: Url) -> Self {
        Self {
            method: HttpMethod::Get,
            url,
            headers: Vec::new(),
            body: Bytes::new(),
            timeout: None,
        }
    }

    /// POST with a body.
    pub fn post(url: Url, body: impl Into<Bytes>) -> Self {
        Self {
            method: HttpMethod::Post,
            url,
            headers: Vec::new(),
            body: body.into(),
            timeout: None,
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// First value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// Last value of a query parameter.
    pub fn last_query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .filter(|(k, _)| k == name)
            .last()
            .map(|(_, v)| v.into_owned())
    }
}

/// Structured answer from a remote endpoint.
#[derive(Clone, Debug, Default)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Raw body.
    pub body: Bytes,
}

impl TransportResponse {
    /// Response with a status and no body.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Response with a status and a body.
    pub fn with_body(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client - outbound port.
///
/// Implementations never interpret the status; they only fail for transport
/// problems (connect, timeout, unreadable body).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send one request and return whatever the remote answered.
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError>;
}

/// Feed parser - outbound port.
pub trait FeedParser: Send + Sync {
    /// Split a feed document into its header and byte-exact entries.
    fn parse(&self, body: &[u8]) -> Result<ParsedFeed, FeedError>;
}

/// Wall clock - outbound port. Leases and snapshots are timestamped with it.
pub trait TimeSource: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// System time implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

type Responder =
    Box<dyn Fn(&OutboundRequest) -> Result<TransportResponse, TransportError> + Send + Sync>;

/// Scripted transport for testing.
///
/// Queued responses are consumed first, in order; after that the responder
/// decides. Every request is recorded.
pub struct MockTransport {
    queue: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    responder: Mutex<Responder>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl MockTransport {
    /// Transport answering `200` with an empty body to everything.
    pub fn new() -> Self {
        Self::with_responder(|_| Ok(TransportResponse::status(200)))
    }

    /// Transport answering through a closure.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&OutboundRequest) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: Mutex::new(Box::new(responder)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Subscriber that echoes `hub.challenge` on GET and accepts every POST.
    pub fn echoing_subscriber() -> Self {
        Self::with_responder(echo_challenge)
    }

    /// Queue a one-shot answer.
    pub fn push_response(&self, response: Result<TransportResponse, TransportError>) {
        self.queue.lock().push_back(response);
    }

    /// Replace the responder.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&OutboundRequest) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        *self.responder.lock() = Box::new(responder);
    }

    /// Every request seen so far.
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().clone()
    }

    /// Requests whose URL starts with `prefix`.
    pub fn requests_to(&self, prefix: &str) -> Vec<OutboundRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.as_str().starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Responder used by [`MockTransport::echoing_subscriber`].
///
/// Echoes the last `hub.challenge`, which is the one the hub appended.
pub fn echo_challenge(request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
    match (request.method, request.last_query_param("hub.challenge")) {
        (HttpMethod::Get, Some(challenge)) => Ok(TransportResponse::with_body(200, challenge)),
        _ => Ok(TransportResponse::status(200)),
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push(request.clone());
        if let Some(queued) = self.queue.lock().pop_front() {
            return queued;
        }
        let responder = self.responder.lock();
        (*responder)(&request)
    }
}

/// Fixed clock for testing.
#[derive(Debug)]
pub struct MockTimeSource {
    now: Mutex<DateTime<Utc>>,
}

impl MockTimeSource {
    /// Clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock() += by;
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
