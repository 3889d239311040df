//! Test fixtures: an in-process hub plus mock subscriber and publisher
//! servers, all on ephemeral localhost ports.

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use hub_core::HubConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    (listener, base)
}

fn spawn_router(listener: TcpListener, router: Router, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let _ = axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
    });
}

/// Poll `check` every 50ms until it holds or `limit` passes.
pub async fn wait_until<F>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Like [`wait_until`] for async checks.
pub async fn wait_until_async<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

// =============================================================================
// HUB
// =============================================================================

/// A running hub.
pub struct TestHub {
    /// Hub endpoint (`http://127.0.0.1:port/`).
    pub url: String,
    client: reqwest::Client,
    shutdown: CancellationToken,
    _task: JoinHandle<anyhow::Result<()>>,
}

impl TestHub {
    /// Hub with [`HubConfig::for_testing`].
    pub async fn start() -> Self {
        Self::start_with(HubConfig::for_testing()).await
    }

    /// Hub with an explicit configuration.
    pub async fn start_with(config: HubConfig) -> Self {
        let (listener, base) = bind().await;
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(hub_node::run(config, listener, shutdown.clone()));
        Self {
            url: format!("{}/", base),
            client: reqwest::Client::new(),
            shutdown,
            _task: task,
        }
    }

    /// POST a form to the hub endpoint.
    pub async fn post_form(&self, fields: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(&self.url)
            .form(fields)
            .send()
            .await
            .unwrap()
    }

    /// Subscribe `callback` to `topic` with the given verification mode.
    pub async fn subscribe(&self, topic: &str, callback: &str, verify: &str) -> reqwest::Response {
        self.post_form(&[
            ("hub.mode", "subscribe"),
            ("hub.topic", topic),
            ("hub.callback", callback),
            ("hub.verify", verify),
        ])
        .await
    }

    /// Ping the hub about `topic`.
    pub async fn publish(&self, topic: &str) -> reqwest::Response {
        self.post_form(&[("hub.mode", "publish"), ("hub.url", topic)])
            .await
    }

    /// Diagnostic status of a pair.
    pub async fn status(&self, topic: &str, callback: &str) -> String {
        self.client
            .get(&self.url)
            .query(&[
                ("hub.mode", "status"),
                ("hub.topic", topic),
                ("hub.callback", callback),
            ])
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap()
    }

    /// Raw client for unusual requests.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Drop for TestHub {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// =============================================================================
// SUBSCRIBER
// =============================================================================

/// How the mock subscriber answers verification requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyBehavior {
    /// Echo `hub.challenge` with 200.
    Echo,
    /// 200 with a body that is not the challenge.
    WrongChallenge,
    /// 404 Not Found.
    NotFound,
    /// 500 Internal Server Error.
    ServerError,
}

/// A verification GET the subscriber received.
#[derive(Clone, Debug)]
pub struct ReceivedVerification {
    /// Request path.
    pub path: String,
    /// Raw query string.
    pub raw_query: String,
    /// Decoded query pairs (last value wins for repeated keys).
    pub params: HashMap<String, String>,
}

/// A notification POST the subscriber received.
#[derive(Clone, Debug)]
pub struct ReceivedNotification {
    /// Request path.
    pub path: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Body as text.
    pub body: String,
}

struct SubscriberState {
    verify: Mutex<VerifyBehavior>,
    notify_status: Mutex<StatusCode>,
    verifications: Mutex<Vec<ReceivedVerification>>,
    notifications: Mutex<Vec<ReceivedNotification>>,
}

/// Mock subscriber.
pub struct MockSubscriber {
    base: String,
    state: Arc<SubscriberState>,
    shutdown: CancellationToken,
}

impl MockSubscriber {
    /// Start a subscriber that echoes challenges and accepts notifications.
    pub async fn start() -> Self {
        let (listener, base) = bind().await;
        let state = Arc::new(SubscriberState {
            verify: Mutex::new(VerifyBehavior::Echo),
            notify_status: Mutex::new(StatusCode::NO_CONTENT),
            verifications: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
        });
        let shutdown = CancellationToken::new();

        let handler_state = Arc::clone(&state);
        let router = Router::new().fallback(move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
            let state = Arc::clone(&handler_state);
            async move { subscriber_endpoint(state, method, uri, headers, body) }
        });
        spawn_router(listener, router, shutdown.clone());

        Self {
            base,
            state,
            shutdown,
        }
    }

    /// Callback URL for `path` (e.g. `/cb?x=y`).
    pub fn callback(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Change verification answers.
    pub fn set_verify(&self, behavior: VerifyBehavior) {
        *self.state.verify.lock() = behavior;
    }

    /// Change notification answers.
    pub fn set_notify_status(&self, status: StatusCode) {
        *self.state.notify_status.lock() = status;
    }

    /// Verification requests so far.
    pub fn verifications(&self) -> Vec<ReceivedVerification> {
        self.state.verifications.lock().clone()
    }

    /// Notifications so far.
    pub fn notifications(&self) -> Vec<ReceivedNotification> {
        self.state.notifications.lock().clone()
    }

    /// Notifications delivered to `path`.
    pub fn notifications_to(&self, path: &str) -> Vec<ReceivedNotification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.path == path)
            .collect()
    }
}

impl Drop for MockSubscriber {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn subscriber_endpoint(
    state: Arc<SubscriberState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    match method {
        Method::GET => {
            let raw_query = uri.query().unwrap_or_default().to_string();
            let pairs: Vec<(String, String)> = url::form_urlencoded::parse(raw_query.as_bytes())
                .into_owned()
                .collect();
            // The hub appends its own challenge after any the callback carries.
            let challenge = pairs
                .iter()
                .rev()
                .find(|(k, _)| k == "hub.challenge")
                .map(|(_, v)| v.clone())
                .unwrap_or_default();
            let params: HashMap<String, String> = pairs.into_iter().collect();
            state.verifications.lock().push(ReceivedVerification {
                path,
                raw_query,
                params,
            });
            match *state.verify.lock() {
                VerifyBehavior::Echo => (StatusCode::OK, challenge).into_response(),
                VerifyBehavior::WrongChallenge => (StatusCode::OK, "nope").into_response(),
                VerifyBehavior::NotFound => StatusCode::NOT_FOUND.into_response(),
                VerifyBehavior::ServerError => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            }
        }
        Method::POST => {
            state.notifications.lock().push(ReceivedNotification {
                path,
                headers,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
            (*state.notify_status.lock()).into_response()
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

// =============================================================================
// PUBLISHER
// =============================================================================

/// A topic fetch the publisher served.
#[derive(Clone, Debug)]
pub struct ReceivedFetch {
    /// Request path.
    pub path: String,
    /// `X-Hub-Subscribers`, if sent.
    pub subscribers: Option<String>,
}

struct PublisherState {
    feeds: Mutex<HashMap<String, String>>,
    fetches: Mutex<Vec<ReceivedFetch>>,
}

/// Mock publisher serving Atom feeds.
pub struct MockPublisher {
    base: String,
    state: Arc<PublisherState>,
    shutdown: CancellationToken,
}

impl MockPublisher {
    /// Start a publisher with no feeds.
    pub async fn start() -> Self {
        let (listener, base) = bind().await;
        let state = Arc::new(PublisherState {
            feeds: Mutex::new(HashMap::new()),
            fetches: Mutex::new(Vec::new()),
        });
        let shutdown = CancellationToken::new();

        let handler_state = Arc::clone(&state);
        let router = Router::new().fallback(move |uri: Uri, headers: HeaderMap| {
            let state = Arc::clone(&handler_state);
            async move { publisher_endpoint(state, uri, headers) }
        });
        spawn_router(listener, router, shutdown.clone());

        Self {
            base,
            state,
            shutdown,
        }
    }

    /// Topic URL for `path`.
    pub fn topic(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Serve `document` at `path`.
    pub fn set_feed(&self, path: &str, document: String) {
        self.state.feeds.lock().insert(path.to_string(), document);
    }

    /// Fetches so far.
    pub fn fetches(&self) -> Vec<ReceivedFetch> {
        self.state.fetches.lock().clone()
    }
}

impl Drop for MockPublisher {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn publisher_endpoint(state: Arc<PublisherState>, uri: Uri, headers: HeaderMap) -> Response {
    let path = uri.path().to_string();
    state.fetches.lock().push(ReceivedFetch {
        path: path.clone(),
        subscribers: headers
            .get("X-Hub-Subscribers")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });
    match state.feeds.lock().get(&path) {
        Some(document) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/atom+xml")],
            document.clone(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Atom document with `(id, updated, title)` entries.
pub fn atom_feed(feed_id: &str, entries: &[(&str, &str, &str)]) -> String {
    let mut doc = format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<feed xmlns=\"http://www.w3.org/2005/Atom\">\n<id>{}</id>\n<title>Test feed</title>\n<updated>2024-01-01T00:00:00Z</updated>\n",
        feed_id
    );
    for (id, updated, title) in entries {
        doc.push_str(&format!(
            "<entry>\n<id>{}</id>\n<title>{}</title>\n<updated>{}</updated>\n<content>body of {}</content>\n</entry>\n",
            id, title, updated, title
        ));
    }
    doc.push_str("</feed>\n");
    doc
}
