//! # Domain Errors
//!
//! Error taxonomy for the hub. Every variant that reaches a client carries
//! the name of the offending form field so the plain-text body can say what
//! was wrong.

use thiserror::Error;

/// Hub error types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HubError {
    /// A required form field was absent or empty.
    #[error("{field}: required parameter is missing")]
    MissingField {
        /// Form field name (e.g. `hub.callback`).
        field: &'static str,
    },

    /// `hub.mode` is not one the endpoint understands.
    #[error("hub.mode: unsupported mode '{0}'")]
    InvalidMode(String),

    /// None of the `hub.verify` keywords is `sync` or `async`.
    #[error("hub.verify: no supported verification mode (expected 'sync' or 'async')")]
    InvalidVerifyMode,

    /// Field is not an absolute http(s) URL.
    #[error("{field}: invalid URL")]
    InvalidUrl {
        /// Form field name.
        field: &'static str,
    },

    /// Topic or callback URL carries a fragment.
    #[error("{field}: URL must not contain a fragment")]
    FragmentInUrl {
        /// Form field name.
        field: &'static str,
    },

    /// `hub.secret` exceeds the configured size limit.
    #[error("hub.secret: secret must be shorter than {max} bytes")]
    InvalidSecret {
        /// Maximum accepted length in bytes.
        max: usize,
    },

    /// `hub.lease_seconds` is not a positive integer.
    #[error("hub.lease_seconds: invalid lease '{0}'")]
    InvalidLease(String),

    /// A different secret is already held (or pending) for this callback.
    #[error("hub.secret: callback already registered with a different secret")]
    SecretConflict,

    /// Callback answered with a non-2xx status or a body that is not the challenge.
    #[error("hub.callback: verification failed ({0})")]
    VerificationFailed(String),

    /// Callback answered 404; terminal, never retried.
    #[error("hub.callback: subscriber refused the request (404 Not Found)")]
    VerificationRejected,

    /// Network failure reaching a callback or topic.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// Request body is not `application/x-www-form-urlencoded`.
    #[error("request body must be application/x-www-form-urlencoded")]
    UnsupportedMediaType,

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// HTTP status code the inbound surface answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            HubError::MissingField { .. }
            | HubError::InvalidMode(_)
            | HubError::InvalidVerifyMode
            | HubError::InvalidUrl { .. }
            | HubError::FragmentInUrl { .. }
            | HubError::InvalidSecret { .. }
            | HubError::InvalidLease(_) => 400,
            HubError::SecretConflict
            | HubError::VerificationFailed(_)
            | HubError::VerificationRejected
            | HubError::TransportFailure(_) => 409,
            HubError::UnsupportedMediaType => 415,
            HubError::Internal(_) => 500,
        }
    }

    /// Whether an async verification may try again after this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HubError::VerificationFailed(_) | HubError::TransportFailure(_)
        )
    }
}

/// Errors raised by the outbound HTTP transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection refused, DNS failure, reset, ...
    #[error("connection error: {0}")]
    Connect(String),

    /// The remote did not answer in time.
    #[error("request timed out")]
    Timeout,

    /// Request could not be built or the response could not be read.
    #[error("request error: {0}")]
    Request(String),
}

impl From<TransportError> for HubError {
    fn from(e: TransportError) -> Self {
        HubError::TransportFailure(e.to_string())
    }
}

/// Errors raised while parsing a topic's content.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    /// Malformed XML.
    #[error("malformed feed: {0}")]
    Malformed(String),

    /// Well-formed document without an Atom `<feed>` root.
    #[error("document is not an Atom feed")]
    NotAFeed,

    /// Body is not UTF-8.
    #[error("feed is not valid UTF-8")]
    Encoding,
}
