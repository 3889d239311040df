//! # Hub Core
//!
//! WebSub (PubSubHubbub) hub protocol engine.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Sits between publishers and subscribers:
//! - Subscribers ask to (un)subscribe a callback to a topic; the hub proves
//!   intent with a challenge round-trip before committing the change
//! - Publishers ping the hub; the hub fetches the topic, works out which
//!   entries are new or updated and pushes only those to every subscriber
//! - Deliveries are signed with the subscriber's secret and retried with
//!   backoff until they succeed or the subscription goes away
//!
//! ## Guarantees
//!
//! | Guarantee | Where |
//! |-----------|-------|
//! | One record per (topic, callback) | `store::SubscriptionStore` |
//! | Only the newest pending change commits | generation numbers on `ChangeTicket` |
//! | Failed verification never alters committed state | `VerificationEngine` |
//! | In-order delivery per subscriber | `NotificationDispatcher` workers |
//! | At most one fetch per topic at a time | `SnapshotStore::fetch_lock` |
//!
//! ## Module Structure
//!
//! ```text
//! hub-core/
//! ├── domain/          # Subscription records, feeds, attempts, errors
//! ├── algorithms/      # Deltas, notification documents, signatures, retry
//! ├── store/           # In-memory subscription and snapshot state
//! ├── ports/           # HubApi (inbound) + transport/parser/clock (outbound)
//! ├── adapters/        # reqwest transport, quick-xml Atom parser
//! ├── application/     # Verification, fetch, dispatch, HubService
//! └── config.rs        # HubConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod store;

// Re-exports
pub use adapters::{AtomFeedParser, ReqwestTransport};
pub use algorithms::{
    build_notification, build_verification_url, compute_delta, sign_body, verify_signature,
    RetryPolicy, SignatureAlgorithm, SIGNATURE_HEADER,
};
pub use application::{HubService, SUBSCRIBERS_HEADER};
pub use config::{ConfigError, HubConfig};
pub use domain::{
    Delta, FeedEntry, FeedError, HubError, HubUrl, Mode, Secret, Subscription, SubscriptionKey,
    SubscriptionStatus, TransportError, VerifyMode, ATOM_CONTENT_TYPE,
};
pub use ports::{
    FeedParser, HttpTransport, HubApi, MockTimeSource, MockTransport, PublishRequest,
    SubscribeOutcome, SubscriptionRequest, SystemTimeSource, TimeSource,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
