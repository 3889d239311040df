//! # Application Module
//!
//! Services orchestrating the domain, the stores and the outbound ports.

pub mod dispatcher;
pub mod fetcher;
pub mod publish;
pub mod request_handler;
pub mod service;
pub mod verification;

pub use dispatcher::{Notification, NotificationDispatcher};
pub use fetcher::{ContentFetcher, FetchOutcome, SUBSCRIBERS_HEADER};
pub use publish::PublishIngestor;
pub use request_handler::{SubscriptionRequestHandler, ValidatedSubscription};
pub use service::HubService;
pub use verification::{VerificationEngine, VerificationOutcome};
