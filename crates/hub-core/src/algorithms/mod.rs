//! # Algorithms Module
//!
//! Pure protocol computations: verification URLs, deltas, notification
//! documents, signatures and retry schedules.

pub mod delta;
pub mod notification;
pub mod retry;
pub mod signature;
pub mod verify_query;

pub use delta::{compute_delta, is_updated, merge_index, EntryIndex};
pub use notification::{build_notification, inject_source};
pub use retry::RetryPolicy;
pub use signature::{sign_body, verify_signature, SignatureAlgorithm, SIGNATURE_HEADER};
pub use verify_query::{build_verification_url, verification_query, VerificationParams};
