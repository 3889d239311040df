//! # Store Module
//!
//! In-memory state: subscription records and topic snapshots.

pub mod snapshots;
pub mod subscriptions;

pub use snapshots::SnapshotStore;
pub use subscriptions::{ChangeRequest, ChangeTicket, SubscriptionStore};
