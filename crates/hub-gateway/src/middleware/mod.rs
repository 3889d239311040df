//! Middleware stack for the hub endpoint.
//!
//! Layer order: Request → BodyLimit → Tracing → Handler

pub mod tracing;

pub use tracing::TracingLayer;
