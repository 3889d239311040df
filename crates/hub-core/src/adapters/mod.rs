//! # Adapters Layer (Hexagonal Architecture)
//!
//! Concrete implementations of the outbound ports.

mod atom;
mod http;

pub use atom::AtomFeedParser;
pub use http::ReqwestTransport;
