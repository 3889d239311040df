//! # WebSub Hub Test Suite
//!
//! End-to-end flows over real sockets.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # TestHub, MockSubscriber, MockPublisher
//! └── integration/
//!     ├── subscription.rs  # Subscribe/unsubscribe + verification handshake
//!     └── publishing.rs    # Publish → fetch → delta → signed delivery
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p hub-tests
//! cargo test -p hub-tests integration::publishing::
//! ```

pub mod harness;
pub mod integration;
