//! Request/response and subscription multiplexing over one duplex connection.
//!
//! wsmux lets many concurrent callers share a single text-frame connection:
//! each request carries an integer identifier, one reader task routes every
//! inbound frame back to its caller or subscription, and deadlines,
//! cancellation and teardown never leave state behind.
//!
//! # Crate Structure
//!
//! - [`frame`]: wire message model, message kinds, byte-stream codec
//! - [`transport`]: the [`Connection`](transport::Connection) trait and its
//!   in-memory, Unix socket and WebSocket (behind `websocket`) implementations
//! - [`client`]: the multiplexer handle, subscriptions and the auth handshake
//! - [`shutdown`]: signal-aware shutdown with ordered cleanup

/// Re-export frame types.
pub mod frame {
    pub use wsmux_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use wsmux_transport::*;
}

/// Re-export client types.
pub mod client {
    pub use wsmux_client::*;
}

pub mod shutdown;

pub use wsmux_client::{Client, ClientError, Subscription};
pub use wsmux_frame::Request;
