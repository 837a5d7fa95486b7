//! Duplex text-frame connections.
//!
//! Provides a unified interface over the transports a multiplexer can run on:
//! - WebSocket (`ws://`, `wss://`, behind the `websocket` feature)
//! - Length-prefixed frames over a Unix domain socket or any byte stream
//! - An in-memory pair for tests and in-process peers
//!
//! This is the lowest layer of wsmux. Everything else builds on top of the
//! [`Connection`] trait provided here.

pub mod error;
pub mod memory;
pub mod stream;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use error::{Result, TransportError};
pub use memory::MemoryConnection;
pub use stream::StreamConnection;
pub use traits::Connection;

#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;
