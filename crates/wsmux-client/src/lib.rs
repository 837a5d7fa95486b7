//! Request/response and subscription multiplexing over one duplex connection.
//!
//! A [`Client`] owns a [`Connection`](wsmux_transport::Connection) and lets any
//! number of tasks issue correlated requests and hold event subscriptions on
//! it at the same time:
//!
//! - every outbound request carries a fresh integer identifier
//! - one reader task routes each inbound frame by that identifier, either to
//!   the waiting caller or to a subscription callback
//! - deadlines, cancellation, and subscription teardown never leave entries
//!   behind
//!
//! # Example
//!
//! ```no_run
//! use wsmux_client::{authenticate, AuthConfig, Client, SubscribeOptions};
//! use wsmux_frame::{Request, KIND_SUBSCRIBE_EVENTS};
//! use wsmux_transport::StreamConnection;
//!
//! # async fn run() -> wsmux_client::Result<()> {
//! let conn = StreamConnection::connect_unix("/tmp/hub.sock").await?;
//! authenticate(&conn, &AuthConfig::new("token")).await?;
//!
//! let client = Client::start(conn);
//! let states = client.call(Request::new("get_states")).await?;
//! println!("{states}");
//!
//! let subscription = client
//!     .subscribe(
//!         Request::new(KIND_SUBSCRIBE_EVENTS).with_field("event_type", "state_changed"),
//!         |event| println!("{}", event.payload),
//!         SubscribeOptions::default(),
//!     )
//!     .await?;
//! subscription.cleanup();
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod config;
pub mod error;
pub mod handshake;
pub mod ids;
mod pending;
mod reader;
pub mod subscription;

pub use client::Client;
pub use config::{
    CallOptions, ClientConfig, RegistrationOrder, SubscribeOptions, DEFAULT_CONFIRMATION_TIMEOUT,
};
pub use error::{ClientError, Result};
pub use handshake::{authenticate, AuthConfig, AuthOutcome};
pub use ids::IdAllocator;
pub use subscription::{Event, EventHandler, Subscription};
