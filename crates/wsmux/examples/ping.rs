//! Connect, authenticate, and measure one ping round trip.
//!
//! Run with:
//!   WSMUX_URL=ws://homeassistant.local:8123/api/websocket WSMUX_TOKEN=... \
//!     cargo run --example ping --features websocket

use std::time::Instant;

use wsmux::client::{authenticate, AuthConfig, CallOptions};
use wsmux::transport::WebSocketConnection;
use wsmux::Client;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::var("WSMUX_URL")?;
    let token = std::env::var("WSMUX_TOKEN")?;

    let conn = WebSocketConnection::connect(&url).await?;
    let outcome = authenticate(&conn, &AuthConfig::new(token)).await?;
    eprintln!(
        "Connected to {url} (version {})",
        outcome.peer_version.as_deref().unwrap_or("unknown")
    );

    let client = Client::start(conn);
    let started = Instant::now();
    client.ping(CallOptions::default()).await?;
    println!("pong in {:?}", started.elapsed());

    client.close().await?;
    Ok(())
}
