//! Subscribe to state changes and render a template side by side on one
//! connection, until Ctrl-C.
//!
//! Run with:
//!   WSMUX_URL=ws://homeassistant.local:8123/api/websocket WSMUX_TOKEN=... \
//!     cargo run --example watch-states --features websocket

use std::sync::Arc;

use wsmux::client::{authenticate, AuthConfig, SubscribeOptions};
use wsmux::frame::{Request, KIND_RENDER_TEMPLATE, KIND_SUBSCRIBE_EVENTS};
use wsmux::shutdown::Coordinator;
use wsmux::transport::WebSocketConnection;
use wsmux::Client;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::var("WSMUX_URL")?;
    let token = std::env::var("WSMUX_TOKEN")?;

    let conn = WebSocketConnection::connect(&url).await?;
    authenticate(&conn, &AuthConfig::new(token)).await?;
    let client = Client::start(conn);

    let coordinator = Arc::new(Coordinator::default());
    let closing = client.clone();
    coordinator.register("close multiplexer", move || async move { closing.close().await });
    coordinator.listen_for_signals();

    let states = client
        .subscribe(
            Request::new(KIND_SUBSCRIBE_EVENTS).with_field("event_type", "state_changed"),
            |event| {
                let entity = &event.payload["data"]["entity_id"];
                let state = &event.payload["data"]["new_state"]["state"];
                println!("{entity} -> {state}");
            },
            SubscribeOptions::with_cancel(coordinator.token()),
        )
        .await?;

    let template = client
        .subscribe(
            Request::new(KIND_RENDER_TEMPLATE)
                .with_field("template", "{{ states | count }} entities"),
            |event| println!("template: {}", event.payload["result"]),
            SubscribeOptions::with_cancel(coordinator.token()),
        )
        .await?;

    eprintln!(
        "Watching (subscriptions {} and {}); Ctrl-C to stop",
        states.id(),
        template.id()
    );
    coordinator.token().cancelled().await;

    let report = coordinator.run_cleanups().await;
    eprintln!("Shutdown: {report:?}");
    Ok(())
}
