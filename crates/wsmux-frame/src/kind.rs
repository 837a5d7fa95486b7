//! Well-known message kinds.
//!
//! A kind travels in the `type` field of every frame. Inbound frames use
//! [`KIND_RESULT`], [`KIND_PONG`] and [`KIND_EVENT`]; the remaining constants
//! are outbound request kinds the multiplexer treats specially.

/// Response to a request or subscription.
pub const KIND_RESULT: &str = "result";

/// Asynchronous event for an active subscription.
pub const KIND_EVENT: &str = "event";

/// Keepalive request.
pub const KIND_PING: &str = "ping";

/// Keepalive response. Routed like a successful result without payload.
pub const KIND_PONG: &str = "pong";

/// Subscribe to bus events, optionally filtered by `event_type`.
pub const KIND_SUBSCRIBE_EVENTS: &str = "subscribe_events";

/// Tear down a bus event subscription on the peer.
pub const KIND_UNSUBSCRIBE_EVENTS: &str = "unsubscribe_events";

/// Subscribe to a trigger; events carry the trigger variables.
pub const KIND_SUBSCRIBE_TRIGGER: &str = "subscribe_trigger";

/// Render a template and stream re-renders as events.
pub const KIND_RENDER_TEMPLATE: &str = "render_template";

/// Returns true if subscriptions of this kind must have their callback
/// registered before the request frame is written.
///
/// The peer emits the first event for these kinds immediately after the
/// confirmation, often in the same read batch, so registering after the
/// confirmation is observed would drop it.
pub fn registers_early(kind: &str) -> bool {
    matches!(kind, KIND_RENDER_TEMPLATE | KIND_SUBSCRIBE_TRIGGER)
}
