use std::fmt;
use std::sync::Arc;

use tracing::debug;
use wsmux_frame::{decode_inbound, InboundMessage};
use wsmux_transport::Connection;

use crate::client::Shared;

/// Why the reader loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TerminalReason {
    /// `close` was called on the handle.
    Closed,
    /// Reading from the connection failed.
    ReadFailed(String),
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("cancelled"),
            Self::ReadFailed(err) => write!(f, "read failed: {err}"),
        }
    }
}

/// Sole consumer of inbound frames.
///
/// Runs until the handle is closed or a read fails, then releases every
/// pending caller, drops every subscription and raises the done signal.
pub(crate) async fn run<C: Connection>(shared: Arc<Shared<C>>) {
    // Raised on every exit path, unwinding included.
    let _done = shared.done.clone().drop_guard();

    loop {
        let frame = tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => {
                shared.terminate(TerminalReason::Closed);
                return;
            }
            frame = shared.conn.recv_frame() => frame,
        };

        match frame {
            Ok(text) => route(&shared, &text),
            Err(err) => {
                shared.terminate(TerminalReason::ReadFailed(err.to_string()));
                return;
            }
        }
    }
}

fn route<C: Connection>(shared: &Shared<C>, text: &str) {
    let message = match decode_inbound(text) {
        Ok(message) => message,
        Err(err) => {
            debug!(error = %err, "dropping undecodable frame");
            return;
        }
    };

    match message {
        InboundMessage::Response(response) => {
            let id = response.id;
            if !shared.pending.deliver(response) {
                debug!(id, "dropping response with no waiting caller");
            }
        }
        InboundMessage::Event(event) => {
            let id = event.id;
            if !shared.subscriptions.dispatch(event) {
                debug!(id, "dropping event with no subscription");
            }
        }
    }
}
