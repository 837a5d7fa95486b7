use std::time::Duration;

use wsmux_frame::ApiError;

/// Errors surfaced to callers of the multiplexer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error while writing this caller's frame.
    #[error("transport error: {0}")]
    Transport(#[from] wsmux_transport::TransportError),

    /// Frame-level error while building this caller's frame.
    #[error("frame error: {0}")]
    Frame(#[from] wsmux_frame::FrameError),

    /// The peer answered with a failure marker.
    #[error("api error {code}: {message}")]
    Api { code: String, message: String },

    /// No answer within the caller deadline or the confirmation timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The caller-supplied cancellation token fired.
    #[error("request cancelled")]
    Cancelled,

    /// The handle has terminated; carries the terminal reason.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Handshake failed before the multiplexer started.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The peer rejected the access token.
    #[error("authentication rejected: {0}")]
    AuthInvalid(String),
}

impl ClientError {
    /// Returns true for caller deadlines and confirmation timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns true if the caller's own cancellation fired.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if the handle has terminated.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed(_))
    }

    /// Peer-reported error code, if this is an API error.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<ApiError> for ClientError {
    fn from(err: ApiError) -> Self {
        Self::Api {
            code: err.code,
            message: err.message,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
