use wsmux_frame::FrameError;

/// Errors that can occur in connection operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the specified target.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },

    /// The connection target could not be understood.
    #[error("invalid connection target: {0}")]
    InvalidTarget(String),

    /// An I/O error occurred on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A byte-stream frame could not be encoded or decoded.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// WebSocket protocol error.
    #[cfg(feature = "websocket")]
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// The remote side closed the connection.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The connection has been closed locally.
    #[error("transport shut down")]
    Shutdown,
}

#[cfg(feature = "websocket")]
impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        match err {
            tokio_tungstenite::tungstenite::Error::ConnectionClosed
            | tokio_tungstenite::tungstenite::Error::AlreadyClosed => Self::ConnectionClosed,
            other => Self::WebSocket(Box::new(other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
