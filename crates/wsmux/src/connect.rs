use wsmux::client::{authenticate, AuthConfig};
use wsmux::transport::{Connection, Result, TransportError, WebSocketConnection};
#[cfg(unix)]
use wsmux::transport::StreamConnection;

use crate::cmd::ConnectArgs;
use crate::exit::{client_error, transport_error, CliError, CliResult, USAGE};

#[cfg(unix)]
type UnixConnection =
    StreamConnection<tokio::net::unix::OwnedReadHalf, tokio::net::unix::OwnedWriteHalf>;

/// Whichever transport the `--url` scheme selected.
#[derive(Debug)]
pub enum AnyConnection {
    WebSocket(WebSocketConnection),
    #[cfg(unix)]
    Unix(UnixConnection),
}

impl Connection for AnyConnection {
    async fn send_frame(&self, frame: String) -> Result<()> {
        match self {
            Self::WebSocket(conn) => conn.send_frame(frame).await,
            #[cfg(unix)]
            Self::Unix(conn) => conn.send_frame(frame).await,
        }
    }

    async fn recv_frame(&self) -> Result<String> {
        match self {
            Self::WebSocket(conn) => conn.recv_frame().await,
            #[cfg(unix)]
            Self::Unix(conn) => conn.recv_frame().await,
        }
    }

    async fn close(&self) -> Result<()> {
        match self {
            Self::WebSocket(conn) => conn.close().await,
            #[cfg(unix)]
            Self::Unix(conn) => conn.close().await,
        }
    }
}

/// Open the connection named by `--url` and authenticate if a token is set.
pub async fn connect(args: &ConnectArgs) -> CliResult<AnyConnection> {
    let url = args
        .url
        .as_deref()
        .ok_or_else(|| CliError::new(USAGE, "--url (or WSMUX_URL) is required"))?;

    let conn = open(url)
        .await
        .map_err(|err| transport_error("connect failed", err))?;

    if let Some(token) = &args.token {
        let outcome = authenticate(&conn, &AuthConfig::new(token.clone()))
            .await
            .map_err(|err| client_error("authentication failed", err))?;
        tracing::debug!(peer_version = ?outcome.peer_version, "authenticated");
    }
    Ok(conn)
}

async fn open(url: &str) -> Result<AnyConnection> {
    if let Some(path) = url.strip_prefix("unix:") {
        return open_unix(path).await;
    }
    if url.starts_with("ws://") || url.starts_with("wss://") {
        return WebSocketConnection::connect(url)
            .await
            .map(AnyConnection::WebSocket);
    }
    Err(TransportError::InvalidTarget(format!(
        "{url} (expected ws://, wss:// or unix:<path>)"
    )))
}

#[cfg(unix)]
async fn open_unix(path: &str) -> Result<AnyConnection> {
    StreamConnection::connect_unix(path)
        .await
        .map(AnyConnection::Unix)
}

#[cfg(not(unix))]
async fn open_unix(path: &str) -> Result<AnyConnection> {
    Err(TransportError::InvalidTarget(format!(
        "unix:{path} (Unix sockets are not supported on this platform)"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unknown_scheme() {
        let err = open("http://localhost:8123").await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidTarget(_)));
    }

    #[tokio::test]
    async fn missing_url_is_usage_error() {
        let err = connect(&ConnectArgs::default()).await.unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
