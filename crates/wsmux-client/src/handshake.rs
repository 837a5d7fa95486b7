use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use wsmux_transport::Connection;

use crate::error::{ClientError, Result};

const MAX_AUTH_TOKEN_LEN: usize = 4096;
const MAX_VERSION_LEN: usize = 64;

/// Default bound on each handshake receive.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(5);
/// Default maximum size of a handshake frame in bytes.
pub const DEFAULT_MAX_AUTH_FRAME: usize = 16 * 1024;

/// Configuration for the access-token handshake.
#[derive(Clone)]
pub struct AuthConfig {
    /// Long-lived access token. Redacted in debug output.
    pub access_token: String,
    /// Timeout for each handshake receive.
    pub timeout: Duration,
    /// Maximum handshake frame size in bytes.
    pub max_frame_size: usize,
}

impl AuthConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            timeout: DEFAULT_AUTH_TIMEOUT,
            max_frame_size: DEFAULT_MAX_AUTH_FRAME,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "access_token",
                &format_args!("<redacted:{} bytes>", self.access_token.len()),
            )
            .field("timeout", &self.timeout)
            .field("max_frame_size", &self.max_frame_size)
            .finish()
    }
}

/// Result of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    /// Version the peer announced, if any.
    pub peer_version: Option<String>,
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    access_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AuthMessage {
    AuthRequired {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthOk {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
}

impl AuthMessage {
    fn name(&self) -> &'static str {
        match self {
            Self::AuthRequired { .. } => "auth_required",
            Self::AuthOk { .. } => "auth_ok",
            Self::AuthInvalid { .. } => "auth_invalid",
        }
    }
}

/// Run the access-token handshake on a fresh connection.
///
/// The peer speaks first with `auth_required`; we answer with `auth` and
/// expect `auth_ok` or `auth_invalid`. Run this before handing the
/// connection to [`Client::start`](crate::Client::start).
pub async fn authenticate<C: Connection>(conn: &C, config: &AuthConfig) -> Result<AuthOutcome> {
    validate_auth_token(&config.access_token)?;

    let announced = match recv_auth_message(conn, config).await? {
        AuthMessage::AuthRequired { ha_version } => ha_version,
        other => {
            return Err(ClientError::HandshakeFailed(format!(
                "expected auth_required, got {}",
                other.name()
            )))
        }
    };

    let request = serde_json::to_string(&AuthRequest {
        kind: "auth",
        access_token: &config.access_token,
    })?;
    conn.send_frame(request)
        .await
        .map_err(|err| ClientError::HandshakeFailed(format!("failed to send auth: {err}")))?;

    match recv_auth_message(conn, config).await? {
        AuthMessage::AuthOk { ha_version } => {
            let peer_version = ha_version.or(announced);
            if let Some(version) = &peer_version {
                validate_version(version)?;
            }
            debug!(peer_version = ?peer_version, "authenticated");
            Ok(AuthOutcome { peer_version })
        }
        AuthMessage::AuthInvalid { message } => Err(ClientError::AuthInvalid(
            message.unwrap_or_else(|| "invalid access token".to_string()),
        )),
        other => Err(ClientError::HandshakeFailed(format!(
            "expected auth_ok or auth_invalid, got {}",
            other.name()
        ))),
    }
}

async fn recv_auth_message<C: Connection>(conn: &C, config: &AuthConfig) -> Result<AuthMessage> {
    let frame = match tokio::time::timeout(config.timeout, conn.recv_frame()).await {
        Ok(Ok(frame)) => frame,
        Ok(Err(err)) => {
            return Err(ClientError::HandshakeFailed(format!(
                "connection lost during handshake: {err}"
            )))
        }
        Err(_) => return Err(ClientError::Timeout(config.timeout)),
    };

    if frame.len() > config.max_frame_size {
        return Err(ClientError::HandshakeFailed(format!(
            "handshake frame too large: {} bytes (max {})",
            frame.len(),
            config.max_frame_size
        )));
    }

    serde_json::from_str(&frame)
        .map_err(|err| ClientError::HandshakeFailed(format!("unexpected handshake frame: {err}")))
}

fn validate_auth_token(token: &str) -> Result<()> {
    if token.is_empty() || token.len() > MAX_AUTH_TOKEN_LEN {
        return Err(ClientError::HandshakeFailed(format!(
            "invalid access_token length: {}",
            token.len()
        )));
    }
    Ok(())
}

fn validate_version(version: &str) -> Result<()> {
    if version.len() > MAX_VERSION_LEN {
        return Err(ClientError::HandshakeFailed(format!(
            "invalid peer version length: {}",
            version.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use wsmux_transport::MemoryConnection;

    use super::*;

    async fn send(conn: &MemoryConnection, value: Value) {
        conn.send_frame(value.to_string()).await.unwrap();
    }

    async fn recv(conn: &MemoryConnection) -> Value {
        serde_json::from_str(&conn.recv_frame().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn successful_handshake() {
        let (client, server) = MemoryConnection::pair();
        let peer = tokio::spawn(async move {
            send(&server, json!({"type": "auth_required", "ha_version": "2024.1.0"})).await;
            let auth = recv(&server).await;
            assert_eq!(auth, json!({"type": "auth", "access_token": "secret"}));
            send(&server, json!({"type": "auth_ok", "ha_version": "2024.1.0"})).await;
            server
        });

        let outcome = authenticate(&client, &AuthConfig::new("secret")).await.unwrap();
        assert_eq!(outcome.peer_version.as_deref(), Some("2024.1.0"));
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn rejected_token() {
        let (client, server) = MemoryConnection::pair();
        let peer = tokio::spawn(async move {
            send(&server, json!({"type": "auth_required"})).await;
            let _ = recv(&server).await;
            send(&server, json!({"type": "auth_invalid", "message": "Invalid password"})).await;
            server
        });

        let err = authenticate(&client, &AuthConfig::new("wrong")).await.unwrap_err();
        assert!(matches!(err, ClientError::AuthInvalid(ref message) if message == "Invalid password"));
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn wrong_first_message_rejected() {
        let (client, server) = MemoryConnection::pair();
        send(&server, json!({"type": "auth_ok"})).await;

        let err = authenticate(&client, &AuthConfig::new("secret")).await.unwrap_err();
        assert!(matches!(err, ClientError::HandshakeFailed(ref message) if message.contains("auth_required")));
    }

    #[tokio::test]
    async fn invalid_json_rejected() {
        let (client, server) = MemoryConnection::pair();
        server.send_frame("not json".to_string()).await.unwrap();

        let err = authenticate(&client, &AuthConfig::new("secret")).await.unwrap_err();
        assert!(matches!(err, ClientError::HandshakeFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_timeout() {
        let (client, _server) = MemoryConnection::pair();
        let mut config = AuthConfig::new("secret");
        config.timeout = Duration::from_millis(100);

        let err = authenticate(&client, &config).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn connection_lost_during_handshake() {
        let (client, server) = MemoryConnection::pair();
        drop(server);

        let err = authenticate(&client, &AuthConfig::new("secret")).await.unwrap_err();
        assert!(matches!(err, ClientError::HandshakeFailed(ref message) if message.contains("connection lost")));
    }

    #[tokio::test]
    async fn rejects_empty_and_oversized_tokens() {
        let (client, _server) = MemoryConnection::pair();

        let err = authenticate(&client, &AuthConfig::new("")).await.unwrap_err();
        assert!(matches!(err, ClientError::HandshakeFailed(_)));

        let err = authenticate(&client, &AuthConfig::new("x".repeat(MAX_AUTH_TOKEN_LEN + 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::HandshakeFailed(_)));
    }

    #[tokio::test]
    async fn rejects_oversized_handshake_frame() {
        let (client, server) = MemoryConnection::pair();
        let mut config = AuthConfig::new("secret");
        config.max_frame_size = 32;
        send(&server, json!({"type": "auth_required", "ha_version": "x".repeat(64)})).await;

        let err = authenticate(&client, &config).await.unwrap_err();
        assert!(matches!(err, ClientError::HandshakeFailed(ref message) if message.contains("too large")));
    }

    #[test]
    fn debug_output_redacts_access_token() {
        let config = AuthConfig::new("super-secret-token");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("<redacted:18 bytes>"));
    }
}
