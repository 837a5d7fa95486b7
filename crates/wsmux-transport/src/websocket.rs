use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::Connection;

/// A WebSocket carrying one JSON document per text message.
///
/// Binary messages are skipped. Ping/pong control frames are answered by
/// the WebSocket layer and never surface as frames.
pub struct WebSocketConnection<S = MaybeTlsStream<TcpStream>> {
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
    closed: CancellationToken,
    close_started: AtomicBool,
}

impl WebSocketConnection {
    /// Connect to a `ws://` or `wss://` URL.
    pub async fn connect(url: &str) -> Result<Self> {
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(TransportError::InvalidTarget(format!(
                "expected ws:// or wss:// url, got '{url}'"
            )));
        }
        let (ws, _response) = tokio_tungstenite::connect_async(url).await?;
        debug!(url, "websocket connected");
        Ok(Self::from_stream(ws))
    }
}

impl<S> WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an established WebSocket stream.
    pub fn from_stream(ws: WebSocketStream<S>) -> Self {
        let (sink, stream) = ws.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: CancellationToken::new(),
            close_started: AtomicBool::new(false),
        }
    }

    async fn next_text(&self) -> Result<String> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "websocket close frame received");
                    return Err(TransportError::ConnectionClosed);
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(len = data.len(), "skipping binary websocket message");
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
                None => return Err(TransportError::ConnectionClosed),
            }
        }
    }
}

impl<S> Connection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send_frame(&self, frame: String) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Shutdown);
        }
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(frame.into()))
            .await
            .map_err(TransportError::from)
    }

    async fn recv_frame(&self) -> Result<String> {
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(TransportError::Shutdown),
            frame = self.next_text() => frame,
        }
    }

    async fn close(&self) -> Result<()> {
        if self.close_started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.closed.cancel();
        let mut sink = self.sink.lock().await;
        match sink.close().await {
            Ok(()) => Ok(()),
            Err(err) => match TransportError::from(err) {
                TransportError::ConnectionClosed => Ok(()),
                other => Err(other),
            },
        }
    }
}

impl<S> std::fmt::Debug for WebSocketConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConnection")
            .field("closed", &self.closed.is_cancelled())
            .finish()
    }
}
