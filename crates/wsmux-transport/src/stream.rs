use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use wsmux_frame::{FrameConfig, TextFrameCodec};

use crate::error::{Result, TransportError};
use crate::traits::Connection;

/// Text frames carried over a byte stream with length-prefixed framing.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct StreamConnection<R, W> {
    reader: Mutex<FramedRead<R, TextFrameCodec>>,
    writer: Mutex<FramedWrite<W, TextFrameCodec>>,
    closed: CancellationToken,
    close_started: AtomicBool,
}

impl<R, W> StreamConnection<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap a read half and a write half with default framing limits.
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, FrameConfig::default())
    }

    /// Wrap a read half and a write half with explicit framing limits.
    pub fn with_config(reader: R, writer: W, config: FrameConfig) -> Self {
        Self {
            reader: Mutex::new(FramedRead::new(
                reader,
                TextFrameCodec::with_config(config.clone()),
            )),
            writer: Mutex::new(FramedWrite::new(
                writer,
                TextFrameCodec::with_config(config),
            )),
            closed: CancellationToken::new(),
            close_started: AtomicBool::new(false),
        }
    }
}

#[cfg(unix)]
impl StreamConnection<tokio::net::unix::OwnedReadHalf, tokio::net::unix::OwnedWriteHalf> {
    /// Connect to a listening Unix domain socket.
    pub async fn connect_unix(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream = tokio::net::UnixStream::connect(path)
            .await
            .map_err(|source| TransportError::Connect {
                target: path.display().to_string(),
                source,
            })?;
        debug!(?path, "connected to unix domain socket");
        Ok(Self::from_unix(stream))
    }

    /// Wrap an already connected Unix stream.
    pub fn from_unix(stream: tokio::net::UnixStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self::new(reader, writer)
    }
}

impl<R, W> Connection for StreamConnection<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send_frame(&self, frame: String) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Shutdown);
        }
        let mut writer = self.writer.lock().await;
        writer.send(frame).await.map_err(TransportError::from)
    }

    async fn recv_frame(&self) -> Result<String> {
        let mut reader = self.reader.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(TransportError::Shutdown),
            next = reader.next() => match next {
                Some(Ok(frame)) => Ok(frame),
                Some(Err(err)) => Err(err.into()),
                None => Err(TransportError::ConnectionClosed),
            },
        }
    }

    async fn close(&self) -> Result<()> {
        if self.close_started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.closed.cancel();
        let mut writer = self.writer.lock().await;
        writer.close().await.map_err(TransportError::from)
    }
}

impl<R, W> std::fmt::Debug for StreamConnection<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnection")
            .field("closed", &self.closed.is_cancelled())
            .finish()
    }
}
