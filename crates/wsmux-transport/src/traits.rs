use std::future::Future;

use crate::error::Result;

/// A connected duplex channel of discrete text frames.
///
/// All methods take `&self`: one task owns the receive side while any number
/// of tasks send concurrently, so implementations serialize their own writes.
/// The order of frames written by concurrent senders is not specified.
///
/// Framing, TLS and any handshake are the implementation's concern; by the
/// time a connection exists it is ready to carry application frames.
pub trait Connection: Send + Sync + 'static {
    /// Send one text frame.
    fn send_frame(&self, frame: String) -> impl Future<Output = Result<()>> + Send;

    /// Receive the next text frame, waiting until one arrives.
    ///
    /// Returns [`TransportError::ConnectionClosed`](crate::TransportError::ConnectionClosed)
    /// once the peer has gone away and [`TransportError::Shutdown`](crate::TransportError::Shutdown)
    /// once [`close`](Connection::close) has been called locally.
    fn recv_frame(&self) -> impl Future<Output = Result<String>> + Send;

    /// Close the connection. Pending and future receives fail.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}
