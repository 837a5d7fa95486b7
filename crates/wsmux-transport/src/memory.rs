use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::Connection;

/// One end of an in-process connection pair.
///
/// Frames sent on one end are received, in order, on the other. Closing an
/// end fails its own pending receive immediately and makes the other end
/// observe [`TransportError::ConnectionClosed`] once buffered frames are drained.
#[derive(Debug)]
pub struct MemoryConnection {
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    closed: CancellationToken,
}

impl MemoryConnection {
    /// Create two connected ends.
    pub fn pair() -> (Self, Self) {
        let (left_tx, right_rx) = mpsc::unbounded_channel();
        let (right_tx, left_rx) = mpsc::unbounded_channel();
        (Self::new(left_tx, left_rx), Self::new(right_tx, right_rx))
    }

    fn new(tx: mpsc::UnboundedSender<String>, rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            closed: CancellationToken::new(),
        }
    }

    /// Returns true once [`Connection::close`] has been called on this end.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    fn send_now(&self, frame: String) -> Result<()> {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match tx.as_ref() {
            Some(tx) => tx
                .send(frame)
                .map_err(|_| TransportError::ConnectionClosed),
            None => Err(TransportError::Shutdown),
        }
    }
}

impl Connection for MemoryConnection {
    async fn send_frame(&self, frame: String) -> Result<()> {
        self.send_now(frame)
    }

    async fn recv_frame(&self) -> Result<String> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(TransportError::Shutdown),
            frame = rx.recv() => frame.ok_or(TransportError::ConnectionClosed),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.cancel();
        let dropped = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.rx.lock().await.close();
        if dropped.is_some() {
            debug!("memory connection closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn frames_cross_in_order() {
        let (left, right) = MemoryConnection::pair();

        left.send_frame("one".to_string()).await.unwrap();
        left.send_frame("two".to_string()).await.unwrap();
        right.send_frame("back".to_string()).await.unwrap();

        assert_eq!(right.recv_frame().await.unwrap(), "one");
        assert_eq!(right.recv_frame().await.unwrap(), "two");
        assert_eq!(left.recv_frame().await.unwrap(), "back");
    }

    #[tokio::test]
    async fn close_fails_local_receive_and_send() {
        let (left, _right) = MemoryConnection::pair();
        left.close().await.unwrap();

        assert!(left.is_closed());
        assert!(matches!(
            left.recv_frame().await,
            Err(TransportError::Shutdown)
        ));
        assert!(matches!(
            left.send_frame("late".to_string()).await,
            Err(TransportError::Shutdown)
        ));
    }

    #[tokio::test]
    async fn close_unblocks_pending_receive() {
        let (left, _right) = MemoryConnection::pair();
        let left = std::sync::Arc::new(left);

        let waiter = {
            let left = std::sync::Arc::clone(&left);
            tokio::spawn(async move { left.recv_frame().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        left.close().await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("receive should be released by close")
            .unwrap();
        assert!(matches!(result, Err(TransportError::Shutdown)));
    }

    #[tokio::test]
    async fn peer_sees_connection_closed_after_drain() {
        let (left, right) = MemoryConnection::pair();
        left.send_frame("last".to_string()).await.unwrap();
        left.close().await.unwrap();

        assert_eq!(right.recv_frame().await.unwrap(), "last");
        assert!(matches!(
            right.recv_frame().await,
            Err(TransportError::ConnectionClosed)
        ));
        assert!(matches!(
            right.send_frame("anyone?".to_string()).await,
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (left, _right) = MemoryConnection::pair();
        left.close().await.unwrap();
        left.close().await.unwrap();
    }
}
