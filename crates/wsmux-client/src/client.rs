use std::future::pending;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use wsmux_frame::{Request, ResponseMessage, KIND_PING};
use wsmux_transport::Connection;

use crate::config::{CallOptions, ClientConfig, RegistrationOrder, SubscribeOptions};
use crate::error::{ClientError, Result};
use crate::ids::IdAllocator;
use crate::pending::{PendingGuard, PendingTable};
use crate::reader::{self, TerminalReason};
use crate::subscription::{Event, EventHandler, RegistrationGuard, Subscription, SubscriptionTable};

/// State shared by every clone of a [`Client`] and its reader task.
pub(crate) struct Shared<C> {
    pub(crate) conn: C,
    pub(crate) pending: PendingTable,
    pub(crate) subscriptions: Arc<SubscriptionTable>,
    /// Raised by `close`.
    pub(crate) shutdown: CancellationToken,
    /// Raised once, when the reader loop has exited.
    pub(crate) done: CancellationToken,
    ids: IdAllocator,
    terminal: OnceLock<TerminalReason>,
    close_started: AtomicBool,
    config: ClientConfig,
}

impl<C: Connection> Shared<C> {
    fn new(conn: C, config: ClientConfig) -> Self {
        Self {
            conn,
            pending: PendingTable::default(),
            subscriptions: Arc::new(SubscriptionTable::default()),
            shutdown: CancellationToken::new(),
            done: CancellationToken::new(),
            ids: IdAllocator::new(),
            terminal: OnceLock::new(),
            close_started: AtomicBool::new(false),
            config,
        }
    }

    /// Record the terminal reason, then release pending callers and drop
    /// subscriptions. The reason is visible before any waiter wakes.
    pub(crate) fn terminate(&self, reason: TerminalReason) {
        let _ = self.terminal.set(reason);
        let pending = self.pending.close_all();
        let subscriptions = self.subscriptions.clear();
        let reason = self
            .terminal
            .get()
            .map(ToString::to_string)
            .unwrap_or_default();
        info!(%reason, pending, subscriptions, "multiplexer terminated");
    }

    /// Move a confirmed subscription into the table.
    ///
    /// `terminate` records the reason before clearing the table and `done`
    /// is raised only afterwards, so the reason is what gets checked. On
    /// failure the guard removes the entry.
    fn promote(
        &self,
        id: u64,
        handler: EventHandler,
        registration: RegistrationGuard<'_>,
    ) -> Result<()> {
        self.subscriptions.insert(id, handler);
        if self.terminal.get().is_some() || self.shutdown.is_cancelled() {
            return Err(self.closed_error());
        }
        registration.disarm();
        Ok(())
    }

    fn is_stopping(&self) -> bool {
        self.shutdown.is_cancelled() || self.done.is_cancelled()
    }

    fn closed_error(&self) -> ClientError {
        let reason = match self.terminal.get() {
            Some(reason) => reason.to_string(),
            None if self.shutdown.is_cancelled() => TerminalReason::Closed.to_string(),
            None => "reader stopped".to_string(),
        };
        ClientError::ConnectionClosed(reason)
    }
}

/// Multiplexer handle over one duplex connection.
///
/// Cheap to clone; all clones drive the same connection and reader task.
/// Any number of tasks may call [`call`](Self::call) and
/// [`subscribe`](Self::subscribe) concurrently.
pub struct Client<C: Connection> {
    shared: Arc<Shared<C>>,
}

impl<C: Connection> Clone for Client<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connection> std::fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("pending", &self.pending_count())
            .field("subscriptions", &self.subscription_count())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

impl<C: Connection> Client<C> {
    /// Start a multiplexer with the default configuration.
    ///
    /// The connection must already be past any handshake. Must be called
    /// from within a tokio runtime; the reader task is spawned immediately.
    pub fn start(conn: C) -> Self {
        Self::with_config(conn, ClientConfig::default())
    }

    /// Start a multiplexer with an explicit configuration.
    pub fn with_config(conn: C, config: ClientConfig) -> Self {
        let shared = Arc::new(Shared::new(conn, config));
        tokio::spawn(reader::run(Arc::clone(&shared)));
        debug!("multiplexer started");
        Self { shared }
    }

    /// Send a request and wait for its correlated response.
    pub async fn call(&self, request: Request) -> Result<Value> {
        self.call_with(request, CallOptions::default()).await
    }

    /// Send a request with an explicit deadline and/or cancellation token.
    ///
    /// Returns the response's `result` payload (`Null` if absent). A failure
    /// response becomes [`ClientError::Api`].
    pub async fn call_with(&self, request: Request, options: CallOptions) -> Result<Value> {
        let timeout = options.timeout.or(self.shared.config.call_timeout);
        let id = self.shared.ids.next();
        let response = self
            .round_trip(id, &request, timeout, options.cancel.as_ref())
            .await?;
        Ok(response.into_result()?)
    }

    /// Liveness check; the peer answers with `pong`.
    pub async fn ping(&self, options: CallOptions) -> Result<()> {
        self.call_with(Request::new(KIND_PING), options).await?;
        Ok(())
    }

    /// Establish a subscription and route its events to `on_event`.
    ///
    /// The confirmation is bounded by
    /// [`ClientConfig::confirmation_timeout`]. On any failure no entry is
    /// left behind. `on_event` runs on the reader task and must not block.
    pub async fn subscribe<F>(
        &self,
        request: Request,
        on_event: F,
        options: SubscribeOptions,
    ) -> Result<Subscription>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let shared = &self.shared;
        if shared.is_stopping() {
            return Err(shared.closed_error());
        }

        let handler: EventHandler = Arc::new(on_event);
        let order = options
            .registration
            .unwrap_or_else(|| RegistrationOrder::for_kind(request.kind()));
        let id = shared.ids.next();

        if order == RegistrationOrder::BeforeSend {
            shared.subscriptions.insert(id, Arc::clone(&handler));
        }
        let registration = RegistrationGuard::new(&shared.subscriptions, id);

        let timeout = shared.config.confirmation_timeout;
        let response = self.round_trip(id, &request, Some(timeout), None).await;
        if let Err(err) = response.and_then(|response| Ok(response.into_result()?)) {
            debug!(id, kind = request.kind(), error = %err, "subscription not confirmed");
            return Err(err);
        }

        shared.promote(id, handler, registration)?;

        let subscription = Subscription::new(id, Arc::clone(&shared.subscriptions));
        self.watch_subscription(&subscription, &options);
        debug!(id, kind = request.kind(), ?order, "subscription confirmed");
        Ok(subscription)
    }

    /// Close the handle. Idempotent; only the first call closes the connection.
    ///
    /// Every blocked caller is released with [`ClientError::ConnectionClosed`]
    /// and later calls fail fast.
    pub async fn close(&self) -> Result<()> {
        if self.shared.close_started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("closing multiplexer");
        self.shared.shutdown.cancel();
        self.shared.conn.close().await?;
        Ok(())
    }

    /// Resolves once the reader loop has exited.
    pub async fn closed(&self) {
        self.shared.done.cancelled().await;
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.done.is_cancelled()
    }

    /// Why the handle terminated, once it has.
    pub fn terminal_reason(&self) -> Option<String> {
        self.shared.terminal.get().map(ToString::to_string)
    }

    /// Requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.shared.subscriptions.len()
    }

    pub fn has_subscription(&self, id: u64) -> bool {
        self.shared.subscriptions.contains(id)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Write one request and wait for the response carrying `id`.
    ///
    /// The pending entry is removed on every exit path.
    async fn round_trip(
        &self,
        id: u64,
        request: &Request,
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> Result<ResponseMessage> {
        let shared = &self.shared;
        if shared.is_stopping() {
            return Err(shared.closed_error());
        }

        let frame = request.to_frame(id)?;
        let mut slot = shared.pending.register(id);
        let _pending = PendingGuard::new(&shared.pending, id);

        debug!(id, kind = request.kind(), "sending request");
        if let Err(err) = shared.conn.send_frame(frame).await {
            if shared.is_stopping() {
                return Err(shared.closed_error());
            }
            return Err(err.into());
        }

        tokio::select! {
            biased;
            response = slot.recv() => response.ok_or_else(|| shared.closed_error()),
            _ = shared.shutdown.cancelled() => Err(shared.closed_error()),
            _ = shared.done.cancelled() => Err(shared.closed_error()),
            _ = cancelled(cancel) => {
                debug!(id, "request cancelled by caller");
                Err(ClientError::Cancelled)
            }
            elapsed = deadline(timeout) => {
                debug!(id, "request timed out");
                Err(ClientError::Timeout(elapsed))
            }
        }
    }

    /// Tear the subscription down on expiry, caller cancellation or
    /// termination, whichever comes first.
    fn watch_subscription(&self, subscription: &Subscription, options: &SubscribeOptions) {
        let expiry = options.effective_expiry();
        if expiry.is_none() && options.cancel.is_none() {
            return;
        }

        let subscription = subscription.clone();
        let cancel = options.cancel.clone();
        let done = self.shared.done.clone();
        let removed = subscription.removed_token();
        tokio::spawn(async move {
            let id = subscription.id();
            tokio::select! {
                _ = removed.cancelled() => return,
                _ = done.cancelled() => {}
                _ = cancelled(cancel.as_ref()) => debug!(id, "subscription cancelled by caller"),
                _ = deadline(expiry) => debug!(id, "subscription expired"),
            }
            subscription.cleanup();
        });
    }
}

/// Sleeps for `timeout`, or forever if there is none. Yields the duration.
async fn deadline(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(timeout) => {
            tokio::time::sleep(timeout).await;
            timeout
        }
        None => pending().await,
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => pending().await,
    }
}
