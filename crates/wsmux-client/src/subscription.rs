use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Once, PoisonError, RwLock};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use wsmux_frame::EventMessage;

/// An event delivered to a subscription callback.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Identifier of the subscription the event belongs to.
    pub id: u64,
    /// The event payload as sent by the peer.
    pub payload: Value,
}

/// Callback invoked for each event of a subscription.
pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;

/// Identifier → callback for live subscriptions.
///
/// Callbacks run on the reader task, outside the table lock, so a callback
/// may clean up its own subscription.
#[derive(Default)]
pub(crate) struct SubscriptionTable {
    entries: RwLock<HashMap<u64, EventHandler>>,
}

impl SubscriptionTable {
    /// Insert a callback unless one is already registered for `id`.
    /// Returns true if this call inserted it.
    pub(crate) fn insert(&self, id: u64, handler: EventHandler) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(id, handler);
        true
    }

    pub(crate) fn remove(&self, id: u64) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// Route an event to its callback. Returns false if no subscription matched.
    pub(crate) fn dispatch(&self, event: EventMessage) -> bool {
        let handler = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(&event.id) {
                Some(handler) => Arc::clone(handler),
                None => return false,
            }
        };

        let id = event.id;
        let event = Event {
            id,
            payload: event.event,
        };
        if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
            warn!(id, "subscription callback panicked");
        }
        true
    }

    /// Drop every subscription. Returns how many were removed.
    pub(crate) fn clear(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn contains(&self, id: u64) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }
}

impl std::fmt::Debug for SubscriptionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionTable")
            .field("len", &self.len())
            .finish()
    }
}

/// Removes an early registration if the subscribe attempt does not complete.
pub(crate) struct RegistrationGuard<'a> {
    table: &'a SubscriptionTable,
    id: u64,
    armed: bool,
}

impl<'a> RegistrationGuard<'a> {
    pub(crate) fn new(table: &'a SubscriptionTable, id: u64) -> Self {
        Self {
            table,
            id,
            armed: true,
        }
    }

    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RegistrationGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.table.remove(self.id);
        }
    }
}

/// Handle to a confirmed subscription.
///
/// Clones share one cleanup gate: however many of expiry, cancellation,
/// termination and explicit [`cleanup`](Self::cleanup) fire, the entry is
/// removed exactly once. Cleanup is local; no unsubscribe request is sent.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<Inner>,
}

struct Inner {
    id: u64,
    table: Arc<SubscriptionTable>,
    gate: Once,
    removed: CancellationToken,
}

impl Subscription {
    pub(crate) fn new(id: u64, table: Arc<SubscriptionTable>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                table,
                gate: Once::new(),
                removed: CancellationToken::new(),
            }),
        }
    }

    /// The subscription identifier; events carry the same value.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Remove the subscription. Returns true only for the call that did it.
    ///
    /// Concurrent callers wait for the winning call to finish, so every call
    /// returns with the entry already gone.
    pub fn cleanup(&self) -> bool {
        let mut performed = false;
        self.inner.gate.call_once(|| {
            self.inner.table.remove(self.inner.id);
            self.inner.removed.cancel();
            performed = true;
        });
        if performed {
            debug!(id = self.inner.id, "subscription removed");
        }
        performed
    }

    /// Returns true once cleanup has run.
    pub fn is_removed(&self) -> bool {
        self.inner.gate.is_completed()
    }

    /// Resolves once cleanup has run.
    pub async fn removed(&self) {
        self.inner.removed.cancelled().await;
    }

    pub(crate) fn removed_token(&self) -> CancellationToken {
        self.inner.removed.clone()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("removed", &self.is_removed())
            .finish()
    }
}
