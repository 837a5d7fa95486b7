use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::debug;
use wsmux_frame::ResponseMessage;

/// Identifier → single-slot delivery point for requests awaiting a response.
///
/// Each slot is a capacity-one channel. Delivery only needs the shared lock;
/// a second response for the same identifier finds the slot full and is
/// dropped. Dropping the sender closes the slot without a value, which is how
/// termination releases every waiter.
#[derive(Debug, Default)]
pub(crate) struct PendingTable {
    entries: RwLock<HashMap<u64, mpsc::Sender<ResponseMessage>>>,
}

impl PendingTable {
    /// Register a slot for `id` and return its receiving end.
    pub(crate) fn register(&self, id: u64) -> mpsc::Receiver<ResponseMessage> {
        let (tx, rx) = mpsc::channel(1);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        rx
    }

    /// Deliver a response to its slot. Returns false if nobody is waiting.
    pub(crate) fn deliver(&self, response: ResponseMessage) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = entries.get(&response.id) else {
            return false;
        };
        let id = response.id;
        match slot.try_send(response) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(id, "dropping duplicate response");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub(crate) fn remove(&self, id: u64) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// Close every slot without a value. Returns how many were closed.
    pub(crate) fn close_all(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let closed = entries.len();
        entries.clear();
        closed
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: u64) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }
}

/// Removes a pending slot when the waiting caller finishes, whatever the outcome.
pub(crate) struct PendingGuard<'a> {
    table: &'a PendingTable,
    id: u64,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(table: &'a PendingTable, id: u64) -> Self {
        Self { table, id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.remove(self.id);
    }
}
