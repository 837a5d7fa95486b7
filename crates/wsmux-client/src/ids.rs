use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out correlation identifiers: 1, 2, 3, ...
///
/// Lock-free so allocation never contends with frame routing. Identifiers are
/// never reused for the lifetime of the allocator.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next identifier.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
