//! Per-key async locks serializing evaluations within one process.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::QuotaKey;

/// One mutex per quota key, created on demand and dropped when idle.
///
/// Callers on different keys never wait on each other.
#[derive(Default)]
pub struct KeyLocks {
    slots: DashMap<QuotaKey, Arc<Mutex<()>>>,
}

/// Held for the duration of one evaluate-and-commit sequence.
pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: QuotaKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &QuotaKey) -> KeyGuard<'_> {
        // The map entry must be released before awaiting the mutex.
        let slot = Arc::clone(&self.slots.entry(key.clone()).or_default());
        let guard = slot.lock_owned().await;

        KeyGuard {
            locks: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Number of keys with a live lock slot.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone of the slot, so a count of one means
        // nobody else is queued on this key.
        self.locks
            .slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}
