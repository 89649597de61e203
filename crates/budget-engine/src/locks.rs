//! Per-key async critical sections.
//!
//! Each key gets its own `tokio` mutex, created on first use. Entries nobody
//! holds or waits on are swept once the table grows past a threshold.

use std::{
  collections::HashMap,
  hash::Hash,
  sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

const SWEEP_THRESHOLD: usize = 1024;

pub(crate) struct KeyedLocks<K> {
  table: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
  pub(crate) fn new() -> Self { Self { table: Mutex::new(HashMap::new()) } }

  /// Wait for exclusive access to `key`. Released when the guard drops.
  pub(crate) async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
    let slot = {
      let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
      if table.len() >= SWEEP_THRESHOLD {
        table.retain(|_, m| Arc::strong_count(m) > 1);
      }
      table.entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    };
    slot.lock_owned().await
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    self.table.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  /// Whether some task currently holds `key`.
  #[cfg(test)]
  pub(crate) fn is_held(&self, key: &K) -> bool {
    let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
    table.get(key).is_some_and(|m| m.try_lock().is_err())
  }
}
