use crate::error::PoolError;
use crate::metrics::Metrics;
use crate::slot::Slot;

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use once_cell::sync::OnceCell;

/// A handle to one pooled key/value pair, returned by the `get` family.
///
/// Under eager loading (the default) the value is already resolved when the
/// handle is handed out. Under lazy loading the first `value` call locks
/// the backing slot and runs its factory.
///
/// A handle must not be trusted across its slot's removal: once the pool
/// has evicted the slot, re-`get` to observe current state. A stale lazy
/// handle remains independently computable: its first `value` call still
/// runs the original slot's factory even though the pool has moved on.
pub struct Resource<K, V> {
  slot: Arc<Slot<K, V>>,
  resolved: OnceCell<Arc<V>>,
  metrics: Arc<Metrics>,
}

impl<K, V> Resource<K, V> {
  pub(crate) fn new(slot: Arc<Slot<K, V>>, resolved: Option<Arc<V>>, metrics: Arc<Metrics>) -> Self {
    let cell = OnceCell::new();
    if let Some(value) = resolved {
      let _ = cell.set(value);
    }
    Self {
      slot,
      resolved: cell,
      metrics,
    }
  }

  /// The key this handle was obtained for.
  pub fn key(&self) -> &K {
    self.slot.key()
  }

  /// Whether the backing slot already holds a computed value.
  pub fn is_loaded(&self) -> bool {
    if self.resolved.get().is_some() {
      return true;
    }
    self.slot.lock().value.is_some()
  }

  /// The pooled value.
  ///
  /// Resolved once per handle; under lazy loading the first call runs the
  /// slot's factory (serialized by the slot lock, so concurrent handles to
  /// the same slot still invoke it at most once) and a factory error is
  /// returned to the caller. Failed attempts are retried on the next call.
  pub fn value(&self) -> Result<Arc<V>, PoolError>
  where
    K: fmt::Debug,
  {
    if let Some(value) = self.resolved.get() {
      return Ok(value.clone());
    }

    let mut state = self.slot.lock();
    let freshly_loaded = state.value.is_none();
    let value = match self.slot.ensure_loaded(&mut state) {
      Ok(value) => value,
      Err(err) => {
        self.metrics.load_failures.fetch_add(1, Ordering::Relaxed);
        return Err(err);
      }
    };
    drop(state);

    if freshly_loaded {
      self.metrics.loads.fetch_add(1, Ordering::Relaxed);
    }
    let _ = self.resolved.set(value.clone());
    Ok(value)
  }
}

impl<K: fmt::Debug, V> fmt::Debug for Resource<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Resource")
      .field("key", self.key())
      .field("resolved", &self.resolved.get().is_some())
      .finish_non_exhaustive()
  }
}
