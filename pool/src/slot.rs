use crate::error::{FactoryError, PoolError};
use crate::time;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// The function invoked to compute a value for a missing key.
///
/// Stored behind an `Arc` so the same factory can be shared between the
/// pool default, a slot awaiting its first load, and retries after a
/// failed attempt.
pub(crate) type Factory<K, V> = Arc<dyn Fn(&K) -> Result<V, FactoryError> + Send + Sync>;

/// The lock-protected portion of a slot.
pub(crate) struct SlotState<K, V> {
  /// The computed payload; absent until the first successful factory run.
  pub(crate) value: Option<Arc<V>>,
  /// Cleared permanently after the first successful invocation; retained
  /// across failed attempts so a later caller can retry.
  pub(crate) factory: Option<Factory<K, V>>,
  /// True if the most recent factory invocation returned an error.
  /// Advisory only; it does not block a retry.
  pub(crate) faulted: bool,
}

/// One cached key/value pair.
///
/// The slot owns its own exclusive lock, serializing all access to this
/// key's value and factory. `expired` and `last_touch` are atomics so
/// structural sweeps can test them before committing to the lock; they are
/// only ever written while the slot lock is held.
pub(crate) struct Slot<K, V> {
  key: K,
  state: Mutex<SlotState<K, V>>,
  /// Nanoseconds since the pool epoch of the last touch (or creation).
  last_touch: AtomicU64,
  /// True until the first post-creation access consumes it.
  is_new: AtomicBool,
  /// Terminal: a slot is never reused once this is set.
  expired: AtomicBool,
}

impl<K, V> Slot<K, V> {
  /// Creates a slot that will compute its value on demand.
  pub(crate) fn new(key: K, factory: Factory<K, V>) -> Self {
    Self {
      key,
      state: Mutex::new(SlotState {
        value: None,
        factory: Some(factory),
        faulted: false,
      }),
      last_touch: AtomicU64::new(time::now_nanos()),
      is_new: AtomicBool::new(true),
      expired: AtomicBool::new(false),
    }
  }

  /// Creates a slot that already holds its value. Used by `insert`.
  pub(crate) fn preloaded(key: K, value: V) -> Self {
    Self {
      key,
      state: Mutex::new(SlotState {
        value: Some(Arc::new(value)),
        factory: None,
        faulted: false,
      }),
      last_touch: AtomicU64::new(time::now_nanos()),
      is_new: AtomicBool::new(true),
      expired: AtomicBool::new(false),
    }
  }

  #[inline]
  pub(crate) fn key(&self) -> &K {
    &self.key
  }

  /// Acquires the slot's exclusive lock, blocking until it is free.
  #[inline]
  pub(crate) fn lock(&self) -> MutexGuard<'_, SlotState<K, V>> {
    self.state.lock()
  }

  /// Attempts the slot lock without waiting.
  #[inline]
  pub(crate) fn try_lock(&self) -> Option<MutexGuard<'_, SlotState<K, V>>> {
    self.state.try_lock()
  }

  /// If the value has not been computed yet, runs the factory with this
  /// slot's key. Must be called with the slot lock held (the caller passes
  /// the guard's contents in).
  ///
  /// On success the value is stored and the factory cleared, making this
  /// idempotent afterwards. On failure the factory stays in place so a
  /// later attempt can retry, and the error is returned wrapped with key
  /// context.
  pub(crate) fn ensure_loaded(&self, state: &mut SlotState<K, V>) -> Result<Arc<V>, PoolError>
  where
    K: fmt::Debug,
  {
    if let Some(value) = &state.value {
      return Ok(value.clone());
    }

    // A slot is constructed with either a value or a factory, and the
    // factory is only cleared once a value is stored.
    let factory = state
      .factory
      .clone()
      .expect("slot has neither value nor factory");

    match factory(&self.key) {
      Ok(value) => {
        let value = Arc::new(value);
        state.value = Some(value.clone());
        state.factory = None;
        state.faulted = false;
        Ok(value)
      }
      Err(source) => {
        state.faulted = true;
        Err(PoolError::Factory {
          key: format!("{:?}", self.key),
          source,
        })
      }
    }
  }

  /// Refreshes the last-touch timestamp and consumes the new flag.
  #[inline]
  pub(crate) fn touch(&self) {
    self.last_touch.store(time::now_nanos(), Ordering::Relaxed);
    self.is_new.store(false, Ordering::Relaxed);
  }

  /// Consumes the new flag without refreshing the timestamp. The creation
  /// timestamp is already fresh on a slot's first access.
  #[inline]
  pub(crate) fn take_new(&self) -> bool {
    self.is_new.swap(false, Ordering::Relaxed)
  }

  #[inline]
  pub(crate) fn is_expired(&self) -> bool {
    self.expired.load(Ordering::Relaxed)
  }

  /// Marks the slot as logically removed. Terminal; callers must hold the
  /// slot lock.
  #[inline]
  pub(crate) fn set_expired(&self) {
    self.expired.store(true, Ordering::Relaxed);
  }

  /// The nanosecond timestamp at which this slot becomes eligible for
  /// eviction under the given lifetime. Readable without the slot lock.
  #[inline]
  pub(crate) fn deadline_nanos(&self, lifetime_nanos: u64) -> u64 {
    self
      .last_touch
      .load(Ordering::Relaxed)
      .saturating_add(lifetime_nanos)
  }

}

impl<K, V> fmt::Debug for Slot<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Slot")
      .field("is_new", &self.is_new.load(Ordering::Relaxed))
      .field("expired", &self.expired.load(Ordering::Relaxed))
      .finish_non_exhaustive()
  }
}
