use crate::error::{BuildError, FactoryError, PoolError};
use crate::listener::RemovalReason;
use crate::metrics::MetricsSnapshot;
use crate::resource::Resource;
use crate::shared::PoolShared;
use crate::slot::{Factory, Slot};
use crate::time;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{trace, warn};

/// A thread-safe, keyed resource pool.
///
/// Cloning a `Pool` is cheap and yields another handle to the same pool.
pub struct Pool<K, V, H = ahash::RandomState> {
  pub(crate) shared: Arc<PoolShared<K, V, H>>,
}

impl<K, V, H> Clone for Pool<K, V, H> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<K, V, H> fmt::Debug for Pool<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Pool")
      .field("shared", &self.shared)
      .finish_non_exhaustive()
  }
}

impl<K, V, H> Pool<K, V, H>
where
  K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Send + Sync + 'static,
{
  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.core.metrics.snapshot()
  }

  /// Looks up the slot for `key`, creating and loading it through the
  /// pool's default factory on a miss, and refreshes its idle timestamp.
  ///
  /// Returns `None` only when the key is absent and no default factory was
  /// configured. Exactly one caller's factory runs for a missing key;
  /// concurrent callers block on the slot's lock and observe the same
  /// value. A factory error discards the slot and is returned to this
  /// caller only; the next lookup starts fresh.
  pub fn get(&self, key: &K) -> Result<Option<Resource<K, V>>, PoolError> {
    self.get_inner(key, None, true)
  }

  /// Like `get`, but does not refresh the slot's idle timestamp.
  pub fn peek(&self, key: &K) -> Result<Option<Resource<K, V>>, PoolError> {
    self.get_inner(key, None, false)
  }

  /// Looks up the slot for `key`, creating it with the supplied factory on
  /// a miss (the factory overrides the pool default for this call).
  pub fn get_with<F>(&self, key: &K, factory: F) -> Result<Resource<K, V>, PoolError>
  where
    F: Fn(&K) -> Result<V, FactoryError> + Send + Sync + 'static,
  {
    let factory: Factory<K, V> = Arc::new(factory);
    let resource = self.get_inner(key, Some(factory), true)?;
    // A supplied factory always yields a slot.
    Ok(resource.expect("lookup with a factory returned no slot"))
  }

  /// Like `get_with`, but does not refresh the slot's idle timestamp.
  pub fn peek_with<F>(&self, key: &K, factory: F) -> Result<Resource<K, V>, PoolError>
  where
    F: Fn(&K) -> Result<V, FactoryError> + Send + Sync + 'static,
  {
    let factory: Factory<K, V> = Arc::new(factory);
    let resource = self.get_inner(key, Some(factory), false)?;
    Ok(resource.expect("lookup with a factory returned no slot"))
  }

  fn get_inner(
    &self,
    key: &K,
    factory: Option<Factory<K, V>>,
    touch: bool,
  ) -> Result<Option<Resource<K, V>>, PoolError> {
    let core = &self.shared.core;

    loop {
      let (slot, created) = match self.lookup_or_create(key, factory.as_ref()) {
        Some(found) => found,
        None => {
          core.metrics.misses.fetch_add(1, Ordering::Relaxed);
          return Ok(None);
        }
      };

      let mut state = slot.lock();
      if slot.is_expired() {
        // The slot was removed between our lookup and acquiring its lock.
        // Expiration races freely with lookup; back off and start over.
        drop(state);
        drop(slot);
        core.metrics.expired_races.fetch_add(1, Ordering::Relaxed);
        thread::sleep(core.tuning.retry_backoff);
        continue;
      }

      if created {
        core.metrics.misses.fetch_add(1, Ordering::Relaxed);
      } else {
        core.metrics.hits.fetch_add(1, Ordering::Relaxed);
      }

      let resolved = if self.shared.lazy_load {
        None
      } else {
        let freshly_loaded = state.value.is_none();
        match slot.ensure_loaded(&mut state) {
          Ok(value) => {
            if freshly_loaded {
              core.metrics.loads.fetch_add(1, Ordering::Relaxed);
            }
            Some(value)
          }
          Err(err) => {
            core.metrics.load_failures.fetch_add(1, Ordering::Relaxed);
            // Take the failed slot out of circulation before surfacing the
            // error. Expire first, unmap after the slot guard is gone: a
            // slot-lock holder never waits on the structural lock.
            slot.set_expired();
            drop(state);
            {
              let mut entries = core.store.write();
              if let Some(current) = entries.get(key) {
                if Arc::ptr_eq(current, &slot) {
                  entries.remove(key);
                }
              }
            }
            warn!(key = ?key, "factory failed, slot discarded");
            return Err(err);
          }
        }
      };

      if touch {
        // The first access consumes the new flag without refreshing the
        // timestamp: creation already stamped it.
        if !slot.take_new() {
          slot.touch();
        }
      }
      drop(state);

      return Ok(Some(Resource::new(slot, resolved, core.metrics.clone())));
    }
  }

  /// Structural-read fast path, then double-checked creation under the
  /// structural write lock. The racer that loses the double-check simply
  /// uses the winner's slot. Returns the slot and whether this call
  /// created it, or `None` when the key is absent and no factory applies.
  fn lookup_or_create(
    &self,
    key: &K,
    factory: Option<&Factory<K, V>>,
  ) -> Option<(Arc<Slot<K, V>>, bool)> {
    let core = &self.shared.core;

    if let Some(slot) = core.store.read().get(key) {
      return Some((slot.clone(), false));
    }

    let factory = factory.or(self.shared.default_factory.as_ref())?.clone();

    let mut entries = core.store.write();
    if let Some(slot) = entries.get(key) {
      return Some((slot.clone(), false));
    }

    let slot = Arc::new(Slot::new(key.clone(), factory));
    let was_empty = entries.is_empty();
    entries.insert(key.clone(), slot.clone());
    drop(entries);
    trace!(key = ?key, "slot created");

    if was_empty {
      // First entry in an empty pool (re)arms the eviction timer.
      if let Some(lifetime) = core.lifetime_nanos() {
        let deadline = time::now_nanos().saturating_add(lifetime);
        self.shared.arm(time::nanos_to_instant(deadline));
      }
    }

    Some((slot, true))
  }

  /// Stores an already-computed value for `key`, displacing any live slot
  /// (reported to the removal listener as `Replaced`).
  pub fn insert(&self, key: K, value: V) {
    let core = &self.shared.core;
    let slot = Arc::new(Slot::preloaded(key.clone(), value));

    let (displaced, was_empty) = {
      let mut entries = core.store.write();
      let was_empty = entries.is_empty();
      (entries.insert(key, slot), was_empty)
    };
    core.metrics.inserts.fetch_add(1, Ordering::Relaxed);

    if was_empty {
      if let Some(lifetime) = core.lifetime_nanos() {
        let deadline = time::now_nanos().saturating_add(lifetime);
        self.shared.arm(time::nanos_to_instant(deadline));
      }
    }

    if let Some(old) = displaced {
      // The old slot is already unmapped; mark it expired under its own
      // lock, taken with no structural lock held.
      let state = old.lock();
      if !old.is_expired() {
        old.set_expired();
        core.metrics.removed_replaced.fetch_add(1, Ordering::Relaxed);
        if let (Some(listener), Some(value)) = (&core.listener, &state.value) {
          listener.on_remove(old.key().clone(), value.clone(), RemovalReason::Replaced);
        }
      }
    }
  }

  /// Removes the slot for `key`, reporting `Explicit` to the listener.
  ///
  /// Returns `false` when the key is absent, another path removed the slot
  /// first, or the structural lock stayed contended past a short bound
  /// (try again later).
  pub fn remove(&self, key: &K) -> bool {
    self.shared.core.remove_slot(key, RemovalReason::Explicit, true)
  }

  /// Drains the pool, reporting `Cleared` for every loaded slot.
  ///
  /// Best-effort with respect to slots whose locks are held by hung
  /// factories: those are retried a bounded number of passes, then left
  /// for a later call.
  pub fn clear(&self) {
    self.shared.core.clear(true);
  }

  /// Like `clear`, without invoking the removal listener.
  pub fn clear_silent(&self) {
    self.shared.core.clear(false);
  }

  /// The number of live slots. Point-in-time.
  pub fn len(&self) -> usize {
    self.shared.core.store.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.shared.core.store.read().is_empty()
  }

  /// Whether a live slot exists for `key`. Point-in-time.
  pub fn contains_key(&self, key: &K) -> bool {
    self
      .shared
      .core
      .store
      .read()
      .get(key)
      .map_or(false, |slot| !slot.is_expired())
  }

  /// A point-in-time snapshot of the live keys.
  pub fn keys(&self) -> Vec<K> {
    self.shared.core.store.read().keys().cloned().collect()
  }

  /// The configured slot lifetime, or `None` when eviction is disabled.
  pub fn lifetime(&self) -> Option<Duration> {
    self.shared.core.lifetime()
  }

  /// Reconfigures the slot lifetime. `None` disables eviction; a zero
  /// duration is rejected before any lock is taken.
  ///
  /// Shrinking the lifetime (including enabling eviction on a previously
  /// unbounded pool) immediately re-arms the eviction timer at the new
  /// earliest deadline. Growing it does not: the pending firing finds
  /// nothing expired and reschedules itself correctly.
  pub fn set_lifetime(&self, lifetime: Option<Duration>) -> Result<(), BuildError> {
    if matches!(lifetime, Some(duration) if duration.is_zero()) {
      return Err(BuildError::ZeroLifetime);
    }

    let core = &self.shared.core;
    let previous = core.lifetime();
    core.store_lifetime(lifetime);

    let shrunk = match (previous, lifetime) {
      (_, None) => false,
      (None, Some(_)) => true,
      (Some(old), Some(new)) => new < old,
    };
    if shrunk {
      if let Some(nanos) = core.lifetime_nanos() {
        if let Some(deadline) = core.min_deadline_nanos(nanos) {
          self.shared.arm(time::nanos_to_instant(deadline));
        }
      }
    }
    Ok(())
  }
}
