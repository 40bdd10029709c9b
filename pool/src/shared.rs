use crate::listener::{RemovalListener, RemovalReason};
use crate::metrics::Metrics;
use crate::slot::{Factory, Slot};
use crate::store::Store;
use crate::task::sweeper::Sweeper;
use crate::time;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

/// Timing parameters for the pool's internal maintenance.
///
/// The defaults suit lifetimes measured in seconds or longer; tests shrink
/// them through the hidden builder knobs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tuning {
  /// Tolerance applied when collecting sweep victims, so a slot expiring
  /// just after the timer fires is taken in the same sweep instead of
  /// forcing an immediate re-arm.
  pub(crate) expiry_fuzz: Duration,
  /// Lower bound on the delay until the next sweep, limiting timer churn.
  pub(crate) sweep_floor: Duration,
  /// Backoff before a lookup retries after losing a race with a removal.
  pub(crate) retry_backoff: Duration,
  /// Bound on the structural write acquisition in `remove`.
  pub(crate) remove_lock_timeout: Duration,
  /// Backoff between `clear` passes when slot locks were unavailable.
  pub(crate) clear_backoff: Duration,
  /// Number of passes `clear` makes before leaving locked slots behind.
  pub(crate) clear_max_passes: usize,
}

impl Default for Tuning {
  fn default() -> Self {
    Self {
      expiry_fuzz: Duration::from_millis(250),
      sweep_floor: Duration::from_millis(750),
      retry_backoff: Duration::from_millis(10),
      remove_lock_timeout: Duration::from_millis(30),
      clear_backoff: Duration::from_millis(5),
      clear_max_passes: 8,
    }
  }
}

/// The part of the pool shared between handles and the sweeper thread.
///
/// Holding this behind its own `Arc` (rather than handing the sweeper the
/// whole `PoolShared`) keeps the ownership acyclic: `PoolShared` owns the
/// sweeper, the sweeper thread holds only the core.
pub(crate) struct PoolCore<K, V, H> {
  pub(crate) store: Store<K, V, H>,
  /// Slot lifetime in nanoseconds; zero disables eviction.
  lifetime_nanos: AtomicU64,
  pub(crate) listener: Option<Arc<dyn RemovalListener<K, V>>>,
  pub(crate) metrics: Arc<Metrics>,
  pub(crate) tuning: Tuning,
}

impl<K, V, H> fmt::Debug for PoolCore<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PoolCore")
      .field("lifetime", &self.lifetime())
      .field("has_listener", &self.listener.is_some())
      .field("tuning", &self.tuning)
      .finish_non_exhaustive()
  }
}

impl<K, V, H> PoolCore<K, V, H> {
  pub(crate) fn new(
    hasher: H,
    lifetime: Option<Duration>,
    listener: Option<Arc<dyn RemovalListener<K, V>>>,
    tuning: Tuning,
  ) -> Self {
    Self {
      store: Store::new(hasher),
      lifetime_nanos: AtomicU64::new(lifetime.map_or(0, duration_to_nanos)),
      listener,
      metrics: Arc::new(Metrics::new()),
      tuning,
    }
  }

  /// The configured slot lifetime, or `None` when eviction is disabled.
  pub(crate) fn lifetime(&self) -> Option<Duration> {
    self.lifetime_nanos().map(Duration::from_nanos)
  }

  pub(crate) fn lifetime_nanos(&self) -> Option<u64> {
    match self.lifetime_nanos.load(Ordering::Relaxed) {
      0 => None,
      nanos => Some(nanos),
    }
  }

  pub(crate) fn store_lifetime(&self, lifetime: Option<Duration>) {
    self
      .lifetime_nanos
      .store(lifetime.map_or(0, duration_to_nanos), Ordering::Relaxed);
  }

  fn note_removal(&self, reason: RemovalReason) {
    let counter = match reason {
      RemovalReason::Explicit => &self.metrics.removed_explicit,
      RemovalReason::Expired => &self.metrics.removed_expired,
      RemovalReason::Replaced => &self.metrics.removed_replaced,
      RemovalReason::Cleared => &self.metrics.removed_cleared,
    };
    counter.fetch_add(1, Ordering::Relaxed);
  }
}

impl<K, V, H> PoolCore<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  /// Removes one slot through the canonical path: blocking slot lock,
  /// `expired` re-validation, bounded structural write, erase, mark,
  /// notify. Every removal in the pool (explicit, sweep, clear via its own
  /// variant) funnels through these steps.
  ///
  /// Returns `false` when the key is absent, the slot was already removed
  /// by another path, or the structural lock did not become available
  /// within the bound (the caller may simply try again later).
  pub(crate) fn remove_slot(&self, key: &K, reason: RemovalReason, notify: bool) -> bool {
    let slot = match self.store.read().get(key) {
      Some(slot) => slot.clone(),
      None => return false,
    };

    let state = slot.lock();
    if slot.is_expired() {
      // Lost the race: another path removed this slot after our lookup.
      return false;
    }

    {
      // Bounded: a concurrent `clear` holds the structural write lock while
      // probing this very slot's lock, so waiting here must not be
      // unbounded.
      let mut entries = match self.store.try_write_for(self.tuning.remove_lock_timeout) {
        Some(entries) => entries,
        None => {
          trace!("structural lock unavailable, deferring removal");
          return false;
        }
      };
      match entries.get(key) {
        Some(current) if Arc::ptr_eq(current, &slot) => {
          entries.remove(key);
        }
        // A newer slot owns this key now; its own removal path is
        // responsible for it.
        _ => return false,
      }
    }

    slot.set_expired();
    self.note_removal(reason);
    if notify {
      if let (Some(listener), Some(value)) = (&self.listener, &state.value) {
        listener.on_remove(slot.key().clone(), value.clone(), reason);
      }
    }
    true
  }

  /// Drains the pool. Best-effort: slot locks are only probed, never
  /// waited on, while the structural write lock is held (a factory may be
  /// hung); slots whose locks never free up within the pass budget are
  /// left for a later call.
  pub(crate) fn clear(&self, notify: bool) {
    for pass in 0..self.tuning.clear_max_passes {
      let mut pending: Vec<(K, Arc<V>)> = Vec::new();
      let mut skipped = 0usize;

      {
        let mut entries = self.store.write();
        if entries.is_empty() {
          return;
        }
        let snapshot: Vec<(K, Arc<Slot<K, V>>)> = entries
          .iter()
          .map(|(key, slot)| (key.clone(), slot.clone()))
          .collect();

        for (key, slot) in snapshot {
          match slot.try_lock() {
            Some(state) => {
              if !slot.is_expired() {
                entries.remove(&key);
                slot.set_expired();
                self.note_removal(RemovalReason::Cleared);
                if notify && self.listener.is_some() {
                  if let Some(value) = &state.value {
                    pending.push((key, value.clone()));
                  }
                }
              }
            }
            None => skipped += 1,
          }
        }
      }

      // Deliver callbacks only after the structural write guard is gone, so
      // a listener that re-enters the pool cannot deadlock against us.
      if let Some(listener) = &self.listener {
        for (key, value) in pending {
          listener.on_remove(key, value, RemovalReason::Cleared);
        }
      }

      if skipped == 0 {
        return;
      }
      debug!(pass, skipped, "clear pass left locked slots, retrying");
      thread::sleep(self.tuning.clear_backoff);
    }

    warn!("clear gave up on slots whose locks never became available");
  }

  /// One eviction sweep: snapshot candidates under the structural read
  /// lock, remove each through the canonical path, then compute the next
  /// firing time. Returns `None` when the pool is empty or eviction is
  /// disabled (the timer parks until the next arm).
  pub(crate) fn sweep(&self) -> Option<Instant> {
    let lifetime = self.lifetime_nanos()?;
    let now = time::now_nanos();
    let horizon = now.saturating_add(duration_to_nanos(self.tuning.expiry_fuzz));

    let victims: Vec<K> = {
      let entries = self.store.read();
      entries
        .iter()
        .filter(|(_, slot)| !slot.is_expired() && slot.deadline_nanos(lifetime) <= horizon)
        .map(|(key, _)| key.clone())
        .collect()
    };

    let mut removed = 0usize;
    for key in &victims {
      if self.remove_slot(key, RemovalReason::Expired, true) {
        removed += 1;
      }
    }
    if removed > 0 {
      debug!(removed, "expiry sweep removed slots");
    }

    // Lifetime may have been reconfigured mid-sweep; re-read it for the
    // re-arm computation.
    let lifetime = self.lifetime_nanos()?;
    let next = self.min_deadline_nanos(lifetime)?;
    let floor = time::now_nanos().saturating_add(duration_to_nanos(self.tuning.sweep_floor));
    Some(time::nanos_to_instant(next.max(floor)))
  }

  /// The earliest eviction deadline among live slots, in epoch nanoseconds.
  pub(crate) fn min_deadline_nanos(&self, lifetime_nanos: u64) -> Option<u64> {
    let entries = self.store.read();
    entries
      .values()
      .filter(|slot| !slot.is_expired())
      .map(|slot| slot.deadline_nanos(lifetime_nanos))
      .min()
  }
}

/// The pool's full shared state: the core plus the pieces only handles
/// need (default factory, load mode, the sweeper's control handle).
pub(crate) struct PoolShared<K, V, H> {
  pub(crate) core: Arc<PoolCore<K, V, H>>,
  pub(crate) default_factory: Option<Factory<K, V>>,
  pub(crate) lazy_load: bool,
  pub(crate) sweeper: Option<Sweeper>,
}

impl<K, V, H> PoolShared<K, V, H> {
  /// Proposes a firing time to the sweeper; the earliest proposal wins.
  pub(crate) fn arm(&self, deadline: Instant) {
    if let Some(sweeper) = &self.sweeper {
      sweeper.arm(deadline);
    }
  }
}

impl<K, V, H> fmt::Debug for PoolShared<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PoolShared")
      .field("core", &self.core)
      .field("lazy_load", &self.lazy_load)
      .field("has_default_factory", &self.default_factory.is_some())
      .finish_non_exhaustive()
  }
}

impl<K, V, H> Drop for PoolShared<K, V, H> {
  fn drop(&mut self) {
    if let Some(sweeper) = self.sweeper.take() {
      sweeper.stop();
    }
  }
}

#[inline]
pub(crate) fn duration_to_nanos(duration: Duration) -> u64 {
  u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
