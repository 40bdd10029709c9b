use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for the pool.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub struct Metrics {
  // --- Lookups ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  // --- Factory activity ---
  pub(crate) loads: CachePadded<AtomicU64>,
  pub(crate) load_failures: CachePadded<AtomicU64>,

  // --- Removals, by reason ---
  pub(crate) removed_explicit: CachePadded<AtomicU64>,
  pub(crate) removed_expired: CachePadded<AtomicU64>,
  pub(crate) removed_replaced: CachePadded<AtomicU64>,
  pub(crate) removed_cleared: CachePadded<AtomicU64>,

  // --- Contention ---
  pub(crate) expired_races: CachePadded<AtomicU64>,

  // --- Writes ---
  pub(crate) inserts: CachePadded<AtomicU64>,

  created_at: Instant,
}

// Manual implementation of Default to handle the non-default `Instant`.
impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      loads: CachePadded::new(AtomicU64::new(0)),
      load_failures: CachePadded::new(AtomicU64::new(0)),
      removed_explicit: CachePadded::new(AtomicU64::new(0)),
      removed_expired: CachePadded::new(AtomicU64::new(0)),
      removed_replaced: CachePadded::new(AtomicU64::new(0)),
      removed_cleared: CachePadded::new(AtomicU64::new(0)),
      expired_races: CachePadded::new(AtomicU64::new(0)),
      inserts: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      loads: self.loads.load(Ordering::Relaxed),
      load_failures: self.load_failures.load(Ordering::Relaxed),
      removed_explicit: self.removed_explicit.load(Ordering::Relaxed),
      removed_expired: self.removed_expired.load(Ordering::Relaxed),
      removed_replaced: self.removed_replaced.load(Ordering::Relaxed),
      removed_cleared: self.removed_cleared.load(Ordering::Relaxed),
      expired_races: self.expired_races.load(Ordering::Relaxed),
      inserts: self.inserts.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the pool's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// The number of lookups that found a live slot.
  pub hits: u64,
  /// The number of lookups that had to create a slot (or found none).
  pub misses: u64,
  /// The pool hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  /// The number of successful factory invocations.
  pub loads: u64,
  /// The number of factory invocations that returned an error.
  pub load_failures: u64,
  /// Slots removed by explicit `remove` calls.
  pub removed_explicit: u64,
  /// Slots removed by the eviction sweeper.
  pub removed_expired: u64,
  /// Slots displaced by `insert`.
  pub removed_replaced: u64,
  /// Slots removed by `clear`.
  pub removed_cleared: u64,
  /// Lookups that found a slot mid-removal and retried.
  pub expired_races: u64,
  /// The number of direct `insert` calls.
  pub inserts: u64,
  /// The number of seconds the pool has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("loads", &self.loads)
      .field("load_failures", &self.load_failures)
      .field("removed_explicit", &self.removed_explicit)
      .field("removed_expired", &self.removed_expired)
      .field("removed_replaced", &self.removed_replaced)
      .field("removed_cleared", &self.removed_cleared)
      .field("expired_races", &self.expired_races)
      .field("inserts", &self.inserts)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
