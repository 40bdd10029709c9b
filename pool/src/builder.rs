use crate::error::{BuildError, FactoryError};
use crate::handle::Pool;
use crate::listener::RemovalListener;
use crate::shared::{PoolCore, PoolShared, Tuning};
use crate::slot::Factory;
use crate::task::sweeper::Sweeper;

use core::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Duration;

/// A builder for creating `Pool` instances.
///
/// ```
/// use slotpool::PoolBuilder;
/// use std::time::Duration;
///
/// let pool = PoolBuilder::<String, u64>::new()
///   .factory(|key: &String| Ok(key.len() as u64))
///   .lifetime(Duration::from_secs(300))
///   .build()
///   .unwrap();
///
/// let item = pool.get(&"hello".to_string()).unwrap().unwrap();
/// assert_eq!(*item.value().unwrap(), 5);
/// ```
pub struct PoolBuilder<K, V, H = ahash::RandomState> {
  lifetime: Option<Duration>,
  lazy_load: bool,
  hasher: H,
  factory: Option<Factory<K, V>>,
  listener: Option<Arc<dyn RemovalListener<K, V>>>,
  tuning: Tuning,
}

impl<K, V, H> fmt::Debug for PoolBuilder<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PoolBuilder")
      .field("lifetime", &self.lifetime)
      .field("lazy_load", &self.lazy_load)
      .field("has_factory", &self.factory.is_some())
      .field("has_listener", &self.listener.is_some())
      .finish_non_exhaustive()
  }
}

impl<K, V> PoolBuilder<K, V, ahash::RandomState> {
  pub fn new() -> Self {
    Self {
      lifetime: None,
      lazy_load: false,
      hasher: ahash::RandomState::new(),
      factory: None,
      listener: None,
      tuning: Tuning::default(),
    }
  }
}

impl<K, V> Default for PoolBuilder<K, V, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V, H> PoolBuilder<K, V, H> {
  /// Sets the default factory, invoked by `get`/`peek` on a miss.
  ///
  /// Without one, `get` on a missing key returns `None` (a per-call
  /// factory can still be supplied through `get_with`).
  pub fn factory(mut self, f: impl Fn(&K) -> Result<V, FactoryError> + Send + Sync + 'static) -> Self {
    self.factory = Some(Arc::new(f));
    self
  }

  /// Sets the sliding lifetime after which an untouched slot is evicted.
  ///
  /// The pool is unbounded by default (no eviction). A zero duration is
  /// rejected at `build` time.
  pub fn lifetime(mut self, duration: Duration) -> Self {
    self.lifetime = Some(duration);
    self
  }

  /// Sets the removal listener for the pool.
  pub fn removal_listener<L>(mut self, listener: L) -> Self
  where
    L: RemovalListener<K, V> + 'static,
  {
    self.listener = Some(Arc::new(listener));
    self
  }

  /// Defers factory invocation from `get` to the first `Resource::value`
  /// call. Off by default.
  pub fn lazy_loading(mut self, enabled: bool) -> Self {
    self.lazy_load = enabled;
    self
  }

  /// Replaces the hasher used by the key→slot map.
  pub fn hasher<H2>(self, hasher: H2) -> PoolBuilder<K, V, H2> {
    PoolBuilder {
      lifetime: self.lifetime,
      lazy_load: self.lazy_load,
      hasher,
      factory: self.factory,
      listener: self.listener,
      tuning: self.tuning,
    }
  }

  /// Sets the tolerance applied when collecting sweep victims.
  /// (Primarily for testing purposes.)
  #[doc(hidden)]
  pub fn expiry_fuzz(mut self, duration: Duration) -> Self {
    self.tuning.expiry_fuzz = duration;
    self
  }

  /// Sets the minimum delay between consecutive eviction sweeps.
  /// (Primarily for testing purposes.)
  #[doc(hidden)]
  pub fn sweep_floor(mut self, duration: Duration) -> Self {
    self.tuning.sweep_floor = duration;
    self
  }

  /// Sets the backoff before a lookup retries after losing a race with a
  /// removal. (Primarily for testing purposes.)
  #[doc(hidden)]
  pub fn retry_backoff(mut self, duration: Duration) -> Self {
    self.tuning.retry_backoff = duration;
    self
  }

  /// Sets the bound on the structural write acquisition in `remove`.
  /// (Primarily for testing purposes.)
  #[doc(hidden)]
  pub fn remove_lock_timeout(mut self, duration: Duration) -> Self {
    self.tuning.remove_lock_timeout = duration;
    self
  }

  /// Sets the backoff and pass budget `clear` uses for slots whose locks
  /// are unavailable. (Primarily for testing purposes.)
  #[doc(hidden)]
  pub fn clear_retries(mut self, backoff: Duration, max_passes: usize) -> Self {
    self.tuning.clear_backoff = backoff;
    self.tuning.clear_max_passes = max_passes;
    self
  }

  /// Builds the pool and spawns its eviction sweeper.
  pub fn build(self) -> Result<Pool<K, V, H>, BuildError>
  where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: BuildHasher + Send + Sync + 'static,
  {
    if matches!(self.lifetime, Some(duration) if duration.is_zero()) {
      return Err(BuildError::ZeroLifetime);
    }

    let core = Arc::new(PoolCore::new(
      self.hasher,
      self.lifetime,
      self.listener,
      self.tuning,
    ));
    let sweeper = Sweeper::spawn(core.clone());

    Ok(Pool {
      shared: Arc::new(PoolShared {
        core,
        default_factory: self.factory,
        lazy_load: self.lazy_load,
        sweeper: Some(sweeper),
      }),
    })
  }
}
