use crate::slot::Slot;

use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The key→slot mapping.
pub(crate) type Entries<K, V, H> = HashMap<K, Arc<Slot<K, V>>, H>;

/// The pool's entry map behind its structural lock.
///
/// The structural lock protects only the shape of the mapping
/// (insert/erase); it is held briefly and never across a factory run.
/// Per-key state lives behind each slot's own lock.
pub(crate) struct Store<K, V, H> {
  map: RwLock<Entries<K, V, H>>,
}

impl<K, V, H> fmt::Debug for Store<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Store").finish_non_exhaustive()
  }
}

impl<K, V, H> Store<K, V, H> {
  pub(crate) fn new(hasher: H) -> Self {
    Self {
      map: RwLock::new(HashMap::with_hasher(hasher)),
    }
  }

  /// Shared access for lookups and sweeps.
  #[inline]
  pub(crate) fn read(&self) -> RwLockReadGuard<'_, Entries<K, V, H>> {
    self.map.read()
  }

  /// Exclusive access for insert/erase. Blocks.
  #[inline]
  pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Entries<K, V, H>> {
    self.map.write()
  }

  /// Bounded exclusive acquisition, used on paths that already hold a slot
  /// lock and must not wait indefinitely for the structural lock.
  #[inline]
  pub(crate) fn try_write_for(&self, timeout: Duration) -> Option<RwLockWriteGuard<'_, Entries<K, V, H>>> {
    self.map.try_write_for(timeout)
  }
}
