use std::fmt;
use std::sync::Arc;

/// Describes the reason a slot was removed from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
  /// The slot was removed by an explicit `remove` call.
  Explicit,
  /// The slot was removed because its lifetime elapsed without a touch.
  Expired,
  /// The slot was displaced by an `insert` for the same key.
  Replaced,
  /// The slot was removed by `clear`.
  Cleared,
}

impl fmt::Display for RemovalReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RemovalReason::Explicit => write!(f, "explicitly removed"),
      RemovalReason::Expired => write!(f, "expired"),
      RemovalReason::Replaced => write!(f, "replaced by insert"),
      RemovalReason::Cleared => write!(f, "cleared"),
    }
  }
}

/// A listener that can be registered with the pool to observe removals.
///
/// `on_remove` is invoked synchronously on the thread performing the
/// removal, never while the pool's structural lock is held, so a listener
/// may re-enter the pool. Only slots that hold a loaded value are reported.
pub trait RemovalListener<K, V>: Send + Sync {
  fn on_remove(&self, key: K, value: Arc<V>, reason: RemovalReason);
}
