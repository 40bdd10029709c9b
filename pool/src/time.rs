use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

// The single, static reference point for all timestamps in the pool.
// It is initialized lazily on its first use.
static POOL_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Returns the current time as nanoseconds since the pool's epoch.
#[inline]
pub(crate) fn now_nanos() -> u64 {
  Instant::now().saturating_duration_since(*POOL_EPOCH).as_nanos() as u64
}

/// Converts a nanosecond timestamp back into an `Instant`.
#[inline]
pub(crate) fn nanos_to_instant(nanos: u64) -> Instant {
  *POOL_EPOCH + Duration::from_nanos(nanos)
}
