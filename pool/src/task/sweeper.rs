use crate::shared::PoolCore;

use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

/// The background task that evicts expired slots.
///
/// One thread per pool, parked until the earliest known expiration
/// deadline. The pool proposes deadlines through `arm` (first insertion
/// into an empty pool, lifetime shrinkage); after each sweep the thread
/// re-arms itself for the new earliest deadline, so at most one firing is
/// ever pending.
pub(crate) struct Sweeper {
  state: Arc<SweepState>,
  _handle: JoinHandle<()>,
}

struct SweepState {
  inner: Mutex<SweepInner>,
  cond: Condvar,
}

struct SweepInner {
  /// The next firing time; `None` parks the thread indefinitely.
  deadline: Option<Instant>,
  stop: bool,
}

impl Sweeper {
  /// Spawns the sweeper thread. It holds only the pool core, so dropping
  /// the last handle still tears the pool down.
  pub(crate) fn spawn<K, V, H>(core: Arc<PoolCore<K, V, H>>) -> Self
  where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: BuildHasher + Send + Sync + 'static,
  {
    let state = Arc::new(SweepState {
      inner: Mutex::new(SweepInner {
        deadline: None,
        stop: false,
      }),
      cond: Condvar::new(),
    });

    let thread_state = state.clone();
    let handle = thread::spawn(move || run(thread_state, core));

    Self {
      state,
      _handle: handle,
    }
  }

  /// Proposes a firing time; the earliest outstanding proposal wins.
  pub(crate) fn arm(&self, deadline: Instant) {
    let mut inner = self.state.inner.lock();
    if inner.deadline.map_or(true, |current| deadline < current) {
      inner.deadline = Some(deadline);
      self.state.cond.notify_one();
    }
  }

  /// Signals the sweeper thread to exit.
  pub(crate) fn stop(self) {
    let mut inner = self.state.inner.lock();
    inner.stop = true;
    self.state.cond.notify_one();
  }
}

fn run<K, V, H>(state: Arc<SweepState>, core: Arc<PoolCore<K, V, H>>)
where
  K: Eq + Hash + Clone + Send + Sync,
  V: Send + Sync,
  H: BuildHasher + Send + Sync,
{
  loop {
    {
      let mut inner = state.inner.lock();
      loop {
        if inner.stop {
          trace!("sweeper stopping");
          return;
        }
        match inner.deadline {
          None => state.cond.wait(&mut inner),
          Some(deadline) => {
            if Instant::now() >= deadline {
              // Consume the deadline before sweeping: an arm that lands
              // while the sweep runs is merged afterwards instead of lost.
              inner.deadline = None;
              break;
            }
            let _ = state.cond.wait_until(&mut inner, deadline);
          }
        }
      }
    }

    if let Some(next) = core.sweep() {
      let mut inner = state.inner.lock();
      if inner.deadline.map_or(true, |current| next < current) {
        inner.deadline = Some(next);
      }
    }
  }
}
