use slotpool::{PoolBuilder, RemovalListener, RemovalReason};
use std::sync::{mpsc, Arc};
use std::time::Duration;

struct TestListener {
  sender: mpsc::Sender<(String, Arc<i32>, RemovalReason)>,
}

impl TestListener {
  fn channel() -> (Self, mpsc::Receiver<(String, Arc<i32>, RemovalReason)>) {
    let (tx, rx) = mpsc::channel();
    (Self { sender: tx }, rx)
  }
}

impl RemovalListener<String, i32> for TestListener {
  fn on_remove(&self, key: String, value: Arc<i32>, reason: RemovalReason) {
    self.sender.send((key, value, reason)).unwrap();
  }
}

#[test]
fn test_explicit_remove_notifies() {
  let (listener, rx) = TestListener::channel();
  let pool = PoolBuilder::<String, i32>::new()
    .removal_listener(listener)
    .factory(|_key: &String| Ok(41))
    .build()
    .unwrap();

  pool.get(&"k".to_string()).unwrap();
  assert!(pool.remove(&"k".to_string()));

  let (key, value, reason) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
  assert_eq!(key, "k");
  assert_eq!(*value, 41);
  assert_eq!(reason, RemovalReason::Explicit);
}

#[test]
fn test_insert_over_live_slot_notifies_replaced() {
  let (listener, rx) = TestListener::channel();
  let pool = PoolBuilder::<String, i32>::new()
    .removal_listener(listener)
    .build()
    .unwrap();

  pool.insert("k".to_string(), 1);
  pool.insert("k".to_string(), 2);

  let (key, value, reason) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
  assert_eq!(key, "k");
  assert_eq!(*value, 1, "the displaced value is reported");
  assert_eq!(reason, RemovalReason::Replaced);

  assert_eq!(*pool.get(&"k".to_string()).unwrap().unwrap().value().unwrap(), 2);
  assert_eq!(pool.metrics().removed_replaced, 1);
}

#[test]
fn test_clear_notifies_each_loaded_slot() {
  let (listener, rx) = TestListener::channel();
  let pool = PoolBuilder::<String, i32>::new()
    .removal_listener(listener)
    .factory(|_key: &String| Ok(7))
    .build()
    .unwrap();

  for key in ["a", "b", "c"] {
    pool.get(&key.to_string()).unwrap();
  }
  pool.clear();

  let mut cleared: Vec<String> = (0..3)
    .map(|_| {
      let (key, _value, reason) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
      assert_eq!(reason, RemovalReason::Cleared);
      key
    })
    .collect();
  cleared.sort();
  assert_eq!(cleared, vec!["a", "b", "c"]);
}

#[test]
fn test_clear_silent_suppresses_callbacks() {
  let (listener, rx) = TestListener::channel();
  let pool = PoolBuilder::<String, i32>::new()
    .removal_listener(listener)
    .factory(|_key: &String| Ok(7))
    .build()
    .unwrap();

  pool.get(&"a".to_string()).unwrap();
  pool.clear_silent();

  assert!(pool.is_empty());
  assert!(
    rx.recv_timeout(Duration::from_millis(100)).is_err(),
    "no callback should fire for a silent clear"
  );
}

#[test]
fn test_unloaded_slot_is_not_reported() {
  let (listener, rx) = TestListener::channel();
  let pool = PoolBuilder::<String, i32>::new()
    .removal_listener(listener)
    .factory(|_key: &String| Ok(7))
    .lazy_loading(true)
    .build()
    .unwrap();

  // The slot exists but its value was never computed.
  pool.get(&"a".to_string()).unwrap();
  assert!(pool.remove(&"a".to_string()));

  assert!(
    rx.recv_timeout(Duration::from_millis(100)).is_err(),
    "a never-loaded slot has no value to report"
  );
}
