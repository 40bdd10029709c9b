use slotpool::PoolBuilder;
use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Barrier,
};
use std::thread;
use std::time::Duration;

#[test]
fn test_clear_drains_in_one_pass_when_uncontended() {
  let pool = PoolBuilder::<i32, i32>::new()
    .factory(|key: &i32| Ok(*key))
    .build()
    .unwrap();

  for key in 0..100 {
    pool.get(&key).unwrap();
  }
  pool.clear();

  assert!(pool.is_empty());
  assert_eq!(pool.metrics().removed_cleared, 100);
}

#[test]
fn test_clear_skips_slots_held_by_a_slow_factory() {
  let factory_entered = Arc::new(Barrier::new(2));
  let release_factory = Arc::new(AtomicBool::new(false));

  let pool = Arc::new(
    PoolBuilder::<&str, i32>::new()
      .clear_retries(Duration::from_millis(2), 3)
      .build()
      .unwrap(),
  );

  // This slot can be cleared immediately.
  pool.insert("fast", 1);

  let loader = {
    let pool = pool.clone();
    let factory_entered = factory_entered.clone();
    let release_factory = release_factory.clone();
    thread::spawn(move || {
      let item = pool
        .get_with(&"slow", move |_key| {
          factory_entered.wait();
          while !release_factory.load(Ordering::Acquire) {
            thread::sleep(Duration::from_millis(1));
          }
          Ok(2)
        })
        .unwrap();
      *item.value().unwrap()
    })
  };

  // Wait until the factory is definitely running under its slot lock.
  factory_entered.wait();
  pool.clear();

  // The held slot was skipped after the pass budget; the other was drained.
  assert_eq!(pool.len(), 1);
  assert!(pool.contains_key(&"slow"));
  assert!(!pool.contains_key(&"fast"));

  release_factory.store(true, Ordering::Release);
  assert_eq!(loader.join().unwrap(), 2);

  // With the factory finished, a second clear drains the survivor.
  pool.clear();
  assert!(pool.is_empty());
}
