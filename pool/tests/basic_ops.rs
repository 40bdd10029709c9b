use slotpool::PoolBuilder;

#[test]
fn test_get_loads_through_default_factory_once() {
  let pool = PoolBuilder::<i32, i32>::new()
    .factory(|key: &i32| Ok(key * 10))
    .build()
    .unwrap();

  let item = pool.get(&5).unwrap().expect("default factory should create the slot");
  assert_eq!(*item.key(), 5);
  assert_eq!(*item.value().unwrap(), 50);

  // Second lookup is a hit; the factory does not run again.
  let item = pool.get(&5).unwrap().unwrap();
  assert_eq!(*item.value().unwrap(), 50);

  let metrics = pool.metrics();
  assert_eq!(metrics.misses, 1);
  assert_eq!(metrics.hits, 1);
  assert_eq!(metrics.loads, 1, "factory should run exactly once");
}

#[test]
fn test_get_without_any_factory_returns_none() {
  let pool = PoolBuilder::<&str, String>::new().build().unwrap();

  assert!(pool.get(&"missing").unwrap().is_none());
  assert_eq!(pool.len(), 0);
  assert_eq!(pool.metrics().misses, 1);
}

#[test]
fn test_get_with_overrides_default_factory() {
  let pool = PoolBuilder::<&str, i32>::new()
    .factory(|_key: &&str| Ok(1))
    .build()
    .unwrap();

  let item = pool.get_with(&"a", |_key| Ok(2)).unwrap();
  assert_eq!(*item.value().unwrap(), 2, "per-call factory should win");

  // The slot is already live; neither factory runs for the next lookup.
  let item = pool.get(&"a").unwrap().unwrap();
  assert_eq!(*item.value().unwrap(), 2);
  assert_eq!(pool.metrics().loads, 1);
}

#[test]
fn test_insert_makes_value_available_without_factory() {
  let pool = PoolBuilder::<&str, String>::new().build().unwrap();

  pool.insert("k", "direct".to_string());
  let item = pool.get(&"k").unwrap().unwrap();
  assert_eq!(*item.value().unwrap(), "direct");
  assert_eq!(pool.metrics().inserts, 1);
}

#[test]
fn test_remove_reports_presence() {
  let pool = PoolBuilder::<i32, i32>::new()
    .factory(|key: &i32| Ok(*key))
    .build()
    .unwrap();

  pool.get(&1).unwrap();
  assert!(pool.remove(&1));
  assert!(!pool.remove(&1), "second remove should find nothing");
  assert!(!pool.remove(&2), "never-created key should report not-found");
  assert_eq!(pool.metrics().removed_explicit, 1);
}

#[test]
fn test_len_keys_contains() {
  let pool = PoolBuilder::<i32, i32>::new()
    .factory(|key: &i32| Ok(*key))
    .build()
    .unwrap();

  assert!(pool.is_empty());
  for key in 0..4 {
    pool.get(&key).unwrap();
  }
  assert_eq!(pool.len(), 4);
  assert!(pool.contains_key(&2));
  assert!(!pool.contains_key(&9));

  let mut keys = pool.keys();
  keys.sort_unstable();
  assert_eq!(keys, vec![0, 1, 2, 3]);
}

#[test]
fn test_clear_empties_the_pool() {
  let pool = PoolBuilder::<i32, i32>::new()
    .factory(|key: &i32| Ok(*key))
    .build()
    .unwrap();

  for key in 0..10 {
    pool.get(&key).unwrap();
  }
  pool.clear();
  assert!(pool.is_empty());
  assert_eq!(pool.metrics().removed_cleared, 10);

  // A fresh slot is created for a previously cleared key.
  assert_eq!(*pool.get(&3).unwrap().unwrap().value().unwrap(), 3);
}

#[test]
fn test_zero_lifetime_is_rejected() {
  use std::time::Duration;

  let result = PoolBuilder::<i32, i32>::new()
    .lifetime(Duration::ZERO)
    .build();
  assert!(matches!(result, Err(slotpool::BuildError::ZeroLifetime)));

  let pool = PoolBuilder::<i32, i32>::new().build().unwrap();
  assert!(pool.set_lifetime(Some(Duration::ZERO)).is_err());
  assert!(pool.set_lifetime(Some(Duration::from_secs(1))).is_ok());
  assert_eq!(pool.lifetime(), Some(Duration::from_secs(1)));
}
