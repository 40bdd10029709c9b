use slotpool::{PoolBuilder, PoolError};
use std::error::Error;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

#[test]
fn test_factory_error_is_wrapped_with_key_context() {
  let pool = PoolBuilder::<String, i32>::new().build().unwrap();

  let err = pool
    .get_with(&"flaky".to_string(), |_key| Err("connection refused".into()))
    .unwrap_err();

  assert!(matches!(&err, PoolError::Factory { .. }));
  let rendered = err.to_string();
  assert!(
    rendered.contains("flaky"),
    "error should name the key, got: {rendered}"
  );
  let source = err.source().expect("the factory's error is preserved");
  assert_eq!(source.to_string(), "connection refused");
}

#[test]
fn test_factory_failure_is_not_cached() {
  let attempts = Arc::new(AtomicUsize::new(0));
  let pool = PoolBuilder::<&str, usize>::new()
    .factory({
      let attempts = attempts.clone();
      move |_key: &&str| {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        if attempt == 0 {
          Err("transient".into())
        } else {
          Ok(attempt)
        }
      }
    })
    .build()
    .unwrap();

  assert!(pool.get(&"k").is_err());
  // The failing slot was discarded, so nothing poisoned is reachable.
  assert!(pool.is_empty());
  assert_eq!(pool.metrics().load_failures, 1);

  // The next lookup creates a fresh slot and retries the factory.
  let item = pool.get(&"k").unwrap().unwrap();
  assert_eq!(*item.value().unwrap(), 1);
  assert_eq!(attempts.load(Ordering::SeqCst), 2);
  assert_eq!(pool.len(), 1);
}

#[test]
fn test_failure_surfaces_only_to_the_failing_caller() {
  let pool = PoolBuilder::<&str, i32>::new().build().unwrap();

  assert!(pool.get_with(&"k", |_key| Err("boom".into())).is_err());

  // A different caller with a working factory is unaffected.
  let item = pool.get_with(&"k", |_key| Ok(3)).unwrap();
  assert_eq!(*item.value().unwrap(), 3);
  assert_eq!(pool.metrics().loads, 1);
}
