use std::error::Error;
use std::fmt;

/// The error type a factory may return.
///
/// Boxed so factories can surface any error without the pool being generic
/// over it.
pub type FactoryError = Box<dyn Error + Send + Sync>;

/// Errors that can occur when building or reconfiguring a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
  /// The pool was configured with a zero lifetime. Use an unbounded
  /// lifetime (the default) to disable eviction instead.
  ZeroLifetime,
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::ZeroLifetime => write!(f, "pool lifetime cannot be zero"),
    }
  }
}

impl Error for BuildError {}

/// Errors surfaced by pool operations.
#[derive(Debug)]
pub enum PoolError {
  /// The factory for a key returned an error. The failing slot has been
  /// discarded; the next lookup for the key starts fresh.
  Factory {
    /// Display rendering of the key the factory was invoked with.
    key: String,
    /// The underlying error the factory returned.
    source: FactoryError,
  },
}

impl fmt::Display for PoolError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PoolError::Factory { key, .. } => {
        write!(f, "factory failed while loading key {key:?}")
      }
    }
  }
}

impl Error for PoolError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      PoolError::Factory { source, .. } => Some(source.as_ref()),
    }
  }
}
