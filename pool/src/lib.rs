//! A keyed resource pool with atomic per-key creation, per-key
//! serialization, and time-based eviction.
//!
//! # Features
//! - **Single-flight loading**: for concurrent lookups of a missing key,
//!   exactly one caller's factory runs; the rest wait on the slot's lock
//!   and observe the same value.
//! - **Per-key serialization**: each slot carries its own exclusive lock,
//!   so a slow load for one key never blocks access to another.
//! - **Sliding expiration**: untouched slots are evicted by a single
//!   deadline-driven background sweeper; touching a slot extends its life.
//! - **Failure isolation**: a factory error discards the failing slot, so
//!   failures are never cached and the next lookup starts fresh.
//! - **Non-Clone support**: values are handed out as `Arc<V>`.
//! - **Observability**: removal listeners with typed reasons, plus
//!   detailed metrics.

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod handle;
pub mod listener;
pub mod metrics;
pub mod resource;

// Internal, crate-only modules
mod shared;
mod slot;
mod store;
mod task;
mod time;

// Re-export the primary user-facing types for convenience
pub use builder::PoolBuilder;
pub use error::{BuildError, FactoryError, PoolError};
pub use handle::Pool;
pub use listener::{RemovalListener, RemovalReason};
pub use metrics::MetricsSnapshot;
pub use resource::Resource;
