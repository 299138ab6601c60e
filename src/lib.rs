//! # Gated object pool
//!
//! Thread-safe object pool that bounds how many instances of an expensive
//! resource exist at once, hands them out under contention and takes them
//! back automatically.
//!
//! ## Features
//!
//! - Capacity-gated creation: objects are created on demand until `max_pool_size` is reached
//! - Automatic return of objects via RAII (Drop trait)
//! - Blocking checkout with optional timeout and cancellation
//! - Async checkout that never blocks the calling task
//! - Fixed, factory-backed and hybrid pools
//! - Optional clearing of objects before reuse, with slot recovery on failure
//! - Metrics with Prometheus export
//! - Pool warm-up/pre-population
//!
//! ## Quick Start
//!
//! ```rust
//! use gated_objectpool::{ObjectPool, PoolConfiguration};
//!
//! let pool = ObjectPool::fixed(vec![1, 2, 3], Default::default()).unwrap();
//! {
//!     let obj = pool.take().unwrap();
//!     println!("Got: {}", *obj);
//!     // Object automatically returned when `obj` goes out of scope
//! }
//!
//! let pool = ObjectPool::new(
//!     || Ok::<_, std::io::Error>(String::with_capacity(64)),
//!     PoolConfiguration::new().with_max_pool_size(4),
//! )
//! .unwrap();
//! let mut text = pool.take().unwrap();
//! text.push_str("pooled");
//! ```

mod available;
mod cancellation;
mod config;
mod errors;
mod gate;
mod metrics;
mod pool;

pub use cancellation::{CancellationToken, DropGuard};
pub use config::{Clearable, PoolConfiguration, ReclaimPolicy};
pub use errors::{BoxError, PoolError, PoolResult, SharedError};
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::{ObjectPool, PooledObject};
