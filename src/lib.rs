//! # methodcache-core
//!
//! In-process cache engine core for a method-result caching library: a
//! keyed value store with per-entry expiration, tags, and metadata; a
//! single-flight coordinator with stampede-prevention policies; capacity
//! eviction under a configurable policy; a tag-based reverse index with
//! glob-pattern invalidation; a background expiry sweeper; and hit/miss/
//! eviction statistics with a pluggable metrics sink.
//!
//! Attribute/source-generator layers that build call-site fingerprints,
//! serialization/compression/distributed transport, multi-tier cache
//! orchestration, HTTP-caching semantics, and configuration-file loading
//! are treated as external collaborators and live outside this crate.
//!
//! ## Quick start
//!
//! ```
//! use methodcache_core::{Cache, CacheConfigBuilder, RuntimePolicy};
//! use std::time::Duration;
//!
//! let cache: Cache<u64> = Cache::new(CacheConfigBuilder::new().build());
//! let policy = RuntimePolicy::new().with_duration(Duration::from_secs(30));
//!
//! let value = cache
//!     .get_or_create("fib:10", || Ok::<_, std::convert::Infallible>(55), &policy, "fibonacci")
//!     .unwrap();
//! assert_eq!(value, 55);
//! ```

mod cache;
mod config;
mod coordinator;
mod dlock;
mod entry;
mod error;
mod eviction;
mod policy;
mod stampede;
mod stats;
mod sweeper;
mod table;
mod tag_index;

pub use cache::Cache;
pub use config::{CacheConfig, CacheConfigBuilder};
pub use dlock::{DistributedLock, InProcessDistributedLock, LockGuard};
pub use entry::{DistributedLockSpec, EntryPolicy, RuntimePolicy, StampedeMode};
pub use error::{CacheError, CacheResult};
pub use eviction::EvictionPolicy;
pub use stats::{CacheStats, EvictionReason, MetricsSink, NoopMetricsSink, StatsSnapshot, TracingMetricsSink};
