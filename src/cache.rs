//! Cache Facade: the public operations (`get_or_create`, `try_get`,
//! `invalidate_by_*`, `clear`, `stats`) composing the table, tag index,
//! coordinator, stampede controller, eviction engine, and sweeper.
//!
//! The overall shape (one struct owning the map, the order/eviction
//! bookkeeping, and a stats handle, exposed through a small set of
//! documented methods) follows `cachelito-core::GlobalCache<R>`; the
//! internals are generalized from its single-threaded-friendly
//! `RwLock<HashMap>` + `VecDeque` pair to the lock-free, multi-component
//! engine a concurrent, tag-aware, stampede-safe cache needs.
//!
//! ```
//! use methodcache_core::{Cache, CacheConfigBuilder, RuntimePolicy};
//! use std::time::Duration;
//!
//! let cache: Cache<String> = Cache::new(CacheConfigBuilder::new().build());
//! let policy = RuntimePolicy::new().with_duration(Duration::from_secs(60));
//!
//! let value = cache
//!     .get_or_create("user:1", || Ok::<_, std::convert::Infallible>("Ada".to_string()), &policy, "load_user")
//!     .unwrap();
//! assert_eq!(value, "Ada");
//! assert_eq!(cache.stats().hits, 0);
//! ```

use crate::config::CacheConfig;
use crate::coordinator::SingleFlight;
use crate::dlock::{DistributedLock, InProcessDistributedLock};
use crate::entry::{Entry, EntryPolicy, RuntimePolicy};
use crate::error::CacheError;
use crate::eviction::{self, EvictionPolicy};
use crate::policy;
use crate::stampede;
use crate::stats::{CacheStats, EvictionReason, MetricsSink, NoopMetricsSink, StatsSnapshot};
use crate::sweeper::Sweeper;
use crate::table::EntryTable;
use crate::tag_index::TagIndex;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Inner<V> {
    table: EntryTable<V>,
    tags: TagIndex,
    single_flight: SingleFlight<V>,
    dlock: Box<dyn DistributedLock>,
    stats: CacheStats,
    sink: Box<dyn MetricsSink>,
    config: CacheConfig,
    eviction_guard: Mutex<()>,
}

/// The in-process cache engine. `V` must be `Clone` because both hit and
/// miss paths hand callers an owned copy while the table retains its own.
pub struct Cache<V> {
    inner: Arc<Inner<V>>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl<V: Clone + Send + Sync + 'static> Cache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_sink_and_lock(config, Box::new(NoopMetricsSink), Box::new(InProcessDistributedLock::new()))
    }

    pub fn with_sink(config: CacheConfig, sink: Box<dyn MetricsSink>) -> Self {
        Self::with_sink_and_lock(config, sink, Box::new(InProcessDistributedLock::new()))
    }

    pub fn with_sink_and_lock(config: CacheConfig, sink: Box<dyn MetricsSink>, dlock: Box<dyn DistributedLock>) -> Self {
        let max_tag_mappings = config.max_tag_mappings;
        let enable_background_cleanup = config.enable_background_cleanup;
        let cleanup_interval = config.cleanup_interval;
        let batch_size = config.sweeper_batch_size;

        let inner = Arc::new(Inner {
            table: EntryTable::new(),
            tags: TagIndex::new(max_tag_mappings),
            single_flight: SingleFlight::new(),
            dlock,
            stats: CacheStats::new(),
            sink,
            config,
            eviction_guard: Mutex::new(()),
        });

        let sweeper = if enable_background_cleanup {
            let sweep_inner = inner.clone();
            Some(Sweeper::spawn(cleanup_interval, move || {
                let total = sweep_inner.table.len();
                let sample = if total <= batch_size { None } else { Some(batch_size) };
                let removed = sweep_inner.table.sweep_expired(Instant::now(), sample);
                for (key, tags) in &removed {
                    if let Some(tags) = tags {
                        sweep_inner.tags.remove(key, tags);
                    }
                    sweep_inner.dlock.release_fingerprint(key);
                }
                (sample.unwrap_or(total), removed.len())
            }))
        } else {
            None
        };

        Cache { inner, sweeper: Mutex::new(sweeper) }
    }

    /// Returns the cached value for `fingerprint`, computing it via
    /// `factory` on a miss (or a forced refresh). At most one factory
    /// invocation runs per fingerprint at a time.
    pub fn get_or_create<F, E>(
        &self,
        fingerprint: &str,
        factory: F,
        policy: &RuntimePolicy,
        method_name: &str,
    ) -> Result<V, CacheError>
    where
        F: FnOnce() -> Result<V, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if fingerprint.trim().is_empty() {
            return Err(CacheError::InvalidArgument("fingerprint must not be empty or blank".into()));
        }

        let resolved = policy::clamp_duration(
            policy::resolve(policy),
            self.inner.config.default_expiration,
            self.inner.config.max_expiration,
        );

        if let Some(value) = self.try_read_hit(fingerprint, &resolved, method_name) {
            return Ok(value);
        }

        let tags: Option<HashSet<String>> = if policy.tags.is_empty() {
            None
        } else {
            Some(policy.tags.iter().cloned().collect())
        };

        let fingerprint_owned = fingerprint.to_string();
        let tags_for_install = tags.clone();
        let install = move |inner: &Arc<Inner<V>>, value: &V| {
            let now = Instant::now();
            let entry = Entry::new(value.clone(), tags_for_install.clone(), resolved, now);
            inner.table.insert(fingerprint_owned.clone(), entry);
            if let Some(tags) = &tags_for_install {
                inner.tags.add(&fingerprint_owned, tags);
                if inner.tags.is_over_capacity() {
                    let table = &inner.table;
                    inner.tags.sweep_stale(|k| table.contains_key(k));
                }
            }
        };

        let wrapped_inner = self.inner.clone();
        let wrapped_inner_for_evict = self.inner.clone();
        let method_name_owned = method_name.to_string();
        let run = move || -> Result<V, CacheError> {
            let value = factory().map_err(|e| CacheError::Factory(Box::new(e)))?;
            install(&wrapped_inner, &value);
            Cache::maybe_evict(&wrapped_inner_for_evict, &method_name_owned);
            Ok(value)
        };

        let use_fast_path = self.inner.config.enable_fast_path && !resolved.has_advanced_features();
        let coordinated = if use_fast_path {
            self.inner.single_flight.fast_path(fingerprint, run)
        } else {
            self.inner.single_flight.slow_path(fingerprint, &resolved, self.inner.dlock.as_ref(), run)
        };

        match coordinated {
            Ok(outcome) => {
                if self.inner.config.enable_statistics {
                    let credit_waiter_as_hit = !use_fast_path || self.inner.config.fast_path_track_metrics;
                    if outcome.was_coordinator {
                        self.inner.stats.record_miss();
                        self.inner.sink.on_miss(method_name);
                    } else if credit_waiter_as_hit {
                        // Fast-path waiters are credited as hits by default;
                        // `fast_path_track_metrics` lets a caller opt the fast path's
                        // stats out entirely.
                        self.inner.stats.record_hit();
                        self.inner.sink.on_hit(method_name);
                    }
                }
                Ok(outcome.value)
            }
            Err(err) => {
                self.inner.sink.on_error(method_name, &err.to_string());
                Err(err)
            }
        }
    }

    /// Pure read path: returns the value iff present and not expired.
    /// Does not coordinate with concurrent writers and never invokes a
    /// factory.
    pub fn try_get(&self, fingerprint: &str) -> Option<V> {
        let now = Instant::now();
        let hit = {
            let mut entry = self.inner.table.get_mut(fingerprint)?;
            if entry.is_expired(now) {
                None
            } else {
                if eviction::eviction_policy_requires_access_tracking(self.inner.config.eviction_policy)
                    || entry.policy.always_tracks_access()
                {
                    entry.record_access(now);
                }
                Some(entry.value.clone())
            }
        };

        if hit.is_none() {
            self.remove_if_expired(fingerprint, now);
        }
        hit
    }

    /// Removes each listed fingerprint completely (table + tag index +
    /// any distributed-lock semaphore held for it).
    pub fn invalidate_by_keys(&self, keys: &[String]) {
        for key in keys {
            if let Some(entry) = self.inner.table.remove(key) {
                if let Some(tags) = &entry.tags {
                    self.inner.tags.remove(key, tags);
                }
                self.inner.dlock.release_fingerprint(key);
            }
        }
    }

    /// Removes every entry tagged with any of `tags`.
    pub fn invalidate_by_tags(&self, tags: &[String]) {
        let keys = self.inner.tags.keys_for_tags(tags);
        let keys: Vec<String> = keys.into_iter().collect();
        self.invalidate_by_keys(&keys);
    }

    /// Glob (`*`/`?`) pattern over tag names; enumerates matching tags and
    /// delegates to `invalidate_by_tags`.
    pub fn invalidate_by_tag_pattern(&self, pattern: &str) {
        let tags = self.inner.tags.tags_matching(pattern);
        self.invalidate_by_tags(&tags);
    }

    /// Drops all entries, tag mappings, distributed-lock semaphores, and
    /// in-flight single-flight gates, and resets statistics.
    pub fn clear(&self) {
        let keys: Vec<String> = self.inner.table.iter().map(|e| e.key().clone()).collect();
        self.inner.table.clear();
        self.inner.tags.clear();
        for key in &keys {
            self.inner.dlock.release_fingerprint(key);
        }
        self.inner.single_flight.clear();
        self.inner.stats.reset();
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.inner.stats.hits(),
            misses: self.inner.stats.misses(),
            evictions: self.inner.stats.evictions(),
            entry_count: self.inner.table.len(),
            estimated_memory: 0,
        }
    }

    /// Cancels the background sweeper, drops all entries, clears all gates,
    /// and zeroes statistics. Safe to call more than once; the sweeper is
    /// also cancelled automatically on drop.
    pub fn shutdown(&self) {
        if let Some(sweeper) = self.sweeper.lock().as_mut() {
            sweeper.shutdown();
        }
        self.clear();
    }

    fn try_read_hit(&self, fingerprint: &str, resolved: &EntryPolicy, method_name: &str) -> Option<V> {
        let now = Instant::now();
        let mut entry = self.inner.table.get_mut(fingerprint)?;
        if entry.is_expired(now) {
            drop(entry);
            self.remove_if_expired(fingerprint, now);
            return None;
        }

        if resolved.has_advanced_features()
            && stampede::should_force_refresh(resolved, entry.created_at, entry.absolute_expiration, now)
        {
            return None;
        }

        if resolved.always_tracks_access()
            || eviction::eviction_policy_requires_access_tracking(self.inner.config.eviction_policy)
        {
            entry.record_access(now);
        }

        let value = entry.value.clone();
        drop(entry);

        if self.inner.config.enable_statistics {
            self.inner.stats.record_hit();
            self.inner.sink.on_hit(method_name);
        }
        Some(value)
    }

    fn remove_if_expired(&self, fingerprint: &str, now: Instant) {
        let still_expired = self
            .inner
            .table
            .get(fingerprint)
            .map(|e| e.is_expired(now))
            .unwrap_or(false);
        if still_expired {
            if let Some(entry) = self.inner.table.remove(fingerprint) {
                if let Some(tags) = &entry.tags {
                    self.inner.tags.remove(fingerprint, tags);
                }
            }
        }
    }

    fn maybe_evict(inner: &Arc<Inner<V>>, method_name: &str) {
        let Some(max_items) = inner.config.max_items else { return };
        if inner.table.len() < max_items {
            return;
        }
        let Some(_guard) = inner.eviction_guard.try_lock_for(Duration::from_millis(100)) else {
            return;
        };

        let target = eviction::target_eviction_count(inner.table.len(), max_items);
        if target == 0 {
            return;
        }
        let removed = eviction::evict(
            &inner.table,
            inner.config.eviction_policy,
            target,
            inner.config.eviction_sample_percentage,
        );
        for (key, tags) in removed {
            if let Some(tags) = &tags {
                inner.tags.remove(&key, tags);
            }
            if inner.config.enable_statistics {
                inner.stats.record_eviction();
                inner.sink.on_eviction(method_name, reason_for(inner.config.eviction_policy));
            }
        }
    }
}

fn reason_for(policy: EvictionPolicy) -> EvictionReason {
    match policy {
        EvictionPolicy::Lru => EvictionReason::Lru,
        EvictionPolicy::Lfu => EvictionReason::Lfu,
        EvictionPolicy::LfuPrecise => EvictionReason::LfuPrecise,
        EvictionPolicy::Fifo => EvictionReason::Fifo,
        EvictionPolicy::Ttl => EvictionReason::Ttl,
        EvictionPolicy::TtlPrecise => EvictionReason::TtlPrecise,
    }
}

impl<V> Drop for Cache<V> {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().as_mut() {
            sweeper.shutdown();
        }
    }
}
