//! Statistics & Metrics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Why an entry was evicted, passed through to `MetricsSink::on_eviction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    Lru,
    Lfu,
    LfuPrecise,
    Fifo,
    Ttl,
    TtlPrecise,
    Capacity,
}

/// Hit/miss/eviction counters, updated with relaxed atomics.
///
/// Snapshots returned by `snapshot()` are point-in-time; the individual
/// counters are not read together atomically.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        CacheStats::default()
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot returned by `Cache::stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entry_count: usize,
    pub estimated_memory: usize,
}

/// External observability seam. All methods are best-effort:
/// the core treats sink failures (panics aside) as swallowed and never lets
/// them propagate into a hot path. Default bodies are no-ops so a caller
/// implementing only one callback does not need to stub out the rest.
pub trait MetricsSink: Send + Sync {
    fn on_hit(&self, _method_name: &str) {}
    fn on_miss(&self, _method_name: &str) {}
    fn on_eviction(&self, _method_name: &str, _reason: EvictionReason) {}
    fn on_error(&self, _method_name: &str, _message: &str) {}
}

/// Default sink: does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {}

/// Bridges the sink contract to `tracing`, giving the engine baseline
/// observability before a caller wires in a real metrics backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn on_hit(&self, method_name: &str) {
        tracing::trace!(method_name, "cache hit");
    }

    fn on_miss(&self, method_name: &str) {
        tracing::trace!(method_name, "cache miss");
    }

    fn on_eviction(&self, method_name: &str, reason: EvictionReason) {
        tracing::debug!(method_name, ?reason, "evicted entry");
    }

    fn on_error(&self, method_name: &str, message: &str) {
        tracing::warn!(method_name, message, "cache error");
    }
}
