//! Entry metadata and the policy types attached to it.

use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Refresh/stampede behavior attached to an `EntryPolicy`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StampedeMode {
    None,
    /// Force refresh once `now >= absolute_expiration - window`.
    RefreshAhead(Duration),
    /// Force refresh with probability growing as `age` approaches `duration`.
    Probabilistic(f64),
    /// Coordinate the miss path through a distributed lock; no read-time force-refresh.
    DistributedLock,
}

impl Default for StampedeMode {
    fn default() -> Self {
        StampedeMode::None
    }
}

/// Parameters for the in-process (or externally supplied) distributed lock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistributedLockSpec {
    pub timeout: Duration,
    pub max_concurrency: usize,
}

/// Resolved, internal policy stored on every entry.
///
/// An `EntryPolicy::empty()` value means "no advanced features": the
/// single-flight coordinator takes the fast path and the read path skips
/// the per-read access bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryPolicy {
    pub duration: Option<Duration>,
    pub sliding_expiration: Option<Duration>,
    pub stampede: StampedeMode,
    pub distributed_lock: Option<DistributedLockSpec>,
}

impl EntryPolicy {
    pub const fn empty() -> Self {
        EntryPolicy {
            duration: None,
            sliding_expiration: None,
            stampede: StampedeMode::None,
            distributed_lock: None,
        }
    }

    /// Whether this policy needs anything beyond the lightweight single-flight gate.
    pub fn has_advanced_features(&self) -> bool {
        self.sliding_expiration.is_some()
            || self.stampede != StampedeMode::None
            || self.distributed_lock.is_some()
    }

    /// Whether the read path must always bump access bookkeeping.
    pub fn always_tracks_access(&self) -> bool {
        self.sliding_expiration.is_some() || self.stampede != StampedeMode::None
    }
}

impl Default for EntryPolicy {
    fn default() -> Self {
        Self::empty()
    }
}

/// Externally supplied, immutable policy bundle attached to a call site.
///
/// Resolution to an `EntryPolicy` happens at most once per `RuntimePolicy`
/// instance; the resolved form is cached in an embedded `OnceCell` rather
/// than in an external weak-keyed table (see `policy.rs`).
#[derive(Debug)]
pub struct RuntimePolicy {
    pub duration: Option<Duration>,
    pub tags: Vec<String>,
    pub sliding_expiration: Option<Duration>,
    pub stampede: StampedeMode,
    pub distributed_lock: Option<DistributedLockSpec>,
    resolved: OnceCell<EntryPolicy>,
}

impl RuntimePolicy {
    pub fn new() -> Self {
        RuntimePolicy {
            duration: None,
            tags: Vec::new(),
            sliding_expiration: None,
            stampede: StampedeMode::None,
            distributed_lock: None,
            resolved: OnceCell::new(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_tags<I: IntoIterator<Item = String>>(mut self, tags: I) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    pub fn with_sliding_expiration(mut self, sliding: Duration) -> Self {
        self.sliding_expiration = Some(sliding);
        self
    }

    pub fn with_stampede(mut self, mode: StampedeMode) -> Self {
        self.stampede = mode;
        self
    }

    pub fn with_distributed_lock(mut self, spec: DistributedLockSpec) -> Self {
        self.distributed_lock = Some(spec);
        self
    }

    /// Cell used by `policy::resolve` to memoize the resolved `EntryPolicy`.
    pub(crate) fn resolved_cell(&self) -> &OnceCell<EntryPolicy> {
        &self.resolved
    }
}

impl Default for RuntimePolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// An entry owned exclusively by the entry table.
#[derive(Debug, Clone)]
pub struct Entry<V> {
    pub value: V,
    pub tags: Option<HashSet<String>>,
    pub created_at: Instant,
    pub last_accessed_at: Instant,
    /// `None` means "never expires".
    pub absolute_expiration: Option<Instant>,
    pub access_count: u64,
    pub policy: EntryPolicy,
}

impl<V> Entry<V> {
    pub fn new(value: V, tags: Option<HashSet<String>>, policy: EntryPolicy, now: Instant) -> Self {
        let absolute_expiration = policy.duration.map(|d| now + d);
        Entry {
            value,
            tags,
            created_at: now,
            last_accessed_at: now,
            absolute_expiration,
            access_count: 1,
            policy,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.absolute_expiration, Some(exp) if now >= exp)
    }

    /// Bumps `last_accessed_at`/`access_count` and, if sliding expiration is
    /// configured, pushes `absolute_expiration` out to `now + sliding`.
    pub fn record_access(&mut self, now: Instant) {
        self.last_accessed_at = now;
        self.access_count += 1;
        if let Some(sliding) = self.policy.sliding_expiration {
            self.absolute_expiration = Some(now + sliding);
        }
    }
}
