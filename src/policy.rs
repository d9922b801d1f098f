//! Policy Resolver.
//!
//! Maps a caller-supplied [`RuntimePolicy`] to the internal [`EntryPolicy`]
//! it denotes. Resolution is deterministic and one-to-one, so it is memoized
//! directly on the `RuntimePolicy` via an embedded `OnceCell` rather than in
//! a side table keyed by identity, for portability across executors
//! and `RuntimePolicy::resolved_cell`.

use crate::entry::{EntryPolicy, RuntimePolicy};

/// Resolves `policy` to an `EntryPolicy`, computing it at most once.
pub fn resolve(policy: &RuntimePolicy) -> EntryPolicy {
    *policy.resolved_cell().get_or_init(|| EntryPolicy {
        duration: policy.duration,
        sliding_expiration: policy.sliding_expiration,
        stampede: policy.stampede,
        distributed_lock: policy.distributed_lock,
    })
}

/// Applies `max_expiration`/`default_expiration` clamps from the cache
/// configuration to an already-resolved policy.
pub fn clamp_duration(
    mut resolved: EntryPolicy,
    default_expiration: Option<std::time::Duration>,
    max_expiration: Option<std::time::Duration>,
) -> EntryPolicy {
    if resolved.duration.is_none() {
        resolved.duration = default_expiration;
    }
    if let (Some(d), Some(max)) = (resolved.duration, max_expiration) {
        if d > max {
            resolved.duration = Some(max);
        }
    }
    resolved
}
