//! Eviction Engine.
//!
//! Generalizes the single-victim eviction helpers in
//! `cachelito-core::utils` (`find_min_frequency_key`, `move_key_to_end`)
//! into a batched, sampled eviction pass: one pass removes a whole target
//! count rather than a single key. LRU/FIFO sample via reservoir selection
//! so the candidate pool isn't biased toward iteration order; LFU/TTL's
//! approximate variants take a plain prefix; the precise variants scan the
//! whole table.

use crate::entry::Entry;
use crate::table::EntryTable;
use std::time::Instant;

type Candidate = (String, Instant, Instant, u64, Option<Instant>);

/// One of the six supported eviction algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    Lru,
    Lfu,
    LfuPrecise,
    Fifo,
    Ttl,
    TtlPrecise,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        EvictionPolicy::Lru
    }
}

/// Computes how many entries a single eviction pass should remove, given
/// the configured `max_items` and the table's current size:
/// target to `floor(max_items * 0.9)`, never evict more than 20% of
/// `max_items` in one pass, always at least one when eviction runs at all.
pub fn target_eviction_count(current: usize, max_items: usize) -> usize {
    if current < max_items {
        return 0;
    }
    let floor_target = (max_items as f64 * 0.9).floor() as usize;
    let raw_target = current.saturating_sub(floor_target);
    let cap = ((max_items as f64 * 0.2).floor() as usize).max(1);
    raw_target.clamp(1, cap)
}

/// Runs one eviction pass, removing up to `target` entries from `table`
/// according to `policy`, and returns the evicted keys (with their tag
/// sets) so the caller can de-index them from the tag index.
pub fn evict<V>(
    table: &EntryTable<V>,
    policy: EvictionPolicy,
    target: usize,
    sample_percentage: f64,
) -> Vec<(String, Option<std::collections::HashSet<String>>)> {
    if target == 0 {
        return Vec::new();
    }

    let total = table.len();
    let sample_size = sample_size_for(total, target, sample_percentage, policy);

    let mut candidates: Vec<Candidate> = match policy {
        // LRU/FIFO draw a reservoir sample so the victim pool isn't biased
        // toward whichever fingerprints happen to iterate first; LFU/TTL's
        // approximate variants take a plain prefix.
        EvictionPolicy::Lru | EvictionPolicy::Fifo => reservoir_sample(table, sample_size),
        _ => table
            .iter()
            .take(sample_size)
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.created_at,
                    entry.last_accessed_at,
                    entry.access_count,
                    entry.absolute_expiration,
                )
            })
            .collect(),
    };

    match policy {
        EvictionPolicy::Lru => candidates.sort_by_key(|c| c.2),
        EvictionPolicy::Fifo => candidates.sort_by_key(|c| c.1),
        EvictionPolicy::Lfu | EvictionPolicy::LfuPrecise => candidates.sort_by_key(|c| (c.3, c.2)),
        EvictionPolicy::Ttl | EvictionPolicy::TtlPrecise => {
            candidates.sort_by_key(|c| (expiration_sort_key(c.4), c.1))
        }
    }

    let mut removed = Vec::new();
    for (key, ..) in candidates.into_iter().take(target) {
        if let Some(entry) = table.remove(&key) {
            removed.push((key, entry.tags));
        }
    }
    removed
}

/// Algorithm R: draws a uniform `sample_size`-element sample from `table`
/// in a single pass, without biasing toward entries that iterate first.
fn reservoir_sample<V>(table: &EntryTable<V>, sample_size: usize) -> Vec<Candidate> {
    let mut reservoir: Vec<Candidate> = Vec::with_capacity(sample_size);
    for (i, entry) in table.iter().enumerate() {
        let candidate = (
            entry.key().clone(),
            entry.created_at,
            entry.last_accessed_at,
            entry.access_count,
            entry.absolute_expiration,
        );
        if i < sample_size {
            reservoir.push(candidate);
        } else {
            let j = fastrand::usize(0..=i);
            if j < sample_size {
                reservoir[j] = candidate;
            }
        }
    }
    reservoir
}

/// Precise policies scan the entire table; approximate policies draw a
/// sample sized `max(target, ceil(total * sample_pct))`.
fn sample_size_for(total: usize, target: usize, sample_percentage: f64, policy: EvictionPolicy) -> usize {
    match policy {
        EvictionPolicy::LfuPrecise | EvictionPolicy::TtlPrecise => total,
        _ => {
            let pct = sample_percentage.clamp(0.0, 1.0);
            let by_pct = (total as f64 * pct).ceil() as usize;
            target.max(by_pct).min(total)
        }
    }
}

fn expiration_sort_key(exp: Option<Instant>) -> Instant {
    // "never expires" sorts last: any finite expiration is evicted first.
    exp.unwrap_or_else(|| Instant::now() + std::time::Duration::from_secs(u32::MAX as u64))
}

/// Whether `policy`'s eviction algorithm needs access bookkeeping kept
/// current on every read: LRU/LFU/LFU-precise always do, even when the
/// entry's own policy has no advanced features.
pub fn eviction_policy_requires_access_tracking(policy: EvictionPolicy) -> bool {
    matches!(policy, EvictionPolicy::Lru | EvictionPolicy::Lfu | EvictionPolicy::LfuPrecise)
}
