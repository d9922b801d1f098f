//! Single-Flight Coordinator: the lightweight (fast) and heavyweight
//! (slow) gates that guarantee at-most-one concurrent factory execution per
//! fingerprint. The DashMap-of-cell shape is grounded on
//! `cachelito-core::AsyncGlobalCache`'s DashMap-backed storage; `OnceCell`'s
//! documented blocking `get_or_init` gives the fast path its "first caller
//! executes, the rest block and observe the same result" semantics for
//! free, avoiding a heavy mutex on the hot path.

use crate::dlock::DistributedLock;
use crate::entry::{EntryPolicy, StampedeMode};
use crate::error::CacheError;
use dashmap::mapref::entry::Entry as DashEntry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

type FastResult<V> = Result<V, Arc<CacheError>>;

/// Outcome of coordinating a factory call: the value plus whether *this*
/// caller was the coordinator (ran the factory) or a waiter (shared the
/// coordinator's result).
pub struct Coordinated<V> {
    pub value: V,
    pub was_coordinator: bool,
}

pub struct SingleFlight<V> {
    fast_gates: DashMap<String, Arc<OnceCell<FastResult<V>>>>,
    slow_gates: DashMap<String, Arc<SlowSlot<V>>>,
}

struct SlowSlot<V> {
    state: Mutex<Option<FastResult<V>>>,
    condvar: Condvar,
}

impl<V: Clone> SingleFlight<V> {
    pub fn new() -> Self {
        SingleFlight {
            fast_gates: DashMap::new(),
            slow_gates: DashMap::new(),
        }
    }

    /// Lightweight gate: used when the resolved policy has no advanced
    /// features.
    pub fn fast_path(
        &self,
        key: &str,
        factory: impl FnOnce() -> Result<V, CacheError>,
    ) -> Result<Coordinated<V>, CacheError> {
        let (cell, was_coordinator) = match self.fast_gates.entry(key.to_string()) {
            DashEntry::Occupied(e) => (e.get().clone(), false),
            DashEntry::Vacant(e) => {
                let cell = Arc::new(OnceCell::new());
                e.insert(cell.clone());
                (cell, true)
            }
        };

        let result = cell.get_or_init(|| factory().map_err(Arc::new)).clone();

        if was_coordinator {
            self.fast_gates.remove_if(key, |_, existing| Arc::ptr_eq(existing, &cell));
        }

        result
            .map(|value| Coordinated { value, was_coordinator })
            .map_err(|e| unwrap_shared_error(e))
    }

    /// Heavyweight gate: used when the policy has sliding expiration,
    /// stampede handling, or a distributed lock.
    pub fn slow_path(
        &self,
        key: &str,
        policy: &EntryPolicy,
        dlock: &dyn DistributedLock,
        factory: impl FnOnce() -> Result<V, CacheError>,
    ) -> Result<Coordinated<V>, CacheError> {
        let (slot, was_coordinator) = match self.slow_gates.entry(key.to_string()) {
            DashEntry::Occupied(e) => (e.get().clone(), false),
            DashEntry::Vacant(e) => {
                let slot = Arc::new(SlowSlot {
                    state: Mutex::new(None),
                    condvar: Condvar::new(),
                });
                e.insert(slot.clone());
                (slot, true)
            }
        };

        if was_coordinator {
            let outcome = self.run_coordinator(key, policy, dlock, factory);
            let shared: FastResult<V> = outcome.map_err(Arc::new);
            {
                let mut state = slot.state.lock();
                *state = Some(shared.clone());
            }
            slot.condvar.notify_all();
            self.slow_gates.remove_if(key, |_, existing| Arc::ptr_eq(existing, &slot));
            shared
                .map(|value| Coordinated { value, was_coordinator: true })
                .map_err(unwrap_shared_error)
        } else {
            let mut state = slot.state.lock();
            while state.is_none() {
                slot.condvar.wait(&mut state);
            }
            state
                .clone()
                .unwrap()
                .map(|value| Coordinated { value, was_coordinator: false })
                .map_err(unwrap_shared_error)
        }
    }

    /// Drops every in-flight fast/slow gate. Waiters already blocked on a
    /// cleared gate still observe their coordinator's result normally; this
    /// only stops the gate from being reused to coordinate future calls.
    pub fn clear(&self) {
        self.fast_gates.clear();
        self.slow_gates.clear();
    }

    fn run_coordinator(
        &self,
        key: &str,
        policy: &EntryPolicy,
        dlock: &dyn DistributedLock,
        factory: impl FnOnce() -> Result<V, CacheError>,
    ) -> Result<V, CacheError> {
        let _guard = if let (StampedeMode::DistributedLock, Some(spec)) =
            (policy.stampede, policy.distributed_lock)
        {
            match dlock.try_acquire(key, spec.max_concurrency, spec.timeout) {
                Some(guard) => Some(guard),
                None => return Err(CacheError::Timeout(spec.timeout)),
            }
        } else {
            None
        };

        factory()
    }
}

impl<V: Clone> Default for SingleFlight<V> {
    fn default() -> Self {
        Self::new()
    }
}

fn unwrap_shared_error(err: Arc<CacheError>) -> CacheError {
    match Arc::try_unwrap(err) {
        Ok(e) => e,
        Err(shared) => match &*shared {
            CacheError::Timeout(d) => CacheError::Timeout(*d),
            CacheError::InvalidArgument(s) => CacheError::InvalidArgument(s.clone()),
            CacheError::Canceled => CacheError::Canceled,
            // Render the inner factory error's own message, not the outer
            // `CacheError::Factory`'s Display (which would double-prefix
            // "factory failed: " for every waiter but the last Arc holder).
            CacheError::Factory(inner) => CacheError::Factory(inner.to_string().into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dlock::InProcessDistributedLock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn fast_path_runs_factory_exactly_once_under_concurrency() {
        let flight = Arc::new(SingleFlight::<u64>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(16));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let flight = flight.clone();
            let calls = calls.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                barrier.wait();
                flight
                    .fast_path("k", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(20));
                        Ok(7)
                    })
                    .unwrap()
                    .value
            }));
        }
        let results: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|&v| v == 7));
    }

    #[test]
    fn fast_path_gate_is_removed_after_completion_allowing_retry() {
        let flight = SingleFlight::<u64>::new();
        let first = flight.fast_path("k", || Ok(1)).unwrap();
        assert!(first.was_coordinator);
        let second = flight.fast_path("k", || Ok(2)).unwrap();
        assert!(second.was_coordinator, "gate must be freed so a later miss re-elects a coordinator");
        assert_eq!(second.value, 2);
    }

    #[test]
    fn slow_path_propagates_factory_error_to_waiters() {
        let flight = Arc::new(SingleFlight::<u64>::new());
        let dlock = Arc::new(InProcessDistributedLock::new());
        let policy = EntryPolicy::empty();
        let barrier = Arc::new(Barrier::new(2));

        let f1 = flight.clone();
        let d1 = dlock.clone();
        let p1 = policy;
        let b1 = barrier.clone();
        let coordinator = thread::spawn(move || {
            b1.wait();
            f1.slow_path("k", &p1, d1.as_ref(), || {
                thread::sleep(std::time::Duration::from_millis(30));
                Err(CacheError::InvalidArgument("boom".into()))
            })
        });

        let f2 = flight.clone();
        let d2 = dlock.clone();
        let p2 = policy;
        let b2 = barrier.clone();
        let waiter = thread::spawn(move || {
            b2.wait();
            std::thread::sleep(std::time::Duration::from_millis(5));
            f2.slow_path("k", &p2, d2.as_ref(), || Ok(99))
        });

        assert!(coordinator.join().unwrap().is_err());
        assert!(waiter.join().unwrap().is_err());
    }

    #[test]
    fn clear_drops_gates_so_a_new_coordinator_is_elected() {
        let flight = Arc::new(SingleFlight::<u64>::new());
        let barrier = Arc::new(Barrier::new(2));
        let f1 = flight.clone();
        let b1 = barrier.clone();
        let holder = thread::spawn(move || {
            f1.fast_path("k", || {
                b1.wait();
                thread::sleep(std::time::Duration::from_millis(50));
                Ok(1)
            })
        });
        barrier.wait();
        std::thread::sleep(std::time::Duration::from_millis(10));

        flight.clear();
        let second = flight.fast_path("k", || Ok(2)).unwrap();
        assert!(second.was_coordinator, "clear() must drop in-flight gates so a new coordinator can be elected");

        holder.join().unwrap().unwrap();
    }

    #[test]
    fn unwrap_shared_error_does_not_double_prefix_factory_message() {
        let shared = Arc::new(CacheError::Factory("boom".into()));
        let _extra_holder = shared.clone();
        let err = unwrap_shared_error(shared);
        assert_eq!(err.to_string(), "factory failed: boom");
    }

    #[test]
    fn slow_path_distributed_lock_timeout_surfaces_to_coordinator() {
        let flight = SingleFlight::<u64>::new();
        let dlock = InProcessDistributedLock::new();
        // Pre-occupy the single permit so the coordinator cannot acquire it.
        let _held = dlock
            .try_acquire("k", 1, std::time::Duration::from_millis(200))
            .unwrap();
        let policy = EntryPolicy {
            stampede: StampedeMode::DistributedLock,
            distributed_lock: Some(crate::entry::DistributedLockSpec {
                timeout: std::time::Duration::from_millis(10),
                max_concurrency: 1,
            }),
            ..EntryPolicy::empty()
        };
        let result = flight.slow_path("k", &policy, &dlock, || Ok(1));
        assert!(matches!(result, Err(CacheError::Timeout(_))));
    }
}
