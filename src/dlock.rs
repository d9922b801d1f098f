//! Distributed-lock seam. The core ships an in-process,
//! per-fingerprint counting semaphore as the default backend and exposes
//! the `DistributedLock` trait so a real distributed coordinator (Redis,
//! etcd, ...) can be substituted without forking the single-flight
//! coordinator. Hand-rolled rather than built on a heavier primitive, per
//! the fact that per-fingerprint semaphores are owned by the
//! facade and cleaned up opportunistically.

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A held permit; dropping it releases the permit back to the semaphore.
pub struct LockGuard {
    inner: Arc<Semaphore>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.inner.release();
    }
}

struct Semaphore {
    state: Mutex<usize>,
    condvar: Condvar,
    max_concurrency: usize,
}

impl Semaphore {
    fn new(max_concurrency: usize) -> Self {
        Semaphore {
            state: Mutex::new(0),
            condvar: Condvar::new(),
            max_concurrency,
        }
    }

    fn try_acquire(self: &Arc<Self>, timeout: Duration) -> Option<LockGuard> {
        let deadline = Instant::now() + timeout;
        let mut held = self.state.lock();
        loop {
            if *held < self.max_concurrency {
                *held += 1;
                return Some(LockGuard { inner: self.clone() });
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let wait_result = self.condvar.wait_for(&mut held, deadline - now);
            if wait_result.timed_out() && *held >= self.max_concurrency {
                return None;
            }
        }
    }

    fn release(&self) {
        let mut held = self.state.lock();
        *held = held.saturating_sub(1);
        self.condvar.notify_one();
    }
}

/// External seam for distributed-lock backends.
pub trait DistributedLock: Send + Sync {
    /// Attempts to acquire the lock for `fingerprint` with `max_concurrency`
    /// permits, waiting up to `timeout`. Returns `None` on timeout.
    fn try_acquire(&self, fingerprint: &str, max_concurrency: usize, timeout: Duration) -> Option<LockGuard>;

    /// Called when the owning entry is removed; a stale map entry here is a
    /// minor leak, cleanable at the next call.
    fn release_fingerprint(&self, fingerprint: &str);
}

/// Default, in-process semaphore-per-fingerprint implementation.
#[derive(Default)]
pub struct InProcessDistributedLock {
    semaphores: DashMap<String, Arc<Semaphore>>,
}

impl InProcessDistributedLock {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Lets a single backend instance be shared across multiple `Cache`s (each
/// takes ownership of a `Box<dyn DistributedLock>`, so sharing requires an
/// `Arc` wrapper that forwards through).
impl<T: DistributedLock + ?Sized> DistributedLock for Arc<T> {
    fn try_acquire(&self, fingerprint: &str, max_concurrency: usize, timeout: Duration) -> Option<LockGuard> {
        (**self).try_acquire(fingerprint, max_concurrency, timeout)
    }

    fn release_fingerprint(&self, fingerprint: &str) {
        (**self).release_fingerprint(fingerprint)
    }
}

impl DistributedLock for InProcessDistributedLock {
    fn try_acquire(&self, fingerprint: &str, max_concurrency: usize, timeout: Duration) -> Option<LockGuard> {
        let semaphore = self
            .semaphores
            .entry(fingerprint.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(max_concurrency)))
            .clone();
        semaphore.try_acquire(timeout)
    }

    fn release_fingerprint(&self, fingerprint: &str) {
        self.semaphores.remove(fingerprint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_permit_serializes_callers() {
        let lock = InProcessDistributedLock::new();
        let guard = lock
            .try_acquire("k", 1, Duration::from_millis(50))
            .expect("first caller acquires immediately");
        let second = lock.try_acquire("k", 1, Duration::from_millis(10));
        assert!(second.is_none(), "second caller should time out while the permit is held");
        drop(guard);
        assert!(lock.try_acquire("k", 1, Duration::from_millis(50)).is_some());
    }

    #[test]
    fn release_on_drop_unblocks_waiters() {
        let lock = Arc::new(InProcessDistributedLock::new());
        let guard = lock.try_acquire("k", 1, Duration::from_millis(50)).unwrap();
        let lock2 = lock.clone();
        let handle = std::thread::spawn(move || lock2.try_acquire("k", 1, Duration::from_millis(200)).is_some());
        std::thread::sleep(Duration::from_millis(20));
        drop(guard);
        assert!(handle.join().unwrap());
    }
}
