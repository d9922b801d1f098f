//! Expiry Sweeper: a background thread that periodically removes
//! expired entries. The cancellable-sleep shape (condvar-guarded, woken
//! early by `shutdown`) matches the periodic-task idiom used across the
//! pack's cache modules; it is advisory only, since expired entries are
//! also lazily removed by the read path.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const CATCH_UP_INTERVAL: Duration = Duration::from_secs(10);

struct ShutdownSignal {
    lock: Mutex<bool>,
    condvar: Condvar,
}

pub struct Sweeper {
    signal: Arc<ShutdownSignal>,
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl Sweeper {
    /// Spawns the background thread. `pass` runs one sweep and returns
    /// `(scanned, expired)` so the cadence can self-tune (if
    /// more than half the sample was expired, reschedule sooner).
    pub fn spawn(interval: Duration, mut pass: impl FnMut() -> (usize, usize) + Send + 'static) -> Self {
        let signal = Arc::new(ShutdownSignal {
            lock: Mutex::new(false),
            condvar: Condvar::new(),
        });
        let running = Arc::new(AtomicBool::new(true));

        let thread_signal = signal.clone();
        let thread_running = running.clone();
        let handle = std::thread::spawn(move || {
            let mut next_interval = interval;
            loop {
                let mut shutdown = thread_signal.lock.lock();
                let timed_out = thread_signal
                    .condvar
                    .wait_for(&mut shutdown, next_interval)
                    .timed_out();
                if *shutdown {
                    break;
                }
                drop(shutdown);
                if !timed_out {
                    continue;
                }

                let started = Instant::now();
                let (scanned, expired) = pass();
                tracing::debug!(scanned, expired, elapsed = ?started.elapsed(), "expiry sweep pass");

                next_interval = if scanned > 0 && expired * 2 > scanned && interval > CATCH_UP_INTERVAL {
                    tracing::info!(?CATCH_UP_INTERVAL, "more than half the sample was expired, shortening sweep cadence");
                    CATCH_UP_INTERVAL
                } else {
                    interval
                };
            }
            thread_running.store(false, Ordering::Release);
        });

        Sweeper {
            signal,
            handle: Some(handle),
            running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn shutdown(&mut self) {
        {
            let mut shutdown = self.signal.lock.lock();
            *shutdown = true;
        }
        self.signal.condvar.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn sweeper_runs_passes_until_shutdown() {
        let count = Arc::new(AtomicUsize::new(0));
        let pass_count = count.clone();
        let mut sweeper = Sweeper::spawn(Duration::from_millis(10), move || {
            pass_count.fetch_add(1, Ordering::SeqCst);
            (10, 0)
        });
        std::thread::sleep(Duration::from_millis(60));
        sweeper.shutdown();
        assert!(count.load(Ordering::SeqCst) >= 2);
        assert!(!sweeper.is_running());
    }
}
