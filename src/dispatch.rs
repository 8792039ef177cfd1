//! Worker pool abstraction and drain accounting

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use rayon::ThreadPoolBuilder;

/// A queued piece of work; the argument is the executing worker's index
pub type Job = Box<dyn FnOnce(usize) + Send>;

/// Fire-and-forget worker pool service
///
/// The engine tracks completion itself, so a pool only needs to run jobs
/// eventually, on any thread, in any order. Implement this to drive the
/// engine from an existing thread pool.
pub trait WorkerPool: Send + Sync {
    fn spawn(&self, job: Job);
    fn num_threads(&self) -> usize;
}

/// Default pool backed by rayon
pub struct RayonPool {
    pool: rayon::ThreadPool,
}

impl RayonPool {
    /// Build a pool with `workers` threads, or rayon's default when `None`
    pub fn new(workers: Option<usize>) -> Self {
        let mut builder = ThreadPoolBuilder::new().thread_name(|idx| format!("polyscan-{}", idx));
        if let Some(threads) = workers {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build().expect("failed to build worker pool");
        RayonPool { pool }
    }
}

impl WorkerPool for RayonPool {
    fn spawn(&self, job: Job) {
        self.pool
            .spawn(move || job(rayon::current_thread_index().unwrap_or(0)));
    }
    fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

/// Count of submitted but undelivered units, with a drain barrier
///
/// Workers only touch the atomic on the fast path; the mutex and condvar
/// come into play when a delivery empties the pool while someone waits.
pub(crate) struct Pending {
    count: AtomicUsize,
    lock: Mutex<()>,
    done: Condvar,
}

impl Pending {
    pub fn new() -> Self {
        Pending {
            count: AtomicUsize::new(0),
            lock: Mutex::new(()),
            done: Condvar::new(),
        }
    }

    /// Account for newly submitted units; called before they are spawned
    pub fn add(&self, units: usize) {
        self.count.fetch_add(units, Ordering::AcqRel);
    }

    /// One unit fully delivered
    pub fn complete_one(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            // take the lock so the notify cannot slip between a waiter's
            // count check and its wait
            let _guard = self.lock.lock().expect("pending lock poisoned");
            self.done.notify_all();
        }
    }

    /// Block until the count reaches zero; false if `timeout` passed first
    pub fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock.lock().expect("pending lock poisoned");
        while self.count.load(Ordering::Acquire) != 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _timed_out) = self
                .done
                .wait_timeout(guard, deadline - now)
                .expect("pending lock poisoned");
            guard = next;
        }
        true
    }
}
