// Copyright (c) 2026 the evloop-core authors. Licensed under Apache License, Version 2.0.

//! The process-wide pool singleton: one mutex/condvar pair, one work queue, one slow-I/O
//! queue, shared by every worker thread and every submitter in the process.
//!
//! Modeled on a lazily-initialized, `Mutex<Option<Arc<_>>>`-guarded singleton, as used for
//! per-thread reactor state elsewhere in this codebase: a plain `OnceLock` can't be reset,
//! and this pool needs to be reset after `fork()`, so the double-checked
//! `Mutex<Option<Arc<_>>>` is used in place of it here too.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::pool::config::PoolConfig;
use crate::pool::work::Submission;
use crate::queue::IntrusiveQueue;

pub(crate) enum QueueEntry {
    Work(Arc<Submission>),
    /// Marks "there is slow-I/O work pending in `slow_wq`"; kept out of `slow_wq` itself so
    /// a worker can fairness-cap slow dispatch without scanning past it repeatedly.
    RunSlow,
    /// Once enqueued this is never removed, only ever peeked: every worker that next
    /// acquires the pool mutex sees it at the head, re-signals the condvar once (to wake
    /// the next idle worker), and exits, cascading the shutdown to the whole pool from a
    /// single sentinel.
    Exit,
}

pub(crate) struct PoolQueues {
    pub(crate) wq: IntrusiveQueue<QueueEntry>,
    pub(crate) slow_wq: IntrusiveQueue<Arc<Submission>>,
    pub(crate) run_slow_linked: bool,
    pub(crate) idle_threads: usize,
    pub(crate) slow_io_running: usize,
}

pub(crate) struct PoolShared {
    pub(crate) mutex: Mutex<PoolQueues>,
    pub(crate) condvar: Condvar,
    pub(crate) nthreads: usize,
    pub(crate) slow_threshold: usize,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl PoolShared {
    fn new(config: PoolConfig) -> Self {
        Self {
            mutex: Mutex::new(PoolQueues {
                wq: IntrusiveQueue::new(),
                slow_wq: IntrusiveQueue::new(),
                run_slow_linked: false,
                idle_threads: 0,
                slow_io_running: 0,
            }),
            condvar: Condvar::new(),
            nthreads: config.nthreads,
            // ceil(n / 2), matching libuv's slow_work_thread_threshold.
            slow_threshold: config.nthreads.div_ceil(2),
            threads: Mutex::new(Vec::new()),
        }
    }
}

/// A counting handshake: each worker posts once after it starts running, and `global()`
/// blocks until every worker it spawned has posted. Rust's standard library has no
/// counting semaphore, so this is the idiomatic `Mutex<usize>` + `Condvar` stand-in.
struct StartBarrier {
    mutex: Mutex<usize>,
    condvar: Condvar,
}

impl StartBarrier {
    fn new() -> Self {
        Self { mutex: Mutex::new(0), condvar: Condvar::new() }
    }

    fn post(&self) {
        let mut count = self.mutex.lock().expect("start barrier mutex poisoned");
        *count += 1;
        self.condvar.notify_all();
    }

    fn wait_for(&self, target: usize) {
        let mut count = self.mutex.lock().expect("start barrier mutex poisoned");
        while *count < target {
            count = self.condvar.wait(count).expect("start barrier mutex poisoned");
        }
    }
}

static POOL_STATE: Mutex<Option<Arc<PoolShared>>> = Mutex::new(None);

/// Returns the process-wide pool, spawning its worker threads on first use. Every
/// subsequent call in the process returns the same instance until [`reset_after_fork`] is
/// called.
pub(crate) fn global() -> Arc<PoolShared> {
    let mut guard = POOL_STATE.lock().expect("pool state mutex poisoned");
    if let Some(existing) = guard.as_ref() {
        return Arc::clone(existing);
    }

    let config = PoolConfig::resolve();
    let shared = Arc::new(PoolShared::new(config));
    let barrier = Arc::new(StartBarrier::new());

    let mut handles = Vec::with_capacity(config.nthreads);
    for index in 0..config.nthreads {
        let pool = Arc::clone(&shared);
        let barrier = Arc::clone(&barrier);
        let handle = thread::Builder::new()
            .name(format!("evloop-worker-{index}"))
            .spawn(move || {
                barrier.post();
                crate::pool::worker::run(pool);
            })
            .expect("failed to spawn pool worker thread");
        handles.push(handle);
    }
    barrier.wait_for(config.nthreads);

    tracing::debug!(nthreads = config.nthreads, slow_threshold = shared.slow_threshold, "pool initialized");
    *shared.threads.lock().expect("pool thread list mutex poisoned") = handles;
    *guard = Some(Arc::clone(&shared));
    shared
}

/// Discards the pool singleton without joining its worker threads, so the next `global()`
/// call re-initializes from scratch.
///
/// A `fork()`ed child only has the thread that called `fork`; the mutex/condvar and the
/// other worker threads of the parent do not exist in the child's address space, and any
/// attempt to lock that inherited, possibly-held mutex would deadlock. A caller that
/// integrates with `fork()` (this crate does not call it itself — see the crate's
/// non-goals) must invoke this from the child immediately after forking, before any code
/// in the child touches the pool.
pub fn reset_after_fork() {
    let mut guard = POOL_STATE.lock().expect("pool state mutex poisoned");
    *guard = None;
}

/// Enqueues a single `Exit` sentinel and blocks until every worker thread has observed it
/// and terminated. Intended for test teardown and graceful process shutdown; the singleton
/// is unusable afterward until the next `global()` call re-creates it.
pub fn shutdown_global() {
    let pool = {
        let guard = POOL_STATE.lock().expect("pool state mutex poisoned");
        guard.clone()
    };
    let Some(pool) = pool else { return };

    {
        let mut queues = pool.mutex.lock().expect("pool mutex poisoned");
        queues.wq.push_back(QueueEntry::Exit);
        if queues.idle_threads > 0 {
            pool.condvar.notify_one();
        }
    }

    let handles = std::mem::take(&mut *pool.threads.lock().expect("pool thread list mutex poisoned"));
    for handle in handles {
        let name = handle.thread().name().unwrap_or("evloop-worker").to_string();
        if !join_with_timeout(handle, Duration::from_secs(5)) {
            tracing::error!(thread = %name, "worker thread did not exit within the shutdown deadline");
        }
    }

    *POOL_STATE.lock().expect("pool state mutex poisoned") = None;
}

/// Joins `handle`, polling rather than blocking indefinitely, so a wedged worker thread
/// makes shutdown (and the tests that call it) fail loudly instead of hanging the process.
/// Returns whether the thread actually finished within `timeout`.
fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
    let _ = handle.join();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_threshold_rounds_up() {
        let shared = PoolShared::new(PoolConfig { nthreads: 5 });
        assert_eq!(shared.slow_threshold, 3);
        let shared = PoolShared::new(PoolConfig { nthreads: 4 });
        assert_eq!(shared.slow_threshold, 2);
        let shared = PoolShared::new(PoolConfig { nthreads: 1 });
        assert_eq!(shared.slow_threshold, 1);
    }
}
