// Copyright (c) 2026 the evloop-core authors. Licensed under Apache License, Version 2.0.

//! The process-wide worker thread pool: lazy singleton init, submission, best-effort
//! cancellation, and the slow-I/O fairness policy that keeps a burst of slow work from
//! starving CPU/fast-I/O submissions.
//!
//! Modeled on a lazily-initialized, fork-safe singleton shape, the same pattern used for
//! per-thread reactor state elsewhere in this codebase; the scheduling policy itself (the
//! `RUN_SLOW` sentinel, the `ceil(nthreads/2)` fairness cap) is ported from libuv's
//! `uv-common.c` / `threadpool.c`, kept as in-memory reference under `original_source/`.

mod config;
mod dispatch;
mod error;
mod state;
mod work;
mod worker;

pub use config::{PoolConfig, DEFAULT_POOL_SIZE, MAX_POOL_SIZE, POOL_SIZE_ENV};
pub use error::CancelError;
pub use state::reset_after_fork;
pub use work::{CompletionRecord, CompletionSink, CompletionStatus, SubmissionHandle, WorkKind};

pub(crate) use dispatch::{cancel, submit};

/// Blocks until every worker thread observes process shutdown and exits. Intended for test
/// teardown and graceful process shutdown; the pool singleton is unusable afterward until
/// the next submission re-creates it.
pub fn shutdown() {
    state::shutdown_global();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::work::{CompletionRecord, CompletionSink, CompletionStatus};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// A [`CompletionSink`] that just records completions into a `Vec`, for pool-level
    /// tests that don't need a full `EventLoop`.
    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<CompletionStatus>>,
    }

    impl CompletionSink for RecordingSink {
        fn push_completion(&self, record: CompletionRecord) {
            self.records.lock().expect("sink mutex poisoned").push(record.status);
            (record.done)(record.status);
        }

        fn wake(&self) {}
    }

    fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        while !predicate() {
            if start.elapsed() > timeout {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        true
    }

    #[test]
    #[serial_test::serial]
    fn cpu_work_runs_and_reports_ok() {
        std::env::set_var(POOL_SIZE_ENV, "4");
        let sink: Arc<dyn CompletionSink> = Arc::new(RecordingSink::default());
        let ran = Arc::new(Mutex::new(false));
        let ran2 = Arc::clone(&ran);
        let seen = Arc::new(Mutex::new(None));
        let seen2 = Arc::clone(&seen);

        submit(
            Arc::clone(&sink),
            WorkKind::Cpu,
            Box::new(move || *ran2.lock().unwrap() = true),
            Box::new(move |status| *seen2.lock().unwrap() = Some(status)),
        );

        assert!(wait_until(|| seen.lock().unwrap().is_some(), Duration::from_secs(2)));
        assert!(*ran.lock().unwrap());
        assert_eq!(*seen.lock().unwrap(), Some(CompletionStatus::Ok));
        shutdown_global_for_test();
    }

    #[test]
    #[serial_test::serial]
    fn cancel_before_dispatch_reports_cancelled_and_never_runs_work() {
        std::env::set_var(POOL_SIZE_ENV, "1");
        let sink: Arc<dyn CompletionSink> = Arc::new(RecordingSink::default());

        // Occupy the pool's single worker so our slow item sits in the queue long enough
        // to cancel before it is dispatched.
        let gate = Arc::new(std::sync::Barrier::new(2));
        let gate2 = Arc::clone(&gate);
        submit(Arc::clone(&sink), WorkKind::Cpu, Box::new(move || { gate2.wait(); }), Box::new(|_| {}));

        let ran = Arc::new(Mutex::new(false));
        let ran2 = Arc::clone(&ran);
        let seen = Arc::new(Mutex::new(None));
        let seen2 = Arc::clone(&seen);
        let handle = submit(
            Arc::clone(&sink),
            WorkKind::SlowIo,
            Box::new(move || *ran2.lock().unwrap() = true),
            Box::new(move |status| *seen2.lock().unwrap() = Some(status)),
        );

        assert_eq!(cancel(&handle), Ok(()));
        gate.wait();

        assert!(wait_until(|| seen.lock().unwrap().is_some(), Duration::from_secs(2)));
        assert!(!*ran.lock().unwrap());
        assert_eq!(*seen.lock().unwrap(), Some(CompletionStatus::Cancelled));
        shutdown_global_for_test();
    }

    #[test]
    #[serial_test::serial]
    fn cancel_after_dispatch_reports_busy() {
        std::env::set_var(POOL_SIZE_ENV, "1");
        let sink: Arc<dyn CompletionSink> = Arc::new(RecordingSink::default());
        let started = Arc::new(std::sync::Barrier::new(2));
        let started2 = Arc::clone(&started);
        let release = Arc::new(std::sync::Barrier::new(2));
        let release2 = Arc::clone(&release);

        let handle = submit(
            Arc::clone(&sink),
            WorkKind::Cpu,
            Box::new(move || {
                started2.wait();
                release2.wait();
            }),
            Box::new(|_| {}),
        );

        started.wait();
        assert_eq!(cancel(&handle), Err(CancelError::Busy));
        release.wait();
        shutdown_global_for_test();
    }

    #[test]
    #[serial_test::serial]
    fn slow_io_fairness_caps_concurrent_slow_work_so_cpu_items_are_not_starved() {
        use pretty_assertions::assert_eq as pretty_assert_eq;
        use std::time::Instant;

        std::env::set_var(POOL_SIZE_ENV, "4");
        let sink: Arc<dyn CompletionSink> = Arc::new(RecordingSink::default());

        for _ in 0..10 {
            submit(
                Arc::clone(&sink),
                WorkKind::SlowIo,
                Box::new(|| std::thread::sleep(Duration::from_millis(60))),
                Box::new(|_| {}),
            );
        }

        let cpu_done = Arc::new(Mutex::new(0usize));
        let start = Instant::now();
        for _ in 0..4 {
            let cpu_done = Arc::clone(&cpu_done);
            submit(
                Arc::clone(&sink),
                WorkKind::Cpu,
                Box::new(|| {}),
                Box::new(move |status| {
                    if status == CompletionStatus::Ok {
                        *cpu_done.lock().unwrap() += 1;
                    }
                }),
            );
        }

        // With `slow_threshold = ceil(4/2) = 2`, at most 2 workers service slow items at
        // once, leaving 2 free for the 4 trivial CPU items; they should all finish well
        // before even a second 60ms slow-work quantum elapses, let alone all ten of them.
        assert!(wait_until(|| *cpu_done.lock().unwrap() == 4, Duration::from_millis(500)));
        pretty_assert_eq!(*cpu_done.lock().unwrap(), 4);
        assert!(start.elapsed() < Duration::from_millis(500));
        shutdown_global_for_test();
    }

    fn shutdown_global_for_test() {
        state::shutdown_global();
        std::env::remove_var(POOL_SIZE_ENV);
    }
}
