// Copyright (c) 2026 the evloop-core authors. Licensed under Apache License, Version 2.0.

//! The worker thread body: wait for eligible work, run it outside the lock, report back.

use std::sync::Arc;

use crate::pool::state::{PoolShared, QueueEntry};
use crate::pool::work::{CompletionRecord, CompletionStatus};

pub(crate) fn run(pool: Arc<PoolShared>) {
    let mut guard = pool.mutex.lock().expect("pool mutex poisoned");

    'main: loop {
        // Step 1: wait until there is work we're allowed to start. A lone RUN_SLOW marker
        // at the head doesn't count if we're already at the slow-I/O fairness cap — that
        // would just busy-spin this thread on work it can't run yet.
        loop {
            let must_wait = guard.wq.is_empty()
                || (guard.wq.len() == 1
                    && matches!(guard.wq.front(), Some(QueueEntry::RunSlow))
                    && guard.slow_io_running >= pool.slow_threshold);
            if !must_wait {
                break;
            }
            guard.idle_threads += 1;
            guard = pool.condvar.wait(guard).expect("pool mutex poisoned");
            guard.idle_threads -= 1;
        }

        // Step 2: EXIT is only ever peeked, never popped, so the same sentinel can cascade
        // the shutdown signal to every worker that next looks at the queue head.
        if matches!(guard.wq.front(), Some(QueueEntry::Exit)) {
            pool.condvar.notify_one();
            tracing::debug!("worker observed EXIT sentinel, terminating");
            return;
        }

        let head = guard.wq.pop_front().expect("non-empty per the wait predicate above");

        let (submission, is_slow) = match head {
            QueueEntry::Work(submission) => (submission, false),
            QueueEntry::Exit => unreachable!("EXIT is only ever observed via front(), never via pop_front()"),
            QueueEntry::RunSlow => {
                if guard.slow_io_running >= pool.slow_threshold {
                    // Raced with another worker that claimed the last slow-I/O slot since
                    // we checked in step 1; put the marker back and retry.
                    guard.wq.push_back(QueueEntry::RunSlow);
                    continue 'main;
                }
                let Some(slow_item) = guard.slow_wq.pop_front() else {
                    // Everything behind the marker was cancelled before we got here.
                    guard.run_slow_linked = false;
                    continue 'main;
                };
                guard.slow_io_running += 1;
                if guard.slow_wq.is_empty() {
                    guard.run_slow_linked = false;
                } else {
                    guard.wq.push_back(QueueEntry::RunSlow);
                    if guard.idle_threads > 0 {
                        pool.condvar.notify_one();
                    }
                }
                (slow_item, true)
            }
        };

        drop(guard);

        let body = submission
            .body
            .lock()
            .expect("submission mutex poisoned")
            .take()
            .expect("a submission popped off a work queue must still carry its body");
        (body.work)();
        submission.sink.push_completion(CompletionRecord { done: body.done, status: CompletionStatus::Ok });
        submission.sink.wake();

        guard = pool.mutex.lock().expect("pool mutex poisoned");
        if is_slow {
            guard.slow_io_running -= 1;
        }
    }
}
