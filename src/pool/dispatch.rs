// Copyright (c) 2026 the evloop-core authors. Licensed under Apache License, Version 2.0.

//! Public submission and cancellation API.

use std::sync::{Arc, Mutex};

use crate::pool::error::CancelError;
use crate::pool::state::{self, QueueEntry};
use crate::pool::work::{CompletionRecord, CompletionStatus, CompletionSink, Submission, SubmissionHandle, WorkBody, WorkKind};

/// Submits work of kind `kind` to the process-wide pool. `work` runs on a worker thread;
/// `done` is later invoked (on the owning loop's thread, via `sink`) with the outcome.
///
/// There is no `Result` here: a work item's `work` and `done` closures are ordinary Rust
/// values and can't be null, so the "work pointer is null" rejection this API has in its
/// C ancestor has no reachable analogue in this crate.
pub(crate) fn submit(
    sink: Arc<dyn CompletionSink>,
    kind: WorkKind,
    work: Box<dyn FnOnce() + Send + 'static>,
    done: Box<dyn FnOnce(CompletionStatus) + Send + 'static>,
) -> SubmissionHandle {
    let submission = Arc::new(Submission {
        kind,
        body: Mutex::new(Some(WorkBody { work, done })),
        sink,
    });

    let pool = state::global();
    let mut queues = pool.mutex.lock().expect("pool mutex poisoned");
    match kind {
        WorkKind::SlowIo => {
            queues.slow_wq.push_back(Arc::clone(&submission));
            if !queues.run_slow_linked {
                queues.wq.push_back(QueueEntry::RunSlow);
                queues.run_slow_linked = true;
            }
        }
        WorkKind::Cpu | WorkKind::FastIo => {
            queues.wq.push_back(QueueEntry::Work(Arc::clone(&submission)));
        }
    }
    if queues.idle_threads > 0 {
        pool.condvar.notify_one();
    }
    drop(queues);

    SubmissionHandle(submission)
}

/// Attempts to cancel a previously submitted item. Succeeds only if no worker thread has
/// started running it yet; once a worker has popped it off a queue this always returns
/// [`CancelError::Busy`], even if the work function hasn't actually started executing.
pub(crate) fn cancel(handle: &SubmissionHandle) -> Result<(), CancelError> {
    let pool = state::global();
    let mut queues = pool.mutex.lock().expect("pool mutex poisoned");

    let removed = match handle.0.kind {
        WorkKind::SlowIo => queues.slow_wq.remove_first(|item| Arc::ptr_eq(item, &handle.0)).is_some(),
        WorkKind::Cpu | WorkKind::FastIo => queues
            .wq
            .remove_first(|entry| matches!(entry, QueueEntry::Work(item) if Arc::ptr_eq(item, &handle.0)))
            .is_some(),
    };
    drop(queues);

    if !removed {
        return Err(CancelError::Busy);
    }

    let body = handle
        .0
        .body
        .lock()
        .expect("submission mutex poisoned")
        .take()
        .expect("a submission just removed from a work queue must still carry its body");
    handle.0.sink.push_completion(CompletionRecord { done: body.done, status: CompletionStatus::Cancelled });
    handle.0.sink.wake();
    Ok(())
}
