// Copyright (c) 2026 the evloop-core authors. Licensed under Apache License, Version 2.0.

//! The glue that ties a single event loop's timer heap, completion queue, and cross-thread
//! wake signal together, plus the lifecycle bookkeeping (`active_reqs`, `close`) that
//! decides when the loop has nothing left to do.
//!
//! This module does **not** poll file descriptors, run signal handlers, or implement the
//! outer prepare/check/idle phases a full event loop needs — those are a consumer's job.
//! [`EventLoop::run_once`] stands in for the portion of `uv_run`'s body this crate owns:
//! compute a timeout from the timer heap, block on the wake signal for at most that long
//! (the external I/O wait this crate does not implement), then drain completions and fire
//! due timers.

mod error;
mod wake;

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub use error::LoopError;

use crate::pool::{self, CompletionRecord, CompletionSink, CompletionStatus, SubmissionHandle, WorkKind};
use crate::queue::IntrusiveQueue;
use crate::timer::{TimerCallback, TimerHandle, Timers};
use wake::WakeHandle;

/// The part of a loop's state a worker thread needs to reach back into: the completion
/// queue (`LWQ`) and its guarding mutex (`LM`), plus the wake signal. Lives behind an `Arc`
/// so the pool can hold a `CompletionSink` trait object without knowing about the rest of
/// [`EventLoop`]; the wake handle itself has no bearing on "active handle" counts (it is
/// not tracked in [`EventLoop::active_reqs`] at all).
struct LoopShared {
    lwq: Mutex<IntrusiveQueue<CompletionRecord>>,
    wake: WakeHandle,
}

impl CompletionSink for LoopShared {
    fn push_completion(&self, record: CompletionRecord) {
        self.lwq.lock().expect("loop completion mutex poisoned").push_back(record);
    }

    fn wake(&self) {
        self.wake.signal();
    }
}

/// A single event loop: owns a timer heap, a completion queue shared with the
/// process-wide worker pool, and the lifecycle counters that decide whether the loop has
/// any more work to do. Not `Send`/`Sync` — like libuv's `uv_loop_t`, a loop is only ever
/// touched from the single thread that owns it; cross-thread hand-off happens through
/// [`LoopShared`], not through `EventLoop` itself.
pub struct EventLoop {
    shared: Arc<LoopShared>,
    timers: Timers,
    start: Instant,
    active_reqs: Cell<i64>,
    closed: Cell<bool>,
    data: RefCell<Option<Box<dyn Any>>>,
}

impl EventLoop {
    /// Constructs a fresh loop: empty timer heap, empty completion queue, a fresh wake
    /// handle, zeroed counters. Mirrors `uv_loop_init`'s "zero state but preserve `data`"
    /// contract, except `data` starts `None` here since there is nothing to preserve yet.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(LoopShared { lwq: Mutex::new(IntrusiveQueue::new()), wake: WakeHandle::new() }),
            timers: Timers::new(),
            start: Instant::now(),
            active_reqs: Cell::new(0),
            closed: Cell::new(false),
            data: RefCell::new(None),
        }
    }

    /// The opaque user payload threaded through this loop, if any has been set.
    pub fn data(&self) -> std::cell::Ref<'_, Option<Box<dyn Any>>> {
        self.data.borrow()
    }

    /// Replaces the opaque user payload, returning whatever was there before.
    pub fn set_data(&self, data: Option<Box<dyn Any>>) -> Option<Box<dyn Any>> {
        self.data.replace(data)
    }

    /// Monotonic milliseconds since this loop was constructed. This crate reads the clock
    /// fresh on every call rather than caching a per-iteration snapshot, since the only
    /// "iteration" concept it owns is [`EventLoop::run_once`] itself.
    pub fn loop_time(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Direct access to this loop's timer heap, for callers that want `stop`/`again`
    /// without going through [`EventLoop::start_timer`].
    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// Arms a new timer at `loop_time + timeout`. Fails with [`LoopError::Closing`] if the
    /// loop has already been closed; a closing loop must not accumulate new scheduled
    /// work it will never run.
    pub fn start_timer(&self, timeout: u64, repeat: u64, callback: TimerCallback) -> Result<TimerHandle, LoopError> {
        if self.closed.get() {
            return Err(LoopError::Closing);
        }
        Ok(self.timers.start(self.loop_time(), timeout, repeat, callback))
    }

    /// How long, in milliseconds, this loop may block waiting for I/O before a timer
    /// becomes due: `-1` if no timer is armed, `0` if one is already due.
    pub fn next_timeout(&self) -> i64 {
        self.timers.next_timeout(self.loop_time())
    }

    /// Fires every timer whose deadline has passed, earliest (and, for ties, earliest
    /// submitted) first.
    pub fn run_timers(&self) {
        self.timers.run_timers(self.loop_time());
    }

    /// Submits `work` to the process-wide pool, tagged `kind`; `done` runs on this loop's
    /// thread once the item completes or is cancelled. Bumps `active_reqs` until the
    /// matching `done` has been invoked, the bookkeeping [`EventLoop::close`] checks.
    pub fn submit(
        &self,
        kind: WorkKind,
        work: impl FnOnce() + Send + 'static,
        done: impl FnOnce(CompletionStatus) + Send + 'static,
    ) -> SubmissionHandle {
        self.active_reqs.set(self.active_reqs.get() + 1);
        let sink = Arc::clone(&self.shared) as Arc<dyn CompletionSink>;
        pool::submit(sink, kind, Box::new(work), Box::new(done))
    }

    /// Attempts to cancel a submission made through [`EventLoop::submit`] on this same
    /// loop. On success `done` is still invoked (with [`CompletionStatus::Cancelled`])
    /// the next time this loop drains completions.
    pub fn cancel(&self, handle: &SubmissionHandle) -> Result<(), LoopError> {
        pool::cancel(handle).map_err(LoopError::from)
    }

    /// Moves every completion waiting in this loop's completion queue into a local batch
    /// and invokes each one's `done` callback, in the order workers appended them. Returns
    /// how many completions were drained. Holds the completion-queue mutex only for the
    /// splice, not for the duration of the `done` calls themselves.
    pub fn drain_completions(&self) -> usize {
        let local = {
            let mut lwq = self.shared.lwq.lock().expect("loop completion mutex poisoned");
            lwq.take_all()
        };
        let mut drained = 0;
        for record in local {
            drained += 1;
            self.active_reqs.set(self.active_reqs.get() - 1);
            tracing::trace!(status = ?record.status, "draining completion");
            (record.done)(record.status);
        }
        drained
    }

    /// Whether this loop has any reason to keep iterating: outstanding submissions not
    /// yet completed, or an armed timer. A loop with neither would block in
    /// [`EventLoop::run_once`] forever, so callers should stop instead, mirroring
    /// `uv_run`'s `UV_RUN_DEFAULT` early return when no handles/requests are active.
    pub fn is_alive(&self) -> bool {
        self.active_reqs.get() > 0 || self.timers.active_count() > 0
    }

    /// Current count of submissions whose `done` has not yet run. Exposed mainly for
    /// tests asserting that it returns to zero once every completion has drained.
    pub fn active_reqs(&self) -> i64 {
        self.active_reqs.get()
    }

    /// Runs one iteration: compute how long a blocked I/O wait may last from the timer
    /// heap, block on the wake signal for at most that long (standing in for the real I/O
    /// wait this crate does not implement), then drain completions and fire due timers.
    /// Returns whether the loop is still alive (has more work coming), so a caller can
    /// loop `while loop.run_once() {}` the way `uv_run` loops internally.
    pub fn run_once(&self) -> bool {
        if !self.is_alive() {
            return false;
        }
        let timeout = self.next_timeout();
        let woke = self.shared.wake.wait(if timeout < 0 { None } else { Some(Duration::from_millis(timeout as u64)) });
        tracing::trace!(timeout, woke, "loop iteration returned from wait");
        self.drain_completions();
        self.run_timers();
        self.is_alive()
    }

    /// Runs iterations until the loop has no more outstanding work, the moral equivalent
    /// of `uv_run(loop, UV_RUN_DEFAULT)`.
    pub fn run(&self) {
        while self.run_once() {}
    }

    /// Discards this process's pool singleton and re-arms nothing else: this crate owns no
    /// polling backend, signal pipe, or async-wake OS object to re-create after `fork`. A
    /// consumer embedding this crate in a full loop is responsible for re-creating its own
    /// polling backend and re-arming its watchers after `fork`; this call only covers the
    /// part of fork hygiene this crate owns.
    pub fn reset_after_fork(&self) {
        pool::reset_after_fork();
    }

    /// Tears the loop down: asserts (debug builds only, matching libuv's `UV_ASSERT` in
    /// `uv__loop_close`) that the completion queue is empty and no requests remain
    /// in-flight, then marks the loop closed so further [`EventLoop::start_timer`] calls
    /// are rejected.
    pub fn close(&self) {
        debug_assert!(
            self.shared.lwq.lock().expect("loop completion mutex poisoned").is_empty(),
            "closing a loop with completions still queued"
        );
        debug_assert_eq!(self.active_reqs.get(), 0, "closing a loop with requests still in flight");
        tracing::debug!("loop closed");
        self.closed.set(true);
    }

    /// Whether [`EventLoop::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("active_reqs", &self.active_reqs.get())
            .field("active_timers", &self.timers.active_count())
            .field("closed", &self.closed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    #[serial_test::serial]
    fn basic_cpu_submission_completes_once() {
        std::env::set_var(pool::POOL_SIZE_ENV, "4");
        let event_loop = EventLoop::new();
        let value = Arc::new(Mutex::new(0));
        let value2 = Arc::clone(&value);
        let done_status = Arc::new(Mutex::new(None));
        let done_status2 = Arc::clone(&done_status);

        event_loop.submit(
            WorkKind::Cpu,
            move || *value2.lock().unwrap() = 42,
            move |status| *done_status2.lock().unwrap() = Some(status),
        );

        // Blocks until the worker's completion signals this loop's wake handle, then
        // drains it and fires any due timers (there are none here).
        event_loop.run_once();

        assert_eq!(*value.lock().unwrap(), 42);
        assert_eq!(*done_status.lock().unwrap(), Some(CompletionStatus::Ok));
        assert_eq!(event_loop.active_reqs(), 0);
        event_loop.close();
        pool::shutdown();
        std::env::remove_var(pool::POOL_SIZE_ENV);
    }

    #[test]
    fn next_timeout_is_negative_one_when_no_timers_armed() {
        let event_loop = EventLoop::new();
        assert_eq!(event_loop.next_timeout(), -1);
        assert!(!event_loop.is_alive());
    }

    #[test]
    fn starting_a_timer_on_a_closed_loop_is_rejected() {
        let event_loop = EventLoop::new();
        event_loop.close();
        let result = event_loop.start_timer(10, 0, Box::new(|_, _| {}));
        assert_eq!(result.err(), Some(LoopError::Closing));
    }

    #[test]
    fn equal_deadline_timers_fire_in_submission_order() {
        let event_loop = EventLoop::new();
        let order: std::rc::Rc<RefCell<Vec<&'static str>>> = std::rc::Rc::new(RefCell::new(Vec::new()));
        for label in ["a", "b", "c"] {
            let order = order.clone();
            event_loop
                .start_timer(10, 0, Box::new(move |_, _| order.borrow_mut().push(label)))
                .unwrap();
        }

        // Timers were armed relative to the loop's own monotonic clock; advancing past
        // "now + 10" is enough to make all three due regardless of how much wall time the
        // test itself already spent.
        event_loop.timers().run_timers(event_loop.loop_time() + 10);
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }
}
