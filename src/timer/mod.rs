// Copyright (c) 2026 the evloop-core authors. Licensed under Apache License, Version 2.0.

//! Deadline-ordered, repeatable timers for a single loop.
//!
//! A [`Timers`] service owns a min-heap of timers keyed by `(deadline, start_id)`; the
//! loop consults [`Timers::next_timeout`] to decide how long it may block waiting for I/O,
//! and calls [`Timers::run_timers`] once per iteration to fire everything whose deadline
//! has passed. None of this crosses a thread boundary — a `Timers` handle is `Rc`-based
//! and is only ever touched from the loop's own thread, which is why it uses `RefCell`
//! rather than the `Mutex`-based style the pool uses for its cross-thread state.

mod heap;

use std::cell::RefCell;
use std::rc::Rc;

use heap::{NodeRef, TimerHeap, TimerNode};

pub(crate) type TimerCallback = Box<dyn FnMut(&Timers, &TimerHandle)>;

/// A single scheduled timer. Cloning shares the same underlying timer; firing, stopping,
/// or restarting through any clone affects all of them, matching a `uv_timer_t*` handle.
#[derive(Clone)]
pub struct TimerHandle(NodeRef);

impl TimerHandle {
    /// The deadline currently armed for this timer, in the same units as the loop's clock.
    pub fn deadline(&self) -> u64 {
        self.0.borrow().deadline
    }

    /// Whether this timer is presently linked into its heap (i.e. will fire).
    pub fn is_active(&self) -> bool {
        self.0.borrow().heap_index.is_some()
    }

    pub fn repeat(&self) -> u64 {
        self.0.borrow().repeat
    }

    /// Changes the repeat interval used the next time this timer restarts. Does not affect
    /// a deadline already armed, matching `uv_timer_set_repeat`.
    pub fn set_repeat(&self, repeat: u64) {
        self.0.borrow_mut().repeat = repeat;
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("TimerHandle")
            .field("deadline", &inner.deadline)
            .field("repeat", &inner.repeat)
            .field("start_id", &inner.start_id)
            .field("active", &inner.heap_index.is_some())
            .finish()
    }
}

/// Saturating `loop_time + timeout`, clamped to `u64::MAX` on overflow rather than
/// wrapping. A wrapped deadline would sort as "already due" and fire every timer early;
/// clamping instead just pushes the deadline arbitrarily (and harmlessly) far out.
fn clamp_deadline(loop_time: u64, timeout: u64) -> u64 {
    loop_time.checked_add(timeout).unwrap_or(u64::MAX)
}

#[derive(Default)]
struct TimersInner {
    heap: TimerHeap,
    next_start_id: u64,
}

/// Owns a loop's timer heap. Cheap to clone (an `Rc` to shared state); every clone sees
/// the same timers.
#[derive(Clone, Default)]
pub struct Timers {
    inner: Rc<RefCell<TimersInner>>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a new timer at `loop_time + timeout`, firing `callback` when it becomes due. If
    /// `repeat` is non-zero the timer re-arms itself (at `fire_time + repeat`) immediately
    /// before each invocation of `callback`, until stopped.
    pub fn start(
        &self,
        loop_time: u64,
        timeout: u64,
        repeat: u64,
        callback: TimerCallback,
    ) -> TimerHandle {
        let mut inner = self.inner.borrow_mut();
        let start_id = inner.next_start_id;
        inner.next_start_id += 1;
        let node = Rc::new(RefCell::new(TimerNode {
            deadline: clamp_deadline(loop_time, timeout),
            repeat,
            start_id,
            heap_index: None,
            callback: Some(callback),
        }));
        inner.heap.insert(node.clone());
        TimerHandle(node)
    }

    /// Unlinks `handle` from the heap. A no-op if it is already stopped.
    pub fn stop(&self, handle: &TimerHandle) {
        self.inner.borrow_mut().heap.remove(&handle.0);
    }

    /// Re-arms `handle` at `loop_time + handle.repeat()`. Does nothing if the timer has no
    /// repeat interval set, matching `uv_timer_again`'s silent no-op in that case.
    pub fn again(&self, loop_time: u64, handle: &TimerHandle) {
        let repeat = handle.0.borrow().repeat;
        if repeat == 0 {
            return;
        }
        self.restart_at(loop_time, &handle.0, repeat);
    }

    fn restart_at(&self, loop_time: u64, node: &NodeRef, repeat: u64) {
        let mut inner = self.inner.borrow_mut();
        inner.heap.remove(node);
        let start_id = inner.next_start_id;
        inner.next_start_id += 1;
        {
            let mut n = node.borrow_mut();
            n.deadline = clamp_deadline(loop_time, repeat);
            n.start_id = start_id;
        }
        inner.heap.insert(node.clone());
    }

    /// Number of timers currently armed (linked into the heap). Used by a loop to decide
    /// whether it has any reason to keep iterating on timers alone.
    pub fn active_count(&self) -> usize {
        self.inner.borrow().heap.len()
    }

    /// How long (in the loop clock's units) the loop may block before the next timer
    /// becomes due: `-1` if there are no timers at all, `0` if one is already due, else the
    /// distance to the nearest deadline, capped at `i32::MAX` the way `uv__next_timeout`
    /// caps its return value for an `int` millisecond argument.
    pub fn next_timeout(&self, loop_time: u64) -> i64 {
        let inner = self.inner.borrow();
        let Some(min) = inner.heap.peek_min() else { return -1 };
        let deadline = min.borrow().deadline;
        if deadline <= loop_time {
            return 0;
        }
        (deadline - loop_time).min(i32::MAX as u64) as i64
    }

    /// Fires every timer whose deadline is `<= loop_time`, earliest first. A repeating
    /// timer is restarted (computing its new deadline from `loop_time`, not from its old
    /// deadline) *before* its callback runs, so a callback that calls `stop` on itself
    /// prevents the next firing, and one that does nothing keeps repeating on schedule.
    pub fn run_timers(&self, loop_time: u64) {
        loop {
            let due = {
                let inner = self.inner.borrow();
                match inner.heap.peek_min() {
                    Some(node) if node.borrow().deadline <= loop_time => Some(node),
                    _ => None,
                }
            };
            let Some(node) = due else { break };

            self.inner.borrow_mut().heap.remove(&node);
            let repeat = node.borrow().repeat;
            if repeat != 0 {
                self.restart_at(loop_time, &node, repeat);
            }

            let callback = node.borrow_mut().callback.take();
            if let Some(mut callback) = callback {
                let handle = TimerHandle(node.clone());
                callback(self, &handle);
                node.borrow_mut().callback = Some(callback);
            }
        }
    }
}

impl std::fmt::Debug for Timers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timers")
            .field("armed", &!self.inner.borrow().heap.is_empty())
            .finish()
    }
}
