// Copyright (c) 2026 the evloop-core authors. Licensed under Apache License, Version 2.0.

//! A coalescing cross-thread wake signal standing in for libuv's `uv_async_t`.
//!
//! Any thread may call [`WakeHandle::signal`]; the loop thread blocks in
//! [`WakeHandle::wait`]. Multiple signals that land before the loop thread next wakes
//! collapse into a single pending wake (this crate does not implement the OS-level event
//! object itself — no eventfd/kqueue EVFILT_USER/IOCP handle — only the semantics a loop
//! needs from one).

use std::sync::{Condvar, Mutex};
use std::time::Duration;

#[derive(Default)]
pub(crate) struct WakeHandle {
    pending: Mutex<bool>,
    condvar: Condvar,
}

impl WakeHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Marks a wake as pending and notifies a waiter. Safe to call from any thread,
    /// including concurrently; a second signal before the loop thread wakes is a no-op
    /// beyond the flag already being set.
    pub(crate) fn signal(&self) {
        let mut pending = self.pending.lock().expect("wake handle mutex poisoned");
        *pending = true;
        self.condvar.notify_one();
    }

    /// Blocks the calling (loop) thread until a wake is pending, or until `timeout`
    /// elapses if given. `None` blocks indefinitely, standing in for the `-1` ("block
    /// forever") result of [`crate::timer::Timers::next_timeout`]. Returns whether a wake
    /// was actually observed (`false` on a timeout with nothing pending).
    pub(crate) fn wait(&self, timeout: Option<Duration>) -> bool {
        let pending = self.pending.lock().expect("wake handle mutex poisoned");
        let mut pending = match timeout {
            Some(d) => {
                let (guard, result) = self
                    .condvar
                    .wait_timeout_while(pending, d, |p| !*p)
                    .expect("wake handle mutex poisoned");
                if result.timed_out() && !*guard {
                    return false;
                }
                guard
            }
            None => self
                .condvar
                .wait_while(pending, |p| !*p)
                .expect("wake handle mutex poisoned"),
        };
        let was_pending = *pending;
        *pending = false;
        was_pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_returns_false_on_timeout_with_nothing_pending() {
        let handle = WakeHandle::new();
        assert!(!handle.wait(Some(Duration::from_millis(20))));
    }

    #[test]
    fn signal_before_wait_is_observed_immediately() {
        let handle = WakeHandle::new();
        handle.signal();
        assert!(handle.wait(Some(Duration::from_millis(20))));
    }

    #[test]
    fn concurrent_signal_wakes_a_blocked_waiter() {
        let handle = Arc::new(WakeHandle::new());
        let signaller = Arc::clone(&handle);
        let joiner = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            signaller.signal();
        });
        assert!(handle.wait(None));
        joiner.join().unwrap();
    }

    #[test]
    fn repeated_signals_coalesce_into_one_pending_wake() {
        let handle = WakeHandle::new();
        handle.signal();
        handle.signal();
        handle.signal();
        assert!(handle.wait(Some(Duration::from_millis(20))));
        // The three signals collapsed into one pending flag; a second wait with nothing
        // further signalled must time out rather than observe leftover wakes.
        assert!(!handle.wait(Some(Duration::from_millis(20))));
    }
}
