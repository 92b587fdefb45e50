// Copyright (c) 2026 the evloop-core authors. Licensed under Apache License, Version 2.0.

//! Worker thread pool, deadline-ordered timer heap, and the cross-thread wiring that
//! connects them to an owning event loop.
//!
//! This crate is the *core* of a non-blocking I/O runtime: it does not poll file
//! descriptors, does not implement DNS/filesystem/child-process request types, and does
//! not run an outer prepare/check/idle loop. Those are the job of a consumer that sits on
//! top of [`loop_core::EventLoop`]. What this crate does provide:
//!
//! - [`pool`]: a process-wide worker thread pool with slow-I/O fairness (see
//!   [`pool::WorkKind::SlowIo`]), submission, and best-effort cancellation.
//! - [`timer`]: a deadline-ordered min-heap of repeatable timers (see [`timer::Timers`]).
//! - [`loop_core`]: the glue that owns a loop's timer heap and completion queue, and the
//!   coalescing cross-thread wake signal a worker uses to interrupt a blocked loop.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                              EVENT LOOP CORE                             │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │                                                                          │
//! │   submit(kind, work, done)                                              │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌───────────────┐   worker threads    ┌───────────────────────────┐    │
//! │  │  pool::Pool   │ ──────────────────► │  user `work` runs here    │    │
//! │  │  WQ / SLOW_WQ │                     └─────────────┬─────────────┘    │
//! │  └───────────────┘                                   │ push completion  │
//! │        ▲                                              ▼                 │
//! │        │                                  ┌─────────────────────────┐   │
//! │        │                                  │ loop_core::EventLoop    │   │
//! │        │                                  │  - completion queue LWQ │   │
//! │        │                                  │  - WakeHandle (coalesce)│   │
//! │        │                                  │  - timer::Timers heap   │   │
//! │        └──────────────── cancel() ────────┤                         │   │
//! │                                           └─────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Submission and cancellation cross from the loop thread into the pool's shared state;
//! completions cross back from a worker thread into the owning loop's completion queue and
//! wake signal. The timer heap never leaves the loop thread.

pub mod loop_core;
pub mod pool;
pub mod queue;
pub mod timer;

pub use loop_core::{EventLoop, LoopError};
pub use pool::{CancelError, CompletionStatus, SubmissionHandle, WorkKind};
pub use timer::{TimerHandle, Timers};
