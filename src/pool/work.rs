// Copyright (c) 2026 the evloop-core authors. Licensed under Apache License, Version 2.0.

//! The work item type that travels from a submitter's thread to a worker thread and back.

use std::sync::{Arc, Mutex};

/// Which queue a work item is dispatched through, and therefore how it competes with other
/// work for worker threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    /// CPU-bound work: zlib compression, `crypto`, user-supplied `uv_queue_work` callbacks.
    Cpu,
    /// Fast filesystem calls that may still block briefly.
    FastIo,
    /// Filesystem calls expected to block for a while (`readdir` over a slow mount, `fsync`,
    /// DNS lookups). Subject to the pool's fairness cap so a burst of these can't starve
    /// [`WorkKind::Cpu`] and [`WorkKind::FastIo`] work.
    SlowIo,
}

/// Outcome delivered to a work item's `done` callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionStatus {
    /// The work function ran to completion.
    Ok,
    /// The item was cancelled before a worker thread picked it up; its work function never
    /// ran.
    Cancelled,
}

/// A completed (or cancelled) work item's `done` callback, paired with the outcome to pass
/// it. Handed to a [`CompletionSink`] rather than the work item itself, so the loop side of
/// this crate never needs to know about [`Submission`]'s internals.
pub struct CompletionRecord {
    pub(crate) done: Box<dyn FnOnce(CompletionStatus) + Send + 'static>,
    pub(crate) status: CompletionStatus,
}

impl std::fmt::Debug for CompletionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionRecord").field("status", &self.status).finish()
    }
}

/// The owning loop's side of a submission: where a worker delivers a finished (or
/// cancelled) item's completion, and how it wakes a loop that may be blocked waiting for
/// one. Implemented by [`crate::loop_core::EventLoop`]'s shared state; the pool only ever
/// sees it as a trait object, so `pool` has no compile-time dependency on `loop_core`.
pub trait CompletionSink: Send + Sync + 'static {
    fn push_completion(&self, record: CompletionRecord);
    fn wake(&self);
}

pub(crate) struct WorkBody {
    pub(crate) work: Box<dyn FnOnce() + Send + 'static>,
    pub(crate) done: Box<dyn FnOnce(CompletionStatus) + Send + 'static>,
}

/// A work item that has been accepted by the pool. Lives behind an `Arc` so both the
/// pool's internal queues and the [`SubmissionHandle`] returned to the submitter can refer
/// to it; its `body` is taken exactly once, either by the worker that runs it or by a
/// racing [`crate::pool::cancel`].
pub(crate) struct Submission {
    pub(crate) kind: WorkKind,
    pub(crate) body: Mutex<Option<WorkBody>>,
    pub(crate) sink: Arc<dyn CompletionSink>,
}

/// A handle to a submitted work item, usable to request cancellation.
#[derive(Clone)]
pub struct SubmissionHandle(pub(crate) Arc<Submission>);

impl std::fmt::Debug for SubmissionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionHandle").field("kind", &self.0.kind).finish()
    }
}
