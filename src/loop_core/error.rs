// Copyright (c) 2026 the evloop-core authors. Licensed under Apache License, Version 2.0.

use miette::Diagnostic;
use thiserror::Error;

use crate::pool::CancelError;

/// Failures surfaced by [`super::EventLoop`]'s public API.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum LoopError {
    /// Forwarded from a cancellation attempt on an item that has already begun running.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cancel(#[from] CancelError),

    /// A timer was started after [`super::EventLoop::close`] began tearing the loop down.
    #[error("cannot start a timer on a loop that is closing or already closed")]
    #[diagnostic(
        code(evloop_core::loop_core::timer::closing),
        help("stop scheduling new work once `close` has been called; construct a new EventLoop instead")
    )]
    Closing,
}
