// Copyright (c) 2026 the evloop-core authors. Licensed under Apache License, Version 2.0.

use miette::Diagnostic;
use thiserror::Error;

/// Why a cancellation request was refused.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum CancelError {
    /// The item is no longer sitting in a queue: a worker has already taken it (and may be
    /// running it, or have already finished), or it was already cancelled once.
    #[error("submission is already running or completed; cannot cancel")]
    #[diagnostic(
        code(evloop_core::pool::cancel::busy),
        help("cancellation is best-effort; check the completion status delivered to `done` instead of retrying cancel")
    )]
    Busy,
}
