// Copyright (c) 2026 the evloop-core authors. Licensed under Apache License, Version 2.0.

//! Resolves the pool's thread count, mirroring `UV_THREADPOOL_SIZE`.

use std::env;

/// Used when the environment variable is unset, empty, non-numeric, or non-positive.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Hard ceiling on worker thread count, matching libuv's `MAX_THREADPOOL_SIZE`.
pub const MAX_POOL_SIZE: usize = 1024;

pub const POOL_SIZE_ENV: &str = "POOL_SIZE";

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub nthreads: usize,
}

impl PoolConfig {
    /// Reads `POOL_SIZE` from the environment and resolves it to a thread count in
    /// `[1, MAX_POOL_SIZE]`.
    pub fn resolve() -> Self {
        Self::from_raw(env::var(POOL_SIZE_ENV).ok())
    }

    fn from_raw(raw: Option<String>) -> Self {
        let nthreads = match &raw {
            None => DEFAULT_POOL_SIZE,
            Some(s) => match s.trim().parse::<i64>() {
                Ok(n) if n > 0 => (n as u64).min(MAX_POOL_SIZE as u64) as usize,
                // empty, non-numeric, zero, or negative: one thread, not the default.
                _ => 1,
            },
        };
        tracing::debug!(nthreads, raw = ?raw, "resolved pool size");
        Self { nthreads }
    }
}
