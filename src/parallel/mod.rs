/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Parallel execution of node-indexed workloads.
//!
//! All parallel work in this crate (store scans, adjacency compression and
//! algorithms) is executed through an [`ExecutionContext`], which bundles a
//! [thread pool](rayon::ThreadPool), a concurrency level and a
//! [`TerminationFlag`]. The context is passed explicitly to every function
//! that may partition work: there is no global pool.
//!
//! Termination is cooperative: tasks check [`TerminationFlag::running`] at
//! each unit of work, and stop early when the flag has been set. Once set, a
//! flag stays set.

mod partition;
pub use partition::*;

mod runner;
pub use runner::*;

mod ordered;

use anyhow::{ensure, Result};
use rayon::ThreadPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// The computation was interrupted by its [`TerminationFlag`].
///
/// Imports return this error when terminated, as they never produce a
/// partial graph; algorithms instead report a
/// [cancelled status](RunStatus::Cancelled).
#[derive(Error, Debug)]
#[error("The computation was interrupted")]
pub struct Interrupted;

/// A sticky, shareable flag requesting cooperative termination.
///
/// Cloning the flag yields a handle to the same flag, so it can be set
/// out-of-band (e.g., by a timeout or an explicit abort) while a computation
/// is running.
#[derive(Debug, Clone, Default)]
pub struct TerminationFlag(Arc<AtomicBool>);

impl TerminationFlag {
    /// Creates a new flag in the running state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests termination. There is no way to reset the flag.
    pub fn terminate(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns true if termination has not been requested.
    #[inline(always)]
    pub fn running(&self) -> bool {
        !self.0.load(Ordering::Relaxed)
    }

    /// Returns an [`Interrupted`] error if termination has been requested.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.running() {
            Ok(())
        } else {
            Err(Interrupted)
        }
    }
}

/// The context in which parallel work is executed.
///
/// Cloning a context is cheap, and clones share the thread pool and the
/// termination flag.
#[derive(Clone)]
pub struct ExecutionContext {
    pool: Arc<ThreadPool>,
    concurrency: usize,
    termination: TerminationFlag,
}

impl core::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("concurrency", &self.concurrency)
            .field("pool_threads", &self.pool.current_num_threads())
            .field("running", &self.termination.running())
            .finish()
    }
}

impl ExecutionContext {
    /// Creates a context with a dedicated pool of `concurrency` threads.
    ///
    /// Fails if `concurrency` is zero.
    pub fn new(concurrency: usize) -> Result<Self> {
        ensure!(
            concurrency > 0,
            "The concurrency must be positive, got {concurrency}"
        );
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("heapgraph-worker-{i}"))
            .build()?;
        Ok(Self {
            pool: Arc::new(pool),
            concurrency,
            termination: TerminationFlag::new(),
        })
    }

    /// Creates a context using an existing pool.
    ///
    /// The concurrency level determines how work is partitioned, and it can
    /// differ from the number of threads of the pool.
    pub fn with_pool(pool: Arc<ThreadPool>, concurrency: usize) -> Result<Self> {
        ensure!(
            concurrency > 0,
            "The concurrency must be positive, got {concurrency}"
        );
        Ok(Self {
            pool,
            concurrency,
            termination: TerminationFlag::new(),
        })
    }

    /// Returns a context sharing the pool but using the given termination flag.
    pub fn with_termination(mut self, termination: TerminationFlag) -> Self {
        self.termination = termination;
        self
    }

    /// Returns the thread pool.
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    /// Returns the concurrency level.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the termination flag.
    pub fn termination(&self) -> &TerminationFlag {
        &self.termination
    }

    /// Shorthand for `self.termination().running()`.
    #[inline(always)]
    pub fn running(&self) -> bool {
        self.termination.running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_termination_is_sticky() {
        let flag = TerminationFlag::new();
        let clone = flag.clone();
        assert!(flag.running());
        assert!(flag.check().is_ok());
        clone.terminate();
        assert!(!flag.running());
        assert!(flag.check().is_err());
        clone.terminate();
        assert!(!clone.running());
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        assert!(ExecutionContext::new(0).is_err());
        let pool = Arc::new(crate::thread_pool![1]);
        assert!(ExecutionContext::with_pool(pool, 0).is_err());
    }

    #[test]
    fn test_context_shares_flag() {
        let ctx = ExecutionContext::new(2).unwrap();
        let clone = ctx.clone();
        clone.termination().terminate();
        assert!(!ctx.running());
        assert_eq!(ctx.pool().current_num_threads(), 2);
    }
}
