/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{partitions, ExecutionContext, Partition};
use anyhow::Result;
use dsi_progress_logger::ConcurrentProgressLog;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// The outcome of a partitioned computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunStatus {
    /// Every partition was processed.
    Completed,
    /// Termination was requested: the partitions that completed hold valid
    /// values, the others hold whatever was written before the request.
    Cancelled,
}

impl RunStatus {
    pub fn is_completed(&self) -> bool {
        *self == RunStatus::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        *self == RunStatus::Cancelled
    }
}

impl core::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RunStatus::Completed => f.write_str("completed"),
            RunStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

impl ExecutionContext {
    /// Runs `task` on each [partition](partitions) of `[0 . . total)`.
    ///
    /// At most [`concurrency`](ExecutionContext::concurrency) tasks run at the
    /// same time on the pool of the context; the call blocks until all of
    /// them are done. A partition that has not been started when termination
    /// is requested is skipped. Tasks are expected to check the
    /// [termination flag](ExecutionContext::running) at each unit of work, so
    /// a partition is complete only if it returned while the flag was not
    /// set. The method returns [`RunStatus::Completed`] if every partition
    /// is complete, and [`RunStatus::Cancelled`] otherwise.
    ///
    /// If a task fails, no further partition is started, but tasks in flight
    /// are allowed to finish; then the first error is returned.
    ///
    /// The progress logger is updated with the length of each completed
    /// partition.
    pub fn run_partitioned<F>(
        &self,
        total: usize,
        task: F,
        pl: &mut impl ConcurrentProgressLog,
    ) -> Result<RunStatus>
    where
        F: Fn(Partition) -> Result<()> + Sync,
    {
        let parts = partitions(total, self.concurrency());
        let num_workers = self.concurrency().min(parts.len());
        let cursor = AtomicUsize::new(0);
        let completed = AtomicUsize::new(0);
        let failure = Mutex::new(None);
        log::debug!(
            "Running {} partitions of {} elements on {} workers",
            parts.len(),
            total,
            num_workers
        );

        self.pool().scope(|s| {
            for worker in 0..num_workers {
                let mut local_pl = pl.clone();
                let (parts, cursor, completed, failure, task) =
                    (&parts, &cursor, &completed, &failure, &task);
                s.spawn(move |_| {
                    loop {
                        if !self.running() {
                            break;
                        }
                        let next = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(&part) = parts.get(next) else {
                            break;
                        };
                        if let Err(err) = task(part) {
                            log::debug!("Worker {worker} failed on partition {}", part.id);
                            // Stop handing out partitions
                            cursor.store(parts.len(), Ordering::Relaxed);
                            failure
                                .lock()
                                .unwrap_or_else(|e| e.into_inner())
                                .get_or_insert(err);
                            break;
                        }
                        if self.running() {
                            completed.fetch_add(1, Ordering::Relaxed);
                        }
                        local_pl.update_with_count(part.len);
                    }
                });
            }
        });

        if let Some(err) = failure.into_inner().unwrap_or_else(|e| e.into_inner()) {
            return Err(err);
        }

        let completed = completed.into_inner();
        if completed < parts.len() {
            log::debug!(
                "Run terminated after completing {} of {} partitions",
                completed,
                parts.len()
            );
            return Ok(RunStatus::Cancelled);
        }
        Ok(RunStatus::Completed)
    }
}
