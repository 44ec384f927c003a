/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{ExecutionContext, RunStatus};
use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A queue that pulls jobs with ids in a contiguous initial segment of the
/// natural numbers from an iterator out of order and implements an iterator
/// in which they can be pulled in order.
///
/// If some id is never received, the iterator ends at the first missing id.
struct TaskQueue<I: Iterator> {
    iter: I,
    jobs: Vec<Option<I::Item>>,
    next_id: usize,
}

trait JobId {
    fn id(&self) -> usize;
}

impl<T> JobId for (usize, T) {
    fn id(&self) -> usize {
        self.0
    }
}

impl<I: Iterator> TaskQueue<I> {
    fn new(iter: I) -> Self {
        Self {
            iter,
            jobs: vec![],
            next_id: 0,
        }
    }
}

impl<I: Iterator> Iterator for TaskQueue<I>
where
    I::Item: JobId,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.jobs.get_mut(self.next_id) {
                if item.is_some() {
                    self.next_id += 1;
                    return item.take();
                }
            }
            let item = self.iter.next()?;
            let id = item.id();
            if id >= self.jobs.len() {
                self.jobs.resize_with(id + 1, || None);
            }
            self.jobs[id] = Some(item);
        }
    }
}

/// An iterator over items received from a channel that uses rayon's
/// `yield_now` to avoid blocking worker threads.
///
/// Outside of a thread pool it simply blocks.
struct ChannelIter<T> {
    rx: Receiver<T>,
}

impl<T> Iterator for ChannelIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.rx.try_recv() {
                Ok(item) => return Some(item),
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => match rayon::yield_now() {
                    None => return self.rx.recv().ok(),
                    Some(rayon::Yield::Executed) => {}
                    Some(rayon::Yield::Idle) => {
                        match self.rx.recv_timeout(Duration::from_millis(1)) {
                            Ok(item) => return Some(item),
                            Err(RecvTimeoutError::Disconnected) => return None,
                            Err(RecvTimeoutError::Timeout) => {}
                        }
                    }
                },
            }
        }
    }
}

impl ExecutionContext {
    /// Runs `task` on the job ids `0 . . jobs` in parallel, and passes the
    /// results to `consume` on the calling thread in job-id order, while
    /// later jobs are still running.
    ///
    /// At most [`concurrency`](ExecutionContext::concurrency) jobs run at the
    /// same time. If a job or `consume` fails, or termination is requested,
    /// no further job is started; the method waits for the jobs in flight,
    /// and then returns the first error, or [`RunStatus::Cancelled`].
    pub fn run_ordered<T, F, C>(&self, jobs: usize, task: F, mut consume: C) -> Result<RunStatus>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync,
        C: FnMut(usize, T) -> Result<()>,
    {
        let num_workers = self.concurrency().min(jobs);
        let cursor = AtomicUsize::new(0);
        let abort = AtomicBool::new(false);
        let failure = Mutex::new(None);
        let mut consumed = 0;

        self.pool().in_place_scope(|s| {
            let (tx, rx) = crossbeam_channel::unbounded();
            for _ in 0..num_workers {
                let tx = tx.clone();
                let (cursor, abort, failure, task) = (&cursor, &abort, &failure, &task);
                s.spawn(move |_| loop {
                    if abort.load(Ordering::Relaxed) || !self.running() {
                        break;
                    }
                    let id = cursor.fetch_add(1, Ordering::Relaxed);
                    if id >= jobs {
                        break;
                    }
                    match task(id) {
                        Ok(result) => {
                            if tx.send((id, result)).is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            log::debug!("Job {id} failed");
                            abort.store(true, Ordering::Relaxed);
                            failure
                                .lock()
                                .unwrap_or_else(|e| e.into_inner())
                                .get_or_insert(err);
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for (id, result) in TaskQueue::new(ChannelIter { rx }) {
                if let Err(err) = consume(id, result) {
                    abort.store(true, Ordering::Relaxed);
                    failure
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .get_or_insert(err);
                    break;
                }
                consumed += 1;
            }
        });

        if let Some(err) = failure.into_inner().unwrap_or_else(|e| e.into_inner()) {
            return Err(err);
        }
        if consumed == jobs {
            Ok(RunStatus::Completed)
        } else {
            debug_assert!(!self.running());
            Ok(RunStatus::Cancelled)
        }
    }
}
