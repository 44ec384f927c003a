/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::parallel::{ExecutionContext, Interrupted, RunStatus};
use crate::store::{DecodeError, RecordCursor, RecordStore, Slot};
use anyhow::Result;
use dsi_progress_logger::ConcurrentProgressLog;

/// The number of pages of a scan range when the number of records per range
/// is not configured.
pub const DEFAULT_PAGES_PER_RANGE: usize = 16;

/// A contiguous range of record ids decoded by a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    /// The index of the range in id order.
    pub id: usize,
    pub start: u64,
    pub end: u64,
}

impl ScanRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Splits the id space of a record store into page-aligned ranges and
/// decodes them in parallel.
///
/// The size of a range does not depend on the concurrency: there are
/// usually many more ranges than workers, and a worker that finishes a range
/// picks the next one not yet taken.
#[derive(Debug)]
pub struct StoreScanner<'a, S> {
    store: &'a S,
    high_id: u64,
    range_size: u64,
}

impl<'a, S: RecordStore + Sync> StoreScanner<'a, S> {
    /// Creates a scanner over the records currently in the store.
    ///
    /// Ranges contain `records_per_range` records if specified, or
    /// [`DEFAULT_PAGES_PER_RANGE`] pages otherwise.
    pub fn new(store: &'a S, records_per_range: Option<usize>) -> Self {
        let range_size = records_per_range
            .unwrap_or(DEFAULT_PAGES_PER_RANGE * store.records_per_page())
            .max(1) as u64;
        Self {
            store,
            high_id: store.high_id(),
            range_size,
        }
    }

    /// Returns the number of ranges.
    pub fn num_ranges(&self) -> usize {
        self.high_id.div_ceil(self.range_size) as usize
    }

    /// Returns the range with the given index.
    pub fn range(&self, id: usize) -> ScanRange {
        let start = id as u64 * self.range_size;
        ScanRange {
            id,
            start,
            end: (start + self.range_size).min(self.high_id),
        }
    }

    /// Returns a reader over the records in use in a range.
    pub fn read(&self, range: ScanRange) -> RangeReader<'a, S> {
        let mut cursor = self.store.cursor();
        cursor.seek(range.start);
        RangeReader {
            cursor,
            next_id: range.start,
            end: range.end,
        }
    }

    /// Decodes all ranges in parallel, passing each range and its reader to
    /// `task`, and the results of the tasks to `consume` in range order.
    ///
    /// The scan fails with the first error of a task or of `consume`; if
    /// termination is requested, it fails with [`Interrupted`].
    pub fn scan<T, F, C>(
        &self,
        ctx: &ExecutionContext,
        task: F,
        mut consume: C,
        pl: &mut impl ConcurrentProgressLog,
    ) -> Result<()>
    where
        T: Send,
        F: Fn(ScanRange, RangeReader<'a, S>) -> Result<T> + Sync,
        C: FnMut(ScanRange, T) -> Result<()>,
    {
        let num_ranges = self.num_ranges();
        log::debug!(
            "Scanning {} records in {} ranges of {} records",
            self.high_id,
            num_ranges,
            self.range_size
        );
        pl.expected_updates(Some(self.high_id as usize));
        let status = ctx.run_ordered(
            num_ranges,
            |id| {
                ctx.termination().check()?;
                let range = self.range(id);
                task(range, self.read(range))
            },
            |id, result| {
                let range = self.range(id);
                consume(range, result)?;
                pl.update_with_count(range.len() as usize);
                Ok(())
            },
        )?;
        match status {
            RunStatus::Completed => Ok(()),
            RunStatus::Cancelled => Err(Interrupted.into()),
        }
    }
}

/// Decodes the records in use in a [`ScanRange`], in id order.
pub struct RangeReader<'a, S: RecordStore + 'a> {
    cursor: S::Cursor<'a>,
    next_id: u64,
    end: u64,
}

impl<'a, S: RecordStore + 'a> Iterator for RangeReader<'a, S> {
    type Item = Result<(u64, S::Record), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_id < self.end {
            self.next_id += 1;
            match self.cursor.next()? {
                Ok(Slot::InUse(id, record)) => return Some(Ok((id, record))),
                Ok(Slot::Unused(_)) => continue,
                Err(err) => {
                    // Stop at the first error
                    self.next_id = self.end;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}
