/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::utils::ceil_div;
use core::ops::Range;

/// Batch sizes are rounded up to a multiple of this value, so that
/// partitions of result arrays start at cache-line-friendly indices.
pub const ALIGNMENT: usize = 64;

/// The minimum number of elements assigned to a task.
pub const MIN_BATCH_SIZE: usize = 64;

/// A contiguous, half-open range of indices assigned to a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    /// The index of the partition among its siblings.
    pub id: usize,
    /// The first index of the range.
    pub start: usize,
    /// The number of indices in the range.
    pub len: usize,
}

impl Partition {
    /// Returns the index after the last index of the range.
    #[inline(always)]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    /// Returns the range of indices.
    #[inline(always)]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// Returns the batch size for `total` elements processed at the given
/// concurrency: `ceil(total / concurrency)` rounded up to a multiple of
/// [`ALIGNMENT`], and never smaller than [`MIN_BATCH_SIZE`].
///
/// # Panics
///
/// Panics if `concurrency` is zero.
pub fn adjusted_batch_size(total: usize, concurrency: usize) -> usize {
    assert!(concurrency > 0, "The concurrency must be positive");
    let batch_size = ceil_div(total, concurrency).max(MIN_BATCH_SIZE);
    ceil_div(batch_size, ALIGNMENT) * ALIGNMENT
}

/// Returns the number of tasks needed to process `total` elements in
/// batches of `batch_size` elements.
pub fn task_count(total: usize, batch_size: usize) -> usize {
    ceil_div(total, batch_size)
}

/// Splits `[0 . . total)` into consecutive partitions of `batch_size`
/// elements; the last partition might be shorter.
pub fn partitions_of_size(total: usize, batch_size: usize) -> Vec<Partition> {
    assert!(batch_size > 0, "The batch size must be positive");
    (0..task_count(total, batch_size))
        .map(|id| {
            let start = id * batch_size;
            Partition {
                id,
                start,
                len: batch_size.min(total - start),
            }
        })
        .collect()
}

/// Splits `[0 . . total)` into partitions using
/// [the adjusted batch size](adjusted_batch_size).
///
/// # Examples
///
/// ```
/// use heapgraph::parallel::partitions;
///
/// let parts = partitions(1000, 4);
/// assert_eq!(parts.len(), 4);
/// assert_eq!(parts[0].range(), 0..256);
/// assert_eq!(parts[3].range(), 768..1000);
/// ```
pub fn partitions(total: usize, concurrency: usize) -> Vec<Partition> {
    partitions_of_size(total, adjusted_batch_size(total, concurrency))
}
