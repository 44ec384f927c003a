/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Bidirectional mapping between external and dense node identifiers.
//!
//! External identifiers are sparse: the forward direction is stored in a
//! paged array indexed by external identifier whose pages are allocated
//! only when an identifier falling in them is added. The reverse direction
//! is a [`HugeArray`] indexed by dense identifier.

use crate::utils::{HugeArray, MemoryLimitExceeded, MemoryTracker};

/// The sentinel stored in the forward map for absent identifiers.
const NOT_FOUND: u64 = u64::MAX;

const FORWARD_PAGE_SHIFT: u32 = 12;
const FORWARD_PAGE_SIZE: usize = 1 << FORWARD_PAGE_SHIFT;
const FORWARD_PAGE_MASK: usize = FORWARD_PAGE_SIZE - 1;

#[derive(Debug)]
struct SparseIds {
    pages: Vec<Option<Box<[u64]>>>,
    tracker: MemoryTracker,
    tracked_bytes: usize,
}

impl Drop for SparseIds {
    fn drop(&mut self) {
        self.tracker.release(self.tracked_bytes);
    }
}

impl SparseIds {
    fn get(&self, index: u64) -> u64 {
        let page = (index >> FORWARD_PAGE_SHIFT) as usize;
        match self.pages.get(page) {
            Some(Some(content)) => content[index as usize & FORWARD_PAGE_MASK],
            _ => NOT_FOUND,
        }
    }

    fn page_mut(&mut self, index: u64) -> Result<&mut [u64], MemoryLimitExceeded> {
        let page = (index >> FORWARD_PAGE_SHIFT) as usize;
        if page >= self.pages.len() {
            self.pages.resize(page + 1, None);
        }
        let slot = &mut self.pages[page];
        if slot.is_none() {
            let bytes = FORWARD_PAGE_SIZE * core::mem::size_of::<u64>();
            self.tracker.try_allocate(bytes)?;
            self.tracked_bytes += bytes;
        }
        Ok(slot.get_or_insert_with(|| vec![NOT_FOUND; FORWARD_PAGE_SIZE].into_boxed_slice()))
    }
}

/// Builds an [`IdMap`] by a single pass over external identifiers.
#[derive(Debug)]
pub struct IdMapBuilder {
    forward: SparseIds,
    reverse: HugeArray<u64>,
}

impl IdMapBuilder {
    pub fn new(tracker: &MemoryTracker) -> Result<Self, MemoryLimitExceeded> {
        Ok(Self {
            forward: SparseIds {
                pages: vec![],
                tracker: tracker.clone(),
                tracked_bytes: 0,
            },
            reverse: HugeArray::new(0, tracker)?,
        })
    }

    /// Returns the dense identifier of `external`, assigning the next
    /// sequential dense identifier if it was not seen before.
    ///
    /// # Panics
    ///
    /// Panics if `external` is `u64::MAX`.
    pub fn add(&mut self, external: u64) -> Result<u64, MemoryLimitExceeded> {
        assert_ne!(external, NOT_FOUND, "Invalid external identifier");
        let dense = self.reverse.len() as u64;
        let page = self.forward.page_mut(external)?;
        let slot = &mut page[external as usize & FORWARD_PAGE_MASK];
        if *slot != NOT_FOUND {
            return Ok(*slot);
        }
        self.reverse.push(external)?;
        *slot = dense;
        Ok(dense)
    }

    /// Returns the number of identifiers added so far.
    pub fn len(&self) -> u64 {
        self.reverse.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    /// Freezes the map.
    pub fn build(self) -> IdMap {
        IdMap {
            forward: self.forward,
            reverse: self.reverse,
        }
    }
}

/// An immutable bijection between a set of external identifiers and
/// `[0 . . node_count)`.
///
/// # Examples
///
/// ```
/// use heapgraph::graphs::IdMapBuilder;
/// use heapgraph::utils::MemoryTracker;
///
/// # fn main() -> anyhow::Result<()> {
/// let mut builder = IdMapBuilder::new(&MemoryTracker::unbounded())?;
/// for external in [1_000_000, 7, 1_000_000, 42] {
///     builder.add(external)?;
/// }
/// let map = builder.build();
/// assert_eq!(map.node_count(), 3);
/// assert_eq!(map.to_dense(7), Some(1));
/// assert_eq!(map.to_external(2), 42);
/// assert_eq!(map.to_dense(8), None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct IdMap {
    forward: SparseIds,
    reverse: HugeArray<u64>,
}

impl IdMap {
    /// Returns the number of mapped identifiers.
    #[inline(always)]
    pub fn node_count(&self) -> u64 {
        self.reverse.len() as u64
    }

    /// Returns the dense identifier of an external identifier.
    #[inline(always)]
    pub fn to_dense(&self, external: u64) -> Option<u64> {
        match self.forward.get(external) {
            NOT_FOUND => None,
            dense => Some(dense),
        }
    }

    /// Returns the external identifier of a dense identifier.
    ///
    /// # Panics
    ///
    /// Panics if `dense` is not smaller than the number of nodes.
    #[inline(always)]
    pub fn to_external(&self, dense: u64) -> u64 {
        self.reverse.get(dense as usize)
    }

    /// Returns whether the external identifier is mapped.
    pub fn contains(&self, external: u64) -> bool {
        self.to_dense(external).is_some()
    }

    /// Returns the external identifiers in dense order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.reverse.iter()
    }

    /// Returns the number of bytes registered with the memory tracker.
    pub fn tracked_bytes(&self) -> usize {
        self.forward.tracked_bytes + self.reverse.tracked_bytes()
    }
}
