/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Paged arrays indexed by 64-bit logical indices.
//!
//! A [`HugeArray`] never performs a single allocation larger than a page:
//! storage is split into pages of `2^page_shift` elements, and an index `i`
//! is routed to page `i >> page_shift` at offset `i & page_mask`. The size of
//! an array is thus bounded only by the available memory, and not by the
//! maximum size of a contiguous allocation.
//!
//! Every array registers its size with a [`MemoryTracker`] before allocating,
//! and unregisters it when dropped, so that an embedding host can enforce a
//! [budget](crate::utils::MemoryBudget).
//!
//! Arrays have no internal synchronization. To write from multiple threads,
//! obtain a [`SyncHugeArray`] with [`HugeArray::as_sync`]: its writing methods
//! are unsafe, and it is the responsibility of the caller to guarantee that
//! concurrent writers access disjoint index ranges.

use super::{MemoryLimitExceeded, MemoryTracker};
use sync_cell_slice::{SyncCell, SyncSlice};

/// The default base-2 logarithm of the page size, in elements.
pub const DEFAULT_PAGE_SHIFT: u32 = 14;

/// A fixed-size array split into pages of `2^page_shift` elements.
///
/// # Examples
///
/// ```
/// use heapgraph::utils::{HugeArray, MemoryTracker};
///
/// let tracker = MemoryTracker::unbounded();
/// let mut array = HugeArray::<u64>::with_page_shift(10, 2, &tracker)?;
/// array.set(7, 42);
/// array.copy_from_slice_into_range(&[1, 2, 3], 2, 5);
/// assert_eq!(array.get(7), 42);
/// assert_eq!(array.iter().collect::<Vec<_>>(), [0, 0, 1, 2, 3, 0, 0, 42, 0, 0]);
/// assert_eq!(tracker.used(), 80);
/// drop(array);
/// assert_eq!(tracker.used(), 0);
/// # Ok::<(), heapgraph::utils::MemoryLimitExceeded>(())
/// ```
pub struct HugeArray<T> {
    pages: Vec<Box<[T]>>,
    len: usize,
    page_shift: u32,
    page_mask: usize,
    tracker: MemoryTracker,
    tracked_bytes: usize,
}

impl<T> core::fmt::Debug for HugeArray<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HugeArray")
            .field("len", &self.len)
            .field("pages", &self.pages.len())
            .field("page_shift", &self.page_shift)
            .field("tracked_bytes", &self.tracked_bytes)
            .finish_non_exhaustive()
    }
}

impl<T> Drop for HugeArray<T> {
    fn drop(&mut self) {
        self.tracker.release(self.tracked_bytes);
    }
}

impl<T: Copy + Default> HugeArray<T> {
    /// Creates an array of `len` default elements with the default page size.
    pub fn new(len: usize, tracker: &MemoryTracker) -> Result<Self, MemoryLimitExceeded> {
        Self::with_page_shift(len, DEFAULT_PAGE_SHIFT, tracker)
    }

    /// Creates an array of `len` default elements with pages of
    /// `2^page_shift` elements.
    ///
    /// The memory is registered with the tracker before any allocation
    /// happens, so a failure leaves no trace.
    ///
    /// # Panics
    ///
    /// Panics if `page_shift` is not smaller than the number of bits of a
    /// `usize`.
    pub fn with_page_shift(
        len: usize,
        page_shift: u32,
        tracker: &MemoryTracker,
    ) -> Result<Self, MemoryLimitExceeded> {
        assert!(
            page_shift < usize::BITS,
            "Page shift {page_shift} is too large"
        );
        let page_size = 1_usize << page_shift;
        let tracked_bytes = Self::memory_estimation(len);
        tracker.try_allocate(tracked_bytes)?;

        let num_pages = len.div_ceil(page_size);
        let mut pages = Vec::with_capacity(num_pages);
        for page in 0..num_pages {
            let page_len = if page + 1 == num_pages {
                len - page * page_size
            } else {
                page_size
            };
            pages.push(vec![T::default(); page_len].into_boxed_slice());
        }

        Ok(Self {
            pages,
            len,
            page_shift,
            page_mask: page_size - 1,
            tracker: tracker.clone(),
            tracked_bytes,
        })
    }

    /// Returns the number of bytes an array of `len` elements will register.
    pub fn memory_estimation(len: usize) -> usize {
        len.saturating_mul(core::mem::size_of::<T>())
    }

    /// Returns the element at the given index.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    #[inline(always)]
    pub fn get(&self, index: usize) -> T {
        assert!(index < self.len, "Index {index} out of bounds for length {}", self.len);
        self.pages[index >> self.page_shift][index & self.page_mask]
    }

    /// Sets the element at the given index.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    #[inline(always)]
    pub fn set(&mut self, index: usize, value: T) {
        assert!(index < self.len, "Index {index} out of bounds for length {}", self.len);
        self.pages[index >> self.page_shift][index & self.page_mask] = value;
    }

    /// Copies `src` into the range `[start . . end)`, which may span several
    /// pages.
    ///
    /// # Panics
    ///
    /// Panics if `end - start` differs from the length of `src` or if the
    /// range is out of bounds.
    pub fn copy_from_slice_into_range(&mut self, src: &[T], start: usize, end: usize) {
        self.check_range(src.len(), start, end);
        let mut src = src;
        let mut index = start;
        while !src.is_empty() {
            let page = &mut self.pages[index >> self.page_shift];
            let offset = index & self.page_mask;
            let chunk = src.len().min(page.len() - offset);
            page[offset..offset + chunk].copy_from_slice(&src[..chunk]);
            src = &src[chunk..];
            index += chunk;
        }
    }

    /// Sets all elements to `value`.
    pub fn fill(&mut self, value: T) {
        for page in &mut self.pages {
            page.fill(value);
        }
    }

    /// Returns an iterator over the elements, by value.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.pages
            .iter()
            .flat_map(|page| page.iter().copied())
            .take(self.len)
    }

    /// Returns a page-aligned cursor over the array: each item is the index
    /// of the first element of a page and the page content.
    pub fn cursor(&self) -> impl Iterator<Item = (usize, &[T])> + '_ {
        let page_size = self.page_size();
        let len = self.len;
        self.pages.iter().enumerate().map(move |(page, content)| {
            let base = page * page_size;
            (base, &content[..content.len().min(len - base)])
        })
    }

    /// Returns a page-aligned mutable cursor for bulk sequential writes: each
    /// item is the index of the first element of a page and the page content.
    pub fn cursor_mut(&mut self) -> impl Iterator<Item = (usize, &mut [T])> + '_ {
        let page_size = self.page_size();
        let len = self.len;
        self.pages.iter_mut().enumerate().map(move |(page, content)| {
            let base = page * page_size;
            let page_len = content.len().min(len - base);
            (base, &mut content[..page_len])
        })
    }

    /// Returns the range `[start . . end)` as a sequence of slices, one for
    /// each page the range intersects.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn range_chunks(&self, start: usize, end: usize) -> PageChunks<'_, T> {
        assert!(
            start <= end && end <= self.len,
            "Range [{start} . . {end}) out of bounds for length {}",
            self.len
        );
        PageChunks {
            array: self,
            pos: start,
            end,
        }
    }

    /// Appends the content of `src`, allocating pages as needed.
    ///
    /// A trimmed last page is reallocated at full size, and new pages are
    /// always full. The additional memory is registered before allocating.
    pub fn extend_from_slice(&mut self, src: &[T]) -> Result<(), MemoryLimitExceeded> {
        let start = self.len;
        self.grow_to(start + src.len())?;
        self.copy_from_slice_into_range(src, start, self.len);
        Ok(())
    }

    /// Appends an element.
    pub fn push(&mut self, value: T) -> Result<(), MemoryLimitExceeded> {
        self.extend_from_slice(&[value])
    }

    fn grow_to(&mut self, new_len: usize) -> Result<(), MemoryLimitExceeded> {
        let page_size = self.page_size();
        let capacity = match self.pages.last() {
            Some(last) => (self.pages.len() - 1) * page_size + last.len(),
            None => 0,
        };
        if new_len > capacity {
            let needed_pages = new_len.div_ceil(page_size);
            let bytes = Self::memory_estimation(needed_pages * page_size - capacity);
            self.tracker.try_allocate(bytes)?;
            self.tracked_bytes += bytes;
            if let Some(last) = self.pages.last_mut() {
                if last.len() < page_size {
                    let mut full = vec![T::default(); page_size];
                    full[..last.len()].copy_from_slice(&last[..]);
                    *last = full.into_boxed_slice();
                }
            }
            while self.pages.len() < needed_pages {
                self.pages
                    .push(vec![T::default(); page_size].into_boxed_slice());
            }
        }
        self.len = self.len.max(new_len);
        Ok(())
    }

    /// Returns a view of the array that can be shared among threads writing
    /// disjoint index ranges.
    pub fn as_sync(&mut self) -> SyncHugeArray<'_, T>
    where
        T: Send,
    {
        SyncHugeArray {
            pages: self
                .pages
                .iter_mut()
                .map(|page| page.as_sync_slice())
                .collect(),
            len: self.len,
            page_shift: self.page_shift,
            page_mask: self.page_mask,
        }
    }

    fn check_range(&self, src_len: usize, start: usize, end: usize) {
        assert!(
            start <= end && end <= self.len,
            "Range [{start} . . {end}) out of bounds for length {}",
            self.len
        );
        assert_eq!(
            end - start,
            src_len,
            "Range [{start} . . {end}) does not match the source length {src_len}"
        );
    }
}

impl<T> HugeArray<T> {
    /// Returns the number of elements.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the array has no elements.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of elements in a page.
    #[inline(always)]
    pub fn page_size(&self) -> usize {
        1 << self.page_shift
    }

    /// Returns the number of pages.
    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// Returns the number of bytes registered with the tracker.
    pub fn tracked_bytes(&self) -> usize {
        self.tracked_bytes
    }
}

/// The slices of a range of a [`HugeArray`], page by page.
///
/// Returned by [`HugeArray::range_chunks`].
#[derive(Debug, Clone)]
pub struct PageChunks<'a, T> {
    array: &'a HugeArray<T>,
    pos: usize,
    end: usize,
}

impl<'a, T> Iterator for PageChunks<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<&'a [T]> {
        if self.pos >= self.end {
            return None;
        }
        let page = &self.array.pages[self.pos >> self.array.page_shift];
        let offset = self.pos & self.array.page_mask;
        let chunk = (self.end - self.pos).min(page.len() - offset);
        self.pos += chunk;
        Some(&page[offset..offset + chunk])
    }
}

/// A view of a [`HugeArray`] whose elements can be written by multiple
/// threads through interior mutability.
///
/// All accessors are unsafe: the caller must guarantee that no element is
/// written by a thread while another thread reads or writes it. The usual way
/// to guarantee this is to assign disjoint index ranges to threads, as
/// [`ExecutionContext::run_partitioned`](crate::parallel::ExecutionContext::run_partitioned)
/// does.
pub struct SyncHugeArray<'a, T> {
    pages: Vec<&'a [SyncCell<T>]>,
    len: usize,
    page_shift: u32,
    page_mask: usize,
}

impl<T: Copy> SyncHugeArray<'_, T> {
    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the element at the given index.
    ///
    /// # Safety
    ///
    /// No other thread may be writing the element.
    #[inline(always)]
    pub unsafe fn get(&self, index: usize) -> T {
        self.pages[index >> self.page_shift][index & self.page_mask].get()
    }

    /// Sets the element at the given index.
    ///
    /// # Safety
    ///
    /// No other thread may be reading or writing the element.
    #[inline(always)]
    pub unsafe fn set(&self, index: usize, value: T) {
        self.pages[index >> self.page_shift][index & self.page_mask].set(value)
    }

    /// Copies `src` into the range `[start . . end)`.
    ///
    /// # Safety
    ///
    /// No other thread may be reading or writing elements in the range.
    ///
    /// # Panics
    ///
    /// Panics if `end - start` differs from the length of `src` or if the
    /// range is out of bounds.
    pub unsafe fn copy_from_slice_into_range(&self, src: &[T], start: usize, end: usize) {
        assert!(
            start <= end && end <= self.len,
            "Range [{start} . . {end}) out of bounds for length {}",
            self.len
        );
        assert_eq!(end - start, src.len());
        let mut index = start;
        let mut src = src;
        while !src.is_empty() {
            let page = self.pages[index >> self.page_shift];
            let offset = index & self.page_mask;
            let chunk = src.len().min(page.len() - offset);
            for (cell, &value) in page[offset..offset + chunk].iter().zip(&src[..chunk]) {
                cell.set(value);
            }
            src = &src[chunk..];
            index += chunk;
        }
    }
}
