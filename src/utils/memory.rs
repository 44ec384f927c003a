/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// An allocation would exceed the [memory budget](MemoryBudget) of a
/// [`MemoryTracker`].
///
/// This is a resource-exhaustion signal rather than a bug: the embedding host
/// decided that the requested structure does not fit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Allocating {requested} bytes would exceed the memory budget ({used} of {limit} bytes in use)")]
pub struct MemoryLimitExceeded {
    pub requested: usize,
    pub used: usize,
    pub limit: usize,
}

/// The amount of memory an import or a computation is allowed to use.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemoryBudget {
    /// No limit: the tracker only accounts.
    #[default]
    Unlimited,
    /// A hard limit in bytes.
    Bytes(usize),
}

impl MemoryBudget {
    /// Creates a budget that is a given percentage of the physical memory.
    ///
    /// # Panics
    ///
    /// Panics if `perc` is not in the interval [0 . . 100].
    pub fn from_perc(perc: f64) -> Self {
        assert!(
            (0.0..=100.0).contains(&perc),
            "The percentage must be in [0 . . 100], got {perc}"
        );
        let mut system = sysinfo::System::new();
        system.refresh_memory();
        MemoryBudget::Bytes((system.total_memory() as f64 * perc / 100.0) as usize)
    }

    /// Returns the limit in bytes, if any.
    pub fn limit(&self) -> Option<usize> {
        match *self {
            MemoryBudget::Unlimited => None,
            MemoryBudget::Bytes(bytes) => Some(bytes),
        }
    }
}

impl core::fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MemoryBudget::Unlimited => f.write_str("unlimited"),
            MemoryBudget::Bytes(bytes) => f.write_str(&super::human_bytes(*bytes)),
        }
    }
}

#[derive(Debug)]
struct TrackerState {
    used: AtomicUsize,
    peak: AtomicUsize,
    limit: Option<usize>,
}

/// Accounts the bytes used by [huge arrays](super::HugeArray) and import
/// buffers, enforcing an optional [budget](MemoryBudget).
///
/// The tracker is a cheaply clonable handle: all clones share the same
/// counters, so an embedding host can keep one clone and inspect the usage
/// of an import running on other threads. Accounting is lock-free.
#[derive(Debug, Clone)]
pub struct MemoryTracker(Arc<TrackerState>);

impl Default for MemoryTracker {
    fn default() -> Self {
        Self::new(MemoryBudget::Unlimited)
    }
}

impl MemoryTracker {
    /// Creates a tracker enforcing the given budget.
    pub fn new(budget: MemoryBudget) -> Self {
        Self(Arc::new(TrackerState {
            used: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            limit: budget.limit(),
        }))
    }

    /// Creates a tracker that only accounts.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Creates a tracker with a hard limit in bytes.
    pub fn with_limit(bytes: usize) -> Self {
        Self::new(MemoryBudget::Bytes(bytes))
    }

    /// Registers an allocation of `bytes` bytes, failing if it would exceed
    /// the budget. On failure nothing is registered.
    pub fn try_allocate(&self, bytes: usize) -> Result<(), MemoryLimitExceeded> {
        let state = &self.0;
        let mut used = state.used.load(Ordering::Relaxed);
        loop {
            let new_used = used.saturating_add(bytes);
            if let Some(limit) = state.limit {
                if new_used > limit {
                    return Err(MemoryLimitExceeded {
                        requested: bytes,
                        used,
                        limit,
                    });
                }
            }
            match state.used.compare_exchange_weak(
                used,
                new_used,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    state.peak.fetch_max(new_used, Ordering::Relaxed);
                    return Ok(());
                }
                Err(current) => used = current,
            }
        }
    }

    /// Registers an allocation of `bytes` bytes that is unregistered when
    /// the returned [`Reservation`] is dropped.
    ///
    /// This is the way to account for buffers that are not
    /// [huge arrays](super::HugeArray), such as import staging buffers.
    pub fn reserve(&self, bytes: usize) -> Result<Reservation, MemoryLimitExceeded> {
        self.try_allocate(bytes)?;
        Ok(Reservation {
            tracker: self.clone(),
            bytes,
        })
    }

    /// Unregisters an allocation of `bytes` bytes.
    pub fn release(&self, bytes: usize) {
        let previous = self.0.used.fetch_sub(bytes, Ordering::Relaxed);
        debug_assert!(
            previous >= bytes,
            "Released {bytes} bytes but only {previous} were tracked"
        );
    }

    /// Returns the number of bytes currently registered.
    pub fn used(&self) -> usize {
        self.0.used.load(Ordering::Relaxed)
    }

    /// Returns the maximum number of bytes ever registered at the same time.
    pub fn peak(&self) -> usize {
        self.0.peak.load(Ordering::Relaxed)
    }

    /// Returns the limit in bytes, if any.
    pub fn limit(&self) -> Option<usize> {
        self.0.limit
    }
}

/// Bytes registered with a [`MemoryTracker`] until dropped.
#[derive(Debug)]
pub struct Reservation {
    tracker: MemoryTracker,
    bytes: usize,
}

impl Reservation {
    /// Returns the number of reserved bytes.
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.tracker.release(self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_accounts() {
        let tracker = MemoryTracker::unbounded();
        tracker.try_allocate(100).unwrap();
        tracker.try_allocate(50).unwrap();
        assert_eq!(tracker.used(), 150);
        tracker.release(100);
        assert_eq!(tracker.used(), 50);
        assert_eq!(tracker.peak(), 150);
        assert_eq!(tracker.limit(), None);
    }

    #[test]
    fn test_limit_is_enforced() {
        let tracker = MemoryTracker::with_limit(1000);
        tracker.try_allocate(600).unwrap();
        let err = tracker.try_allocate(500).unwrap_err();
        assert_eq!(
            err,
            MemoryLimitExceeded {
                requested: 500,
                used: 600,
                limit: 1000
            }
        );
        // A failed allocation registers nothing
        assert_eq!(tracker.used(), 600);
        tracker.try_allocate(400).unwrap();
        assert_eq!(tracker.used(), 1000);
    }

    #[test]
    fn test_clones_share_counters() {
        let tracker = MemoryTracker::with_limit(10);
        let clone = tracker.clone();
        clone.try_allocate(10).unwrap();
        assert!(tracker.try_allocate(1).is_err());
        clone.release(10);
        tracker.try_allocate(1).unwrap();
    }

    #[test]
    fn test_reservation() {
        let tracker = MemoryTracker::with_limit(100);
        let reservation = tracker.reserve(60).unwrap();
        assert_eq!(reservation.bytes(), 60);
        assert!(tracker.reserve(60).is_err());
        drop(reservation);
        assert_eq!(tracker.used(), 0);
        assert_eq!(tracker.peak(), 60);
    }

    #[test]
    fn test_budget_from_perc() {
        let budget = MemoryBudget::from_perc(50.0);
        assert!(budget.limit().is_some());
        assert_eq!(MemoryBudget::from_perc(0.0), MemoryBudget::Bytes(0));
    }
}
