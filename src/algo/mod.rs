/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Algorithms over [graphs](crate::traits::Graph).
//!
//! Algorithms share a lifecycle described by the [`Algorithm`] trait: they
//! are built on a graph and an [execution
//! context](crate::parallel::ExecutionContext), they [compute](Algorithm::compute)
//! their results on the worker pool of the context, and they can
//! [release](Algorithm::release) the graph while keeping their results.

use anyhow::Result;

mod degree;
pub use degree::*;

/// The lifecycle of a graph algorithm.
pub trait Algorithm {
    /// A read-only view over the results.
    type Output<'a>
    where
        Self: 'a;

    /// Computes the results, returning the algorithm for chaining.
    ///
    /// If termination is requested on the execution context, the
    /// computation stops early without error, and the results are marked
    /// as [cancelled](crate::parallel::RunStatus::Cancelled).
    ///
    /// Fails if the graph has been [released](Algorithm::release).
    fn compute(&mut self) -> Result<&mut Self>;

    /// Returns the results of the last computation, or `None` if the
    /// algorithm has never been computed.
    fn result(&self) -> Option<Self::Output<'_>>;

    /// Drops the graph. Results remain available.
    fn release(&mut self);
}
