/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::Algorithm;
use crate::parallel::{ExecutionContext, RunStatus};
use crate::store::DecodeError;
use crate::traits::{Direction, Graph};
use crate::utils::{HugeArray, MemoryTracker};
use anyhow::{bail, ensure, Context, Result};
use core::ops::ControlFlow;
use dsi_progress_logger::{no_logging, ConcurrentProgressLog};

/// The weight of a relationship of a graph loaded without a relationship
/// property.
pub const DEFAULT_WEIGHT: f64 = 0.0;

/// Degree centrality.
///
/// The score of a node is the number of its relationships in the chosen
/// [direction](DegreeCentrality::direction), or, if the centrality is
/// [weighted](DegreeCentrality::weighted), the sum of the positive weights of
/// its relationships. Relationships with a non-positive weight do not
/// contribute to a weighted score; on a graph without a relationship property
/// every relationship weighs [`DEFAULT_WEIGHT`], so all weighted scores are
/// zero.
///
/// Nodes are scored in parallel on the partitions of the execution context;
/// each partition writes only its own range of the score array.
///
/// # Examples
///
/// ```
/// use heapgraph::prelude::*;
///
/// # fn main() -> anyhow::Result<()> {
/// let mut builder = MemoryStore::builder();
/// let n = (0..3).map(|_| builder.add_node(&[])).collect::<Vec<_>>();
/// builder.add_relationship(n[0], n[1], "R", &[])?;
/// builder.add_relationship(n[0], n[2], "R", &[])?;
/// let store = builder.build();
/// let (graph, _) = GraphLoader::new(&store).load_huge()?;
///
/// let mut degree = DegreeCentrality::new(
///     graph,
///     ExecutionContext::new(2)?,
///     &MemoryTracker::unbounded(),
/// )?;
/// degree.compute()?;
/// degree.release();
/// let result = degree.result().unwrap();
/// assert_eq!(result.score(0), 2.0);
/// assert_eq!(result.sum(), 2.0);
/// # Ok(())
/// # }
/// ```
pub struct DegreeCentrality<G> {
    graph: Option<G>,
    ctx: ExecutionContext,
    direction: Direction,
    weighted: bool,
    scores: HugeArray<f64>,
    status: Option<RunStatus>,
}

impl<G> core::fmt::Debug for DegreeCentrality<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DegreeCentrality")
            .field("released", &self.graph.is_none())
            .field("direction", &self.direction)
            .field("weighted", &self.weighted)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl<G: Graph> DegreeCentrality<G> {
    /// Creates a new degree centrality on `graph`, registering the score
    /// array with `tracker`.
    ///
    /// By default, outgoing relationships are counted.
    pub fn new(graph: G, ctx: ExecutionContext, tracker: &MemoryTracker) -> Result<Self> {
        let node_count = graph.node_count() as usize;
        let scores = HugeArray::new(node_count, tracker)
            .with_context(|| format!("Cannot allocate the scores of {node_count} nodes"))?;
        Ok(Self {
            graph: Some(graph),
            ctx,
            direction: Direction::default(),
            weighted: false,
            scores,
            status: None,
        })
    }

    /// Sets the direction of the relationships to score.
    pub fn direction(&mut self, direction: Direction) -> &mut Self {
        self.direction = direction;
        self
    }

    /// Sums the weights of the relationships instead of counting them.
    ///
    /// If the graph has no relationship property, every relationship weighs
    /// one.
    pub fn weighted(&mut self, weighted: bool) -> &mut Self {
        self.weighted = weighted;
        self
    }

    /// Like [`compute`](Algorithm::compute), but logging progress on `pl`.
    pub fn compute_with_logging(
        &mut self,
        pl: &mut impl ConcurrentProgressLog,
    ) -> Result<&mut Self> {
        let Some(graph) = &self.graph else {
            bail!("Cannot compute degree centrality after releasing the graph");
        };
        let (direction, weighted) = (self.direction, self.weighted);
        ensure!(
            graph.supports(direction),
            "The graph was loaded without {direction:?} relationships"
        );
        if weighted && !graph.has_relationship_property() {
            log::warn!("Weighted degree requested on a graph without relationship property: all scores will be {DEFAULT_WEIGHT}");
        }

        let ctx = &self.ctx;
        let total = self.scores.len();
        pl.item_name("node");
        pl.expected_updates(Some(total));
        pl.start(format!(
            "Computing {} {direction:?} degree centrality...",
            if weighted { "weighted" } else { "unweighted" }
        ));

        let scores = self.scores.as_sync();
        let status = ctx.run_partitioned(
            total,
            |part| {
                let mut local = Vec::with_capacity(part.len);
                for node in part.range() {
                    if !ctx.running() {
                        break;
                    }
                    let score = score(graph, node as u64, direction, weighted)
                        .with_context(|| format!("Cannot score node {node}"))?;
                    local.push(score);
                }
                // SAFETY: partitions are disjoint
                unsafe {
                    scores.copy_from_slice_into_range(&local, part.start, part.start + local.len())
                };
                Ok(())
            },
            pl,
        )?;
        pl.done();

        if status.is_cancelled() {
            log::info!("Degree centrality was cancelled");
        }
        self.status = Some(status);
        Ok(self)
    }
}

fn score(
    graph: &impl Graph,
    node: u64,
    direction: Direction,
    weighted: bool,
) -> Result<f64, DecodeError> {
    if !weighted {
        return Ok(graph.degree(node, direction)? as f64);
    }
    let mut sum = 0.0;
    graph.for_each_relationship(node, direction, DEFAULT_WEIGHT, &mut |_, _, weight| {
        if weight > 0.0 {
            sum += weight;
        }
        ControlFlow::Continue(())
    })?;
    Ok(sum)
}

impl<G: Graph> Algorithm for DegreeCentrality<G> {
    type Output<'a> = CentralityResult<'a> where Self: 'a;

    fn compute(&mut self) -> Result<&mut Self> {
        self.compute_with_logging(no_logging![])
    }

    fn result(&self) -> Option<CentralityResult<'_>> {
        self.status.map(|status| CentralityResult {
            scores: &self.scores,
            status,
        })
    }

    fn release(&mut self) {
        self.graph = None;
    }
}

/// A view over the scores of a centrality.
///
/// If the computation was [cancelled](RunStatus::Cancelled), only the scores
/// of the partitions that completed are meaningful.
#[derive(Debug, Clone, Copy)]
pub struct CentralityResult<'a> {
    scores: &'a HugeArray<f64>,
    status: RunStatus,
}

impl CentralityResult<'_> {
    /// Returns the score of a node.
    pub fn score(&self, node: u64) -> f64 {
        self.scores.get(node as usize)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.scores.iter().sum()
    }

    /// Returns the maximum score, or `None` if there are no nodes.
    pub fn max(&self) -> Option<f64> {
        self.scores.iter().reduce(f64::max)
    }

    /// Returns an iterator over the scores in dense identifier order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.scores.iter()
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::adjacency::{CompressedAdjacencyBuilder, EncodedRuns};
    use crate::graphs::{HugeGraph, IdMapBuilder};
    use std::sync::Arc;

    fn graph(lists: &[&[(u64, f64)]], undirected: bool) -> Result<HugeGraph> {
        let tracker = MemoryTracker::unbounded();
        let mut runs = EncodedRuns::new(true);
        for list in lists {
            let mut targets = list.iter().map(|&(t, _)| t).collect::<Vec<_>>();
            let weights = list.iter().map(|&(_, w)| w).collect::<Vec<_>>();
            runs.push_run(&mut targets, Some(&weights))?;
        }
        let mut builder = CompressedAdjacencyBuilder::new(true, &tracker)?;
        builder.append(&runs)?;
        let mut id_map = IdMapBuilder::new(&tracker)?;
        for external in 0..lists.len() as u64 {
            id_map.add(external)?;
        }
        Ok(HugeGraph::new(
            "R",
            Arc::new(id_map.build()),
            builder.build(),
            None,
            undirected,
        ))
    }

    #[test]
    fn test_unweighted_and_weighted() -> Result<()> {
        let graph = graph(&[&[(1, 0.5), (2, 0.0), (2, -1.0)], &[(0, 2.0)], &[]], false)?;
        let mut degree =
            DegreeCentrality::new(graph, ExecutionContext::new(3)?, &MemoryTracker::unbounded())?;
        assert!(degree.result().is_none());
        let result = degree.compute()?.result().unwrap();
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![3.0, 1.0, 0.0]);
        assert_eq!(result.status(), RunStatus::Completed);

        let result = degree.weighted(true).compute()?.result().unwrap();
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![0.5, 2.0, 0.0]);
        assert_eq!(result.max(), Some(2.0));
        assert_eq!(result.sum(), 2.5);
        Ok(())
    }

    #[test]
    fn test_release_keeps_results() -> Result<()> {
        let graph = graph(&[&[(1, 1.0)], &[(0, 1.0)]], true)?;
        let tracker = MemoryTracker::unbounded();
        let mut degree = DegreeCentrality::new(graph, ExecutionContext::new(1)?, &tracker)?;
        degree.direction(Direction::Incoming).compute()?;
        degree.release();
        assert_eq!(degree.result().unwrap().score(1), 1.0);
        assert!(degree.compute().is_err());
        drop(degree);
        assert_eq!(tracker.used(), 0);
        Ok(())
    }

    #[test]
    fn test_unsupported_direction() -> Result<()> {
        let graph = graph(&[&[]], false)?;
        let mut degree =
            DegreeCentrality::new(graph, ExecutionContext::new(1)?, &MemoryTracker::unbounded())?;
        assert!(degree.direction(Direction::Both).compute().is_err());
        assert!(degree.result().is_none());
        Ok(())
    }

    #[test]
    fn test_terminated_before_start() -> Result<()> {
        let graph = graph(&[&[(1, 1.0)], &[]], false)?;
        let ctx = ExecutionContext::new(2)?;
        ctx.termination().terminate();
        let mut degree = DegreeCentrality::new(graph, ctx, &MemoryTracker::unbounded())?;
        let result = degree.compute()?.result().unwrap();
        assert_eq!(result.status(), RunStatus::Cancelled);
        assert_eq!(result.sum(), 0.0);
        Ok(())
    }

    #[test]
    fn test_memory_limit() -> Result<()> {
        let graph = graph(&[&[], &[], &[]], false)?;
        let tracker = MemoryTracker::with_limit(16);
        let err = DegreeCentrality::new(graph, ExecutionContext::new(1)?, &tracker).unwrap_err();
        assert!(err
            .downcast_ref::<crate::utils::MemoryLimitExceeded>()
            .is_some());
        Ok(())
    }
}
