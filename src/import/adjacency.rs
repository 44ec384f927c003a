/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Parallel construction of a [`CompressedAdjacency`].
//!
//! Construction happens in two phases. While the store is scanned, each
//! scan task fills its own [`StagingBuffer`], in which relationships are
//! bucketed by the node partition of their source. Then
//! [`AdjacencyBuilder::build`] processes the node partitions in parallel:
//! each partition collects its relationships from all staging buffers,
//! groups them by source with a counting sort, and encodes the runs of its
//! nodes. Encoded partitions are appended to the global buffer in node order
//! by the calling thread, which is the only point of synchronization.

use crate::graphs::adjacency::{CompressedAdjacency, CompressedAdjacencyBuilder, EncodedRuns};
use crate::parallel::{
    adjusted_batch_size, partitions_of_size, ExecutionContext, Interrupted, Partition, RunStatus,
};
use crate::utils::MemoryTracker;
use anyhow::Result;
use dsi_progress_logger::ConcurrentProgressLog;

#[derive(Debug, Clone, Default)]
struct Bucket {
    sources: Vec<u64>,
    targets: Vec<u64>,
    weights: Vec<f64>,
}

/// A private, growable buffer of relationships bucketed by the node
/// partition of their source.
#[derive(Debug, Clone)]
pub struct StagingBuffer {
    buckets: Vec<Bucket>,
    batch_size: u64,
    weighted: bool,
    len: usize,
}

impl StagingBuffer {
    /// Adds a relationship; the weight is discarded if the buffer is not
    /// weighted.
    #[inline]
    pub fn push(&mut self, source: u64, target: u64, weight: f64) {
        let bucket = &mut self.buckets[(source / self.batch_size) as usize];
        bucket.sources.push(source);
        bucket.targets.push(target);
        if self.weighted {
            bucket.weights.push(weight);
        }
        self.len += 1;
    }

    /// Returns the number of relationships in the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of bytes allocated by the buffer.
    pub fn heap_size(&self) -> usize {
        self.buckets
            .iter()
            .map(|b| (b.sources.capacity() + b.targets.capacity() + b.weights.capacity()) * 8)
            .sum()
    }
}

/// Builds the compressed adjacency of one direction of a graph.
#[derive(Debug, Clone)]
pub struct AdjacencyBuilder {
    parts: Vec<Partition>,
    node_count: usize,
    weighted: bool,
}

impl AdjacencyBuilder {
    /// Creates a builder for a graph with `node_count` nodes whose node
    /// partitions are sized for the given concurrency.
    pub fn new(node_count: usize, concurrency: usize, weighted: bool) -> Self {
        let batch_size = adjusted_batch_size(node_count, concurrency);
        Self {
            parts: partitions_of_size(node_count, batch_size),
            node_count,
            weighted,
        }
    }

    pub fn is_weighted(&self) -> bool {
        self.weighted
    }

    /// Returns an empty staging buffer for this builder.
    pub fn staging_buffer(&self) -> StagingBuffer {
        StagingBuffer {
            buckets: vec![Bucket::default(); self.parts.len()],
            batch_size: self.parts.first().map_or(1, |p| p.len) as u64,
            weighted: self.weighted,
            len: 0,
        }
    }

    /// Compresses the relationships of the staging buffers.
    ///
    /// The runs of different nodes are built concurrently; relationships of
    /// the same node keep the order of the buffers, and of insertion within
    /// a buffer, until their run is sorted.
    pub fn build(
        &self,
        buffers: &[StagingBuffer],
        ctx: &ExecutionContext,
        tracker: &MemoryTracker,
        pl: &mut impl ConcurrentProgressLog,
    ) -> Result<CompressedAdjacency> {
        let mut adjacency = CompressedAdjacencyBuilder::new(self.weighted, tracker)?;
        pl.item_name("node");
        pl.expected_updates(Some(self.node_count));
        pl.start(format!(
            "Compressing {} relationships of {} nodes in {} partitions...",
            buffers.iter().map(StagingBuffer::len).sum::<usize>(),
            self.node_count,
            self.parts.len()
        ));
        let status = ctx.run_ordered(
            self.parts.len(),
            |id| {
                ctx.termination().check()?;
                Ok(self.encode_partition(self.parts[id], buffers)?)
            },
            |id, runs| {
                adjacency.append(&runs)?;
                pl.update_with_count(self.parts[id].len);
                Ok(())
            },
        )?;
        if status == RunStatus::Cancelled {
            return Err(Interrupted.into());
        }
        pl.done();

        let adjacency = adjacency.build();
        debug_assert_eq!(adjacency.node_count(), self.node_count);
        log::debug!(
            "Compressed {} relationships into {} bytes",
            adjacency.relationship_count(),
            adjacency.byte_len()
        );
        Ok(adjacency)
    }

    fn encode_partition(
        &self,
        part: Partition,
        buffers: &[StagingBuffer],
    ) -> std::io::Result<EncodedRuns> {
        let buckets = || buffers.iter().map(|buffer| &buffer.buckets[part.id]);
        let mut starts = vec![0_usize; part.len + 1];
        for bucket in buckets() {
            for &source in &bucket.sources {
                starts[source as usize - part.start + 1] += 1;
            }
        }
        for i in 1..starts.len() {
            starts[i] += starts[i - 1];
        }

        let total = starts[part.len];
        let mut targets = vec![0_u64; total];
        let mut weights = vec![0_f64; if self.weighted { total } else { 0 }];
        let mut next = starts.clone();
        for bucket in buckets() {
            for (i, &source) in bucket.sources.iter().enumerate() {
                let slot = &mut next[source as usize - part.start];
                targets[*slot] = bucket.targets[i];
                if self.weighted {
                    weights[*slot] = bucket.weights[i];
                }
                *slot += 1;
            }
        }

        let mut runs = EncodedRuns::new(self.weighted);
        for node in 0..part.len {
            let range = starts[node]..starts[node + 1];
            let node_weights = self.weighted.then(|| &weights[range.clone()]);
            runs.push_run(&mut targets[range], node_weights)?;
        }
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsi_progress_logger::no_logging;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_build_from_many_buffers() -> Result<()> {
        let node_count = 1000;
        let ctx = ExecutionContext::new(4)?;
        let tracker = MemoryTracker::unbounded();
        let builder = AdjacencyBuilder::new(node_count, ctx.concurrency(), true);
        let mut rng = SmallRng::seed_from_u64(0);
        let mut expected = vec![vec![]; node_count];
        let mut buffers = vec![];
        for _ in 0..7 {
            let mut buffer = builder.staging_buffer();
            for _ in 0..2000 {
                let source = rng.random_range(0..node_count as u64);
                let target = rng.random_range(0..node_count as u64);
                // The weight identifies the relationship
                let weight = (source * 1000 + target) as f64;
                buffer.push(source, target, weight);
                expected[source as usize].push(target);
            }
            buffers.push(buffer);
        }

        let adjacency = builder.build(&buffers, &ctx, &tracker, no_logging![])?;
        assert_eq!(adjacency.node_count(), node_count);
        assert_eq!(adjacency.relationship_count(), 14_000);
        for (node, targets) in expected.iter_mut().enumerate() {
            targets.sort_unstable();
            assert_eq!(adjacency.degree(node) as usize, targets.len());
            assert_eq!(&adjacency.targets(node).collect::<Vec<_>>(), targets);
            let weights = adjacency.weights(node).unwrap().collect::<Vec<_>>();
            let from_weights = weights
                .iter()
                .map(|&w| w as u64 - node as u64 * 1000)
                .collect::<Vec<_>>();
            assert_eq!(&from_weights, targets);
            assert!(adjacency.offset(node) <= adjacency.offset(node + 1));
        }
        Ok(())
    }

    #[test]
    fn test_empty_graph() -> Result<()> {
        let ctx = ExecutionContext::new(2)?;
        let builder = AdjacencyBuilder::new(0, 2, false);
        let adjacency = builder.build(
            &[builder.staging_buffer()],
            &ctx,
            &MemoryTracker::unbounded(),
            no_logging![],
        )?;
        assert_eq!(adjacency.node_count(), 0);
        assert_eq!(adjacency.offset(0), 0);
        Ok(())
    }

    #[test]
    fn test_isolated_nodes_and_multi_edges() -> Result<()> {
        let ctx = ExecutionContext::new(3)?;
        let builder = AdjacencyBuilder::new(200, 3, false);
        let mut first = builder.staging_buffer();
        let mut second = builder.staging_buffer();
        first.push(150, 7, 1.0);
        second.push(150, 7, 1.0);
        first.push(150, 3, 1.0);
        second.push(0, 199, 1.0);
        assert_eq!(first.len(), 3);
        let adjacency = builder.build(
            &[first, second],
            &ctx,
            &MemoryTracker::unbounded(),
            no_logging![],
        )?;
        assert_eq!(adjacency.targets(150).collect::<Vec<_>>(), vec![3, 7, 7]);
        assert_eq!(adjacency.targets(0).collect::<Vec<_>>(), vec![199]);
        assert_eq!(adjacency.degree(1), 0);
        assert_eq!(adjacency.offset(1), adjacency.offset(2));
        assert!(adjacency.weights(0).is_none());
        Ok(())
    }

    #[test]
    fn test_memory_limit_fails_the_build() -> Result<()> {
        let ctx = ExecutionContext::new(2)?;
        let tracker = MemoryTracker::with_limit(1 << 12);
        let builder = AdjacencyBuilder::new(100_000, 2, false);
        let mut buffer = builder.staging_buffer();
        for node in 0..100_000 {
            buffer.push(node, (node * 7919) % 100_000, 1.0);
        }
        let err = builder
            .build(&[buffer], &ctx, &tracker, no_logging![])
            .unwrap_err();
        assert!(err.downcast_ref::<crate::utils::MemoryLimitExceeded>().is_some());
        assert_eq!(tracker.used(), 0);
        Ok(())
    }
}
