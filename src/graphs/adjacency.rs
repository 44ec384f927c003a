/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Compressed adjacency runs.
//!
//! The targets of the relationships of a node are sorted, turned into
//! deltas (the first target, then the gap from each target to the previous
//! one), and each delta is written as an unsigned LEB128 variable-length
//! integer. Duplicated targets are preserved as zero deltas.
//!
//! Runs of consecutive nodes are first encoded into private
//! [`EncodedRuns`] buffers, possibly on different threads, and then
//! concatenated in node order by a [`CompressedAdjacencyBuilder`] into a
//! frozen [`CompressedAdjacency`], which stores the bytes of all runs, the
//! byte offset of each run, the degree of each node and, optionally, one
//! weight per relationship in decoded order.

use crate::utils::{HugeArray, MemoryLimitExceeded, MemoryTracker, PageChunks};
use std::io::{self, Read};

/// Encodes a sorted sequence of targets as LEB128 deltas, appending to `out`.
///
/// Returns the number of bytes written.
pub fn encode_run(sorted_targets: &[u64], out: &mut Vec<u8>) -> io::Result<usize> {
    debug_assert!(sorted_targets.windows(2).all(|w| w[0] <= w[1]));
    let mut written = 0;
    let mut last = 0;
    for &target in sorted_targets {
        written += leb128::write::unsigned(out, target - last)?;
        last = target;
    }
    Ok(written)
}

/// An iterator decoding a run encoded by [`encode_run`].
///
/// The iterator stops at the end of the input or at the first malformed
/// delta.
#[derive(Debug, Clone)]
pub struct RunDecoder<R> {
    reader: R,
    prev: u64,
}

impl<R: Read> RunDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, prev: 0 }
    }
}

impl<R: Read> Iterator for RunDecoder<R> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let delta = leb128::read::unsigned(&mut self.reader).ok()?;
        self.prev += delta;
        Some(self.prev)
    }
}

/// Decodes a run stored in a contiguous slice.
pub fn decode_run(bytes: &[u8]) -> RunDecoder<&[u8]> {
    RunDecoder::new(bytes)
}

/// A [`Read`] implementation over the page chunks of a range of a
/// [`HugeArray`] of bytes.
#[derive(Debug, Clone)]
pub struct ChunkReader<'a> {
    current: &'a [u8],
    rest: PageChunks<'a, u8>,
}

impl Read for ChunkReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.current.is_empty() {
            match self.rest.next() {
                Some(chunk) => self.current = chunk,
                None => return Ok(0),
            }
        }
        self.current.read(buf)
    }
}

/// The runs of a contiguous range of nodes, encoded into private buffers.
///
/// Offsets are relative to the start of the buffer, and there is one more
/// offset than nodes.
#[derive(Debug, Clone)]
pub struct EncodedRuns {
    bytes: Vec<u8>,
    offsets: Vec<u64>,
    degrees: Vec<u32>,
    weights: Option<Vec<f64>>,
    perm: Vec<u32>,
}

impl EncodedRuns {
    /// Creates empty runs; if `weighted` is true, each relationship carries a
    /// weight.
    pub fn new(weighted: bool) -> Self {
        Self {
            bytes: vec![],
            offsets: vec![0],
            degrees: vec![],
            weights: weighted.then(Vec::new),
            perm: vec![],
        }
    }

    /// Returns the number of encoded runs.
    pub fn node_count(&self) -> usize {
        self.degrees.len()
    }

    /// Returns the number of bytes of the encoded runs.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the number of bytes allocated by the buffers.
    pub fn heap_size(&self) -> usize {
        self.bytes.capacity()
            + self.offsets.capacity() * 8
            + self.degrees.capacity() * 4
            + self.weights.as_ref().map_or(0, |w| w.capacity() * 8)
    }

    /// Sorts `targets` and appends their run.
    ///
    /// In the weighted case, `weights` must be parallel to `targets`: the
    /// weights are stored in the order of the sorted targets, using the
    /// permutation computed by a stable sort.
    ///
    /// # Panics
    ///
    /// Panics if weights are passed to unweighted runs or vice versa, or if
    /// the lengths of `targets` and `weights` differ.
    pub fn push_run(&mut self, targets: &mut [u64], weights: Option<&[f64]>) -> io::Result<()> {
        assert!(
            targets.len() <= u32::MAX as usize,
            "Degree {} is too large",
            targets.len()
        );
        match (&mut self.weights, weights) {
            (None, None) => {
                targets.sort_unstable();
                encode_run(targets, &mut self.bytes)?;
            }
            (Some(stored), Some(weights)) => {
                assert_eq!(targets.len(), weights.len());
                self.perm.clear();
                self.perm.extend(0..targets.len() as u32);
                self.perm.sort_by_key(|&i| targets[i as usize]);
                stored.extend(self.perm.iter().map(|&i| weights[i as usize]));
                targets.sort_unstable();
                encode_run(targets, &mut self.bytes)?;
            }
            (None, Some(_)) => panic!("Weights passed to unweighted runs"),
            (Some(_), None) => panic!("Weights missing from weighted runs"),
        }
        self.degrees.push(targets.len() as u32);
        self.offsets.push(self.bytes.len() as u64);
        Ok(())
    }
}

/// Weights of relationships in node order, with the index of the first
/// weight of each node (plus a final sentinel).
#[derive(Debug)]
struct EdgeWeights {
    starts: HugeArray<u64>,
    values: HugeArray<f64>,
}

/// Concatenates [`EncodedRuns`] in node order into a [`CompressedAdjacency`].
///
/// This is the single point where runs encoded concurrently are merged, and
/// it is not meant to be shared among threads.
#[derive(Debug)]
pub struct CompressedAdjacencyBuilder {
    bytes: HugeArray<u8>,
    offsets: HugeArray<u64>,
    degrees: HugeArray<u32>,
    weights: Option<EdgeWeights>,
    relationship_count: u64,
}

impl CompressedAdjacencyBuilder {
    pub fn new(weighted: bool, tracker: &MemoryTracker) -> Result<Self, MemoryLimitExceeded> {
        let mut offsets = HugeArray::new(0, tracker)?;
        offsets.push(0)?;
        let weights = if weighted {
            let mut starts = HugeArray::new(0, tracker)?;
            starts.push(0)?;
            Some(EdgeWeights {
                starts,
                values: HugeArray::new(0, tracker)?,
            })
        } else {
            None
        };
        Ok(Self {
            bytes: HugeArray::new(0, tracker)?,
            offsets,
            degrees: HugeArray::new(0, tracker)?,
            weights,
            relationship_count: 0,
        })
    }

    /// Returns the number of nodes appended so far.
    pub fn node_count(&self) -> usize {
        self.degrees.len()
    }

    /// Appends the runs of the next nodes, rebasing their offsets.
    ///
    /// # Panics
    ///
    /// Panics if the runs are weighted and the builder is not, or vice versa.
    pub fn append(&mut self, runs: &EncodedRuns) -> Result<(), MemoryLimitExceeded> {
        let base = self.bytes.len() as u64;
        self.bytes.extend_from_slice(&runs.bytes)?;
        for &offset in &runs.offsets[1..] {
            self.offsets.push(base + offset)?;
        }
        self.degrees.extend_from_slice(&runs.degrees)?;
        match (&mut self.weights, &runs.weights) {
            (Some(weights), Some(run_weights)) => {
                let mut start = self.relationship_count;
                for &degree in &runs.degrees {
                    start += degree as u64;
                    weights.starts.push(start)?;
                }
                weights.values.extend_from_slice(run_weights)?;
            }
            (None, None) => {}
            _ => panic!("Mixing weighted and unweighted runs"),
        }
        self.relationship_count += runs.degrees.iter().map(|&d| d as u64).sum::<u64>();
        Ok(())
    }

    /// Freezes the adjacency.
    pub fn build(self) -> CompressedAdjacency {
        CompressedAdjacency {
            bytes: self.bytes,
            offsets: self.offsets,
            degrees: self.degrees,
            weights: self.weights,
            relationship_count: self.relationship_count,
        }
    }
}

/// The frozen, compressed adjacency of a direction of a graph.
#[derive(Debug)]
pub struct CompressedAdjacency {
    bytes: HugeArray<u8>,
    offsets: HugeArray<u64>,
    degrees: HugeArray<u32>,
    weights: Option<EdgeWeights>,
    relationship_count: u64,
}

impl CompressedAdjacency {
    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.degrees.len()
    }

    /// Returns the total number of relationships.
    pub fn relationship_count(&self) -> u64 {
        self.relationship_count
    }

    /// Returns the degree of a node.
    #[inline(always)]
    pub fn degree(&self, node: usize) -> u32 {
        self.degrees.get(node)
    }

    /// Returns the byte offset of the run of a node. The offset of
    /// `node_count()` is the length of the buffer.
    #[inline(always)]
    pub fn offset(&self, node: usize) -> u64 {
        self.offsets.get(node)
    }

    /// Returns whether relationships carry weights.
    pub fn is_weighted(&self) -> bool {
        self.weights.is_some()
    }

    /// Returns the targets of a node, in ascending order.
    pub fn targets(&self, node: usize) -> impl Iterator<Item = u64> + '_ {
        let start = self.offsets.get(node) as usize;
        let end = self.offsets.get(node + 1) as usize;
        let reader = ChunkReader {
            current: &[],
            rest: self.bytes.range_chunks(start, end),
        };
        RunDecoder::new(reader).take(self.degree(node) as usize)
    }

    /// Returns the weights of the relationships of a node, in the order of
    /// [`targets`](CompressedAdjacency::targets), if weights were loaded.
    pub fn weights(&self, node: usize) -> Option<impl Iterator<Item = f64> + '_> {
        self.weights.as_ref().map(|weights| {
            let start = weights.starts.get(node) as usize;
            let end = weights.starts.get(node + 1) as usize;
            weights.values.range_chunks(start, end).flatten().copied()
        })
    }

    /// Returns the number of bytes registered with the memory tracker.
    pub fn tracked_bytes(&self) -> usize {
        self.bytes.tracked_bytes()
            + self.offsets.tracked_bytes()
            + self.degrees.tracked_bytes()
            + self.weights.as_ref().map_or(0, |w| {
                w.starts.tracked_bytes() + w.values.tracked_bytes()
            })
    }

    /// Returns the number of bytes of compressed runs.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_codec() -> io::Result<()> {
        let mut out = vec![];
        let targets = [0, 1, 1, 5, 200, 100_000, u64::MAX / 2];
        let written = encode_run(&targets, &mut out)?;
        assert_eq!(written, out.len());
        // Small deltas take a single byte
        assert_eq!(&out[..4], &[0, 1, 0, 4]);
        assert_eq!(decode_run(&out).collect::<Vec<_>>(), targets);
        assert_eq!(decode_run(&[]).count(), 0);
        Ok(())
    }

    #[test]
    fn test_runs_are_sorted_with_their_weights() -> anyhow::Result<()> {
        let mut runs = EncodedRuns::new(true);
        runs.push_run(&mut [7, 3, 7, 1], Some(&[0.7, 0.3, 0.8, 0.1]))?;
        runs.push_run(&mut [], Some(&[]))?;
        runs.push_run(&mut [2], Some(&[2.0]))?;
        assert_eq!(runs.node_count(), 3);

        let tracker = MemoryTracker::unbounded();
        let mut builder = CompressedAdjacencyBuilder::new(true, &tracker)?;
        builder.append(&runs)?;
        let adjacency = builder.build();
        assert_eq!(adjacency.relationship_count(), 5);
        assert_eq!(adjacency.targets(0).collect::<Vec<_>>(), [1, 3, 7, 7]);
        assert_eq!(
            adjacency.weights(0).unwrap().collect::<Vec<_>>(),
            [0.1, 0.3, 0.7, 0.8]
        );
        assert_eq!(adjacency.degree(1), 0);
        assert_eq!(adjacency.offset(1), adjacency.offset(2));
        assert_eq!(adjacency.targets(1).count(), 0);
        assert_eq!(adjacency.weights(2).unwrap().collect::<Vec<_>>(), [2.0]);
        Ok(())
    }

    #[test]
    fn test_merge_preserves_runs() -> anyhow::Result<()> {
        let mut rng = SmallRng::seed_from_u64(0);
        let tracker = MemoryTracker::unbounded();
        let mut builder = CompressedAdjacencyBuilder::new(false, &tracker)?;
        let mut expected = vec![];
        for _ in 0..10 {
            let mut runs = EncodedRuns::new(false);
            for _ in 0..rng.random_range(0..50) {
                let degree = rng.random_range(0..20);
                let mut targets = (0..degree)
                    .map(|_| rng.random_range(0..1_000_000))
                    .collect::<Vec<u64>>();
                runs.push_run(&mut targets, None)?;
                expected.push(targets);
            }
            builder.append(&runs)?;
        }
        let adjacency = builder.build();
        assert!(!adjacency.is_weighted());
        assert_eq!(adjacency.node_count(), expected.len());
        assert_eq!(adjacency.offset(expected.len()) as usize, adjacency.byte_len());
        for (node, targets) in expected.iter().enumerate() {
            assert!(adjacency.offset(node) <= adjacency.offset(node + 1));
            assert_eq!(adjacency.degree(node) as usize, targets.len());
            assert_eq!(&adjacency.targets(node).collect::<Vec<_>>(), targets);
        }
        assert_eq!(tracker.used(), adjacency.tracked_bytes());
        drop(adjacency);
        assert_eq!(tracker.used(), 0);
        Ok(())
    }

    #[test]
    fn test_runs_spanning_pages() -> anyhow::Result<()> {
        // Runs of large deltas are longer than a page of the byte array
        let tracker = MemoryTracker::unbounded();
        let mut builder = CompressedAdjacencyBuilder::new(false, &tracker)?;
        let mut runs = EncodedRuns::new(false);
        let mut targets = (0..10_000_u64).map(|i| i << 40).collect::<Vec<_>>();
        let expected = targets.clone();
        runs.push_run(&mut targets, None)?;
        builder.append(&runs)?;
        let adjacency = builder.build();
        assert!(adjacency.byte_len() > 1 << crate::utils::huge_array::DEFAULT_PAGE_SHIFT);
        assert_eq!(adjacency.targets(0).collect::<Vec<_>>(), expected);
        Ok(())
    }

    #[test]
    fn test_merge_over_budget() -> anyhow::Result<()> {
        let tracker = MemoryTracker::with_limit(1 << 20);
        let mut builder = CompressedAdjacencyBuilder::new(false, &tracker)?;
        let mut runs = EncodedRuns::new(false);
        for node in 0..100_000 {
            runs.push_run(&mut [node], None)?;
        }
        assert!(builder.append(&runs).is_err());
        drop(builder);
        assert_eq!(tracker.used(), 0);
        Ok(())
    }
}
