/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use heapgraph::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Arc;

/// A graph terminating a flag when the degree of a given node is computed.
struct TerminateAt<G> {
    graph: G,
    node: u64,
    termination: TerminationFlag,
}

impl<G: Graph> Graph for TerminateAt<G> {
    fn node_count(&self) -> u64 {
        self.graph.node_count()
    }

    fn relationship_count(&self) -> u64 {
        self.graph.relationship_count()
    }

    fn supports(&self, direction: Direction) -> bool {
        self.graph.supports(direction)
    }

    fn is_undirected(&self) -> bool {
        self.graph.is_undirected()
    }

    fn has_relationship_property(&self) -> bool {
        self.graph.has_relationship_property()
    }

    fn degree(&self, node: u64, direction: Direction) -> Result<u32, DecodeError> {
        if node == self.node {
            self.termination.terminate();
        }
        self.graph.degree(node, direction)
    }

    fn for_each_relationship(
        &self,
        node: u64,
        direction: Direction,
        fallback: f64,
        visitor: &mut RelationshipVisitor<'_>,
    ) -> Result<(), DecodeError> {
        self.graph
            .for_each_relationship(node, direction, fallback, visitor)
    }

    fn to_external(&self, node: u64) -> u64 {
        self.graph.to_external(node)
    }

    fn to_dense(&self, external: u64) -> Option<u64> {
        self.graph.to_dense(external)
    }
}

fn cycle(n: usize) -> Result<MemoryStore> {
    let mut builder = MemoryStore::builder();
    let nodes = (0..n).map(|_| builder.add_node(&[])).collect::<Vec<_>>();
    for i in 0..n {
        builder.add_relationship(nodes[i], nodes[(i + 1) % n], "NEXT", &[])?;
    }
    Ok(builder.build())
}

#[test]
fn test_zero_weight_relationship() -> Result<()> {
    let mut builder = MemoryStore::builder();
    let n = (0..4).map(|_| builder.add_node(&[])).collect::<Vec<_>>();
    builder.add_relationship(n[0], n[1], "R", &[("w", 0.0)])?;
    builder.add_relationship(n[1], n[2], "R", &[("w", 2.5)])?;
    builder.add_relationship(n[1], n[3], "R", &[])?;
    builder.add_relationship(n[2], n[3], "R", &[("w", -1.0)])?;
    let store = builder.build();
    let (graph, _) = GraphLoader::new(&store)
        .relationship_property("w", 4.0)
        .load_huge()?;

    let tracker = MemoryTracker::unbounded();
    let mut degree = DegreeCentrality::new(&graph, ExecutionContext::new(2)?, &tracker)?;
    let unweighted = degree.compute()?.result().unwrap().iter().collect::<Vec<_>>();
    assert_eq!(unweighted, vec![1.0, 2.0, 1.0, 0.0]);

    let result = degree.weighted(true).compute()?.result().unwrap();
    assert_eq!(result.iter().collect::<Vec<_>>(), vec![0.0, 6.5, 0.0, 0.0]);
    assert_eq!(result.max(), Some(6.5));
    assert_eq!(result.status(), RunStatus::Completed);
    Ok(())
}

#[test]
fn test_weighted_without_property() -> Result<()> {
    let mut builder = MemoryStore::builder();
    let a = builder.add_node(&[]);
    let b = builder.add_node(&[]);
    builder.add_relationship(a, b, "R", &[])?;
    let store = builder.build();
    let (graph, _) = GraphLoader::new(&store).load_huge()?;
    assert!(!graph.has_relationship_property());

    let mut degree = DegreeCentrality::new(
        &graph,
        ExecutionContext::new(1)?,
        &MemoryTracker::unbounded(),
    )?;
    let result = degree.weighted(true).compute()?.result().unwrap();
    assert_eq!(result.iter().collect::<Vec<_>>(), vec![DEFAULT_WEIGHT; 2]);
    assert_eq!(result.sum(), 0.0);

    // The same holds for a view over the store
    let (view, _) = GraphLoader::new(&store).load_store_view()?;
    let mut degree = DegreeCentrality::new(
        &view,
        ExecutionContext::new(1)?,
        &MemoryTracker::unbounded(),
    )?;
    let result = degree.weighted(true).compute()?.result().unwrap();
    assert_eq!(result.score(0), 0.0);
    assert_eq!(degree.weighted(false).compute()?.result().unwrap().score(0), 1.0);
    Ok(())
}

#[test]
fn test_cancelled_after_first_batch() -> Result<()> {
    let store = cycle(256)?;
    let (graph, _) = GraphLoader::new(&store).load_huge()?;

    // One thread and two partitions of 128 nodes: the second partition is
    // never started
    let ctx = ExecutionContext::with_pool(Arc::new(heapgraph::thread_pool![1]), 2)?;
    assert_eq!(partitions(256, 2).len(), 2);
    let graph = TerminateAt {
        graph,
        node: 127,
        termination: ctx.termination().clone(),
    };
    let mut degree = DegreeCentrality::new(graph, ctx, &MemoryTracker::unbounded())?;
    let result = degree.compute()?.result().unwrap();
    assert_eq!(result.status(), RunStatus::Cancelled);
    assert!((0..128).all(|node| result.score(node) == 1.0));
    assert!((128..256).all(|node| result.score(node) == 0.0));

    // Termination is sticky
    let result = degree.compute()?.result().unwrap();
    assert_eq!(result.status(), RunStatus::Cancelled);
    assert_eq!(result.sum(), 128.0);
    Ok(())
}

#[test]
fn test_idempotence() -> Result<()> {
    let mut builder = MemoryStore::builder();
    let mut rng = SmallRng::seed_from_u64(7);
    builder.complete_graph(500, 0.05, "N", "R", &mut rng)?;
    let store = builder.build();
    let (graph, _) = GraphLoader::new(&store)
        .global_projection(Projection::Undirected)
        .concurrency(4)
        .load_huge()?;

    let tracker = MemoryTracker::unbounded();
    let mut degree = DegreeCentrality::new(&graph, ExecutionContext::new(4)?, &tracker)?;
    let first = degree.compute()?.result().unwrap().iter().collect::<Vec<_>>();
    let second = degree.compute()?.result().unwrap().iter().collect::<Vec<_>>();
    assert_eq!(first, second);

    let mut sequential = DegreeCentrality::new(&graph, ExecutionContext::new(1)?, &tracker)?;
    let third = sequential.compute()?.result().unwrap().iter().collect::<Vec<_>>();
    assert_eq!(first, third);

    // Each relationship counts once at each endpoint
    assert_eq!(
        first.iter().sum::<f64>(),
        graph.relationship_count() as f64
    );
    Ok(())
}

#[test]
fn test_store_view_degrees() -> Result<()> {
    let mut builder = MemoryStore::builder().records_per_page(8);
    let mut rng = SmallRng::seed_from_u64(3);
    builder.complete_graph(80, 0.1, "N", "R", &mut rng)?;
    let store = builder.build();
    let loader = GraphLoader::new(&store).load_inverse(true).concurrency(3);
    let (huge, _) = loader.load_huge()?;
    let (view, _) = loader.load_store_view()?;

    let tracker = MemoryTracker::unbounded();
    for direction in [Direction::Outgoing, Direction::Incoming, Direction::Both] {
        let mut on_huge = DegreeCentrality::new(&huge, ExecutionContext::new(3)?, &tracker)?;
        let mut on_view = DegreeCentrality::new(&view, ExecutionContext::new(3)?, &tracker)?;
        on_huge.direction(direction).compute()?;
        on_view.direction(direction).compute()?;
        assert_eq!(
            on_huge.result().unwrap().iter().collect::<Vec<_>>(),
            on_view.result().unwrap().iter().collect::<Vec<_>>(),
        );
    }
    Ok(())
}

#[test]
fn test_result_survives_release() -> Result<()> {
    let store = cycle(10)?;
    let tracker = MemoryTracker::unbounded();
    let (graph, _) = GraphLoader::new(&store).tracker(tracker.clone()).load_huge()?;
    let graph_bytes = tracker.used();

    let mut degree = DegreeCentrality::new(graph, ExecutionContext::new(2)?, &tracker)?;
    degree.compute()?;
    degree.release();
    // Only the scores remain
    assert_eq!(tracker.used(), 10 * core::mem::size_of::<f64>());
    assert!(graph_bytes > 0);
    assert_eq!(degree.result().unwrap().sum(), 10.0);
    assert!(degree.compute().is_err());
    Ok(())
}
