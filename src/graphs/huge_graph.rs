/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::adjacency::CompressedAdjacency;
use super::id_map::IdMap;
use crate::store::DecodeError;
use crate::traits::{Direction, Graph, RelationshipVisitor};
use core::ops::ControlFlow;
use std::sync::Arc;

/// An immutable graph backed by compressed adjacencies.
///
/// The identifier map can be shared among the graphs of different
/// projections loaded from the same nodes. All buffers are reclaimed when
/// the graph is dropped.
#[derive(Debug)]
pub struct HugeGraph {
    name: String,
    id_map: Arc<IdMap>,
    outgoing: CompressedAdjacency,
    incoming: Option<CompressedAdjacency>,
    undirected: bool,
}

impl HugeGraph {
    /// Creates a graph from its adjacencies.
    ///
    /// # Panics
    ///
    /// Panics if the adjacencies do not have a run for each node of the
    /// map, or if an undirected graph has an incoming adjacency.
    pub fn new(
        name: impl Into<String>,
        id_map: Arc<IdMap>,
        outgoing: CompressedAdjacency,
        incoming: Option<CompressedAdjacency>,
        undirected: bool,
    ) -> Self {
        assert_eq!(outgoing.node_count() as u64, id_map.node_count());
        if let Some(incoming) = &incoming {
            assert!(!undirected, "Undirected graphs have no incoming adjacency");
            assert_eq!(incoming.node_count() as u64, id_map.node_count());
        }
        Self {
            name: name.into(),
            id_map,
            outgoing,
            incoming,
            undirected,
        }
    }

    /// Returns the name of the relationship projection of the graph.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_map(&self) -> &Arc<IdMap> {
        &self.id_map
    }

    pub fn outgoing(&self) -> &CompressedAdjacency {
        &self.outgoing
    }

    pub fn incoming(&self) -> Option<&CompressedAdjacency> {
        self.incoming.as_ref()
    }

    /// Returns the number of bytes registered with the memory tracker by
    /// the adjacencies (the identifier map is not included).
    pub fn tracked_bytes(&self) -> usize {
        self.outgoing.tracked_bytes() + self.incoming.as_ref().map_or(0, |a| a.tracked_bytes())
    }

    fn incoming_adjacency(&self) -> &CompressedAdjacency {
        if self.undirected {
            &self.outgoing
        } else {
            self.incoming.as_ref().unwrap_or_else(|| {
                panic!("Graph {} was loaded without incoming relationships", self.name)
            })
        }
    }
}

fn visit(
    adjacency: &CompressedAdjacency,
    node: u64,
    reverse: bool,
    fallback: f64,
    visitor: &mut RelationshipVisitor<'_>,
) -> ControlFlow<()> {
    let mut call = |other: u64, weight: f64| {
        if reverse {
            visitor(other, node, weight)
        } else {
            visitor(node, other, weight)
        }
    };
    let index = node as usize;
    match adjacency.weights(index) {
        Some(weights) => {
            for (other, weight) in adjacency.targets(index).zip(weights) {
                call(other, weight)?;
            }
        }
        None => {
            for other in adjacency.targets(index) {
                call(other, fallback)?;
            }
        }
    }
    ControlFlow::Continue(())
}

impl Graph for HugeGraph {
    fn node_count(&self) -> u64 {
        self.id_map.node_count()
    }

    fn relationship_count(&self) -> u64 {
        self.outgoing.relationship_count()
    }

    fn supports(&self, direction: Direction) -> bool {
        self.undirected || direction == Direction::Outgoing || self.incoming.is_some()
    }

    fn is_undirected(&self) -> bool {
        self.undirected
    }

    fn has_relationship_property(&self) -> bool {
        self.outgoing.is_weighted()
    }

    fn degree(&self, node: u64, direction: Direction) -> Result<u32, DecodeError> {
        let index = node as usize;
        Ok(match direction {
            Direction::Outgoing => self.outgoing.degree(index),
            _ if self.undirected => self.outgoing.degree(index),
            Direction::Incoming => self.incoming_adjacency().degree(index),
            Direction::Both => self
                .outgoing
                .degree(index)
                .saturating_add(self.incoming_adjacency().degree(index)),
        })
    }

    fn for_each_relationship(
        &self,
        node: u64,
        direction: Direction,
        fallback: f64,
        visitor: &mut RelationshipVisitor<'_>,
    ) -> Result<(), DecodeError> {
        match direction {
            Direction::Outgoing => {
                visit(&self.outgoing, node, false, fallback, visitor);
            }
            _ if self.undirected => {
                visit(&self.outgoing, node, false, fallback, visitor);
            }
            Direction::Incoming => {
                visit(self.incoming_adjacency(), node, true, fallback, visitor);
            }
            Direction::Both => {
                let incoming = self.incoming_adjacency();
                if visit(&self.outgoing, node, false, fallback, visitor).is_continue() {
                    visit(incoming, node, true, fallback, visitor);
                }
            }
        }
        Ok(())
    }

    fn to_external(&self, node: u64) -> u64 {
        self.id_map.to_external(node)
    }

    fn to_dense(&self, external: u64) -> Option<u64> {
        self.id_map.to_dense(external)
    }
}
