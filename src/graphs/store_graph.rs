/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! A graph reading relationships from a live store.
//!
//! Only the identifier map is held in memory: the relationships of a node
//! are decoded from its relationship chain at each visit, so visits can fail
//! with a [`DecodeError`]. The view presents exactly the relationships a
//! [`HugeGraph`](super::HugeGraph) loaded with the same projection contains,
//! in the same order.

use super::id_map::IdMap;
use crate::import::config::{Projection, ResolvedProjection};
use crate::store::{DecodeError, GraphStore, RelationshipRecord};
use crate::traits::{saturating_degree, Direction, Graph, RelationshipVisitor};
use core::ops::ControlFlow;
use std::sync::Arc;

/// A relationship incident to a node, as seen by a view.
#[derive(Debug, Clone, Copy)]
struct Incident {
    other: u64,
    relationship: u64,
    weight: f64,
}

/// A view over the relationships of a [`GraphStore`].
#[derive(Debug)]
pub struct StoreGraph<'s, S: ?Sized> {
    store: &'s S,
    id_map: Arc<IdMap>,
    projection: ResolvedProjection,
    filtered: bool,
    relationship_count: u64,
}

impl<'s, S: GraphStore + Sync + ?Sized> StoreGraph<'s, S> {
    /// Creates a view.
    ///
    /// If `filtered` is true, relationships with an endpoint outside the
    /// identifier map are ignored; otherwise, they are reported as
    /// [`DecodeError::MissingEndpoint`]. `relationship_count` is the number
    /// of relationships in the outgoing direction.
    pub fn new(
        store: &'s S,
        id_map: Arc<IdMap>,
        projection: ResolvedProjection,
        filtered: bool,
        relationship_count: u64,
    ) -> Self {
        Self {
            store,
            id_map,
            projection,
            filtered,
            relationship_count,
        }
    }

    pub fn id_map(&self) -> &Arc<IdMap> {
        &self.id_map
    }

    pub fn name(&self) -> &str {
        &self.projection.name
    }

    fn dense(&self, relationship: u64, external: u64) -> Result<Option<u64>, DecodeError> {
        match self.id_map.to_dense(external) {
            Some(dense) => Ok(Some(dense)),
            None if self.filtered => Ok(None),
            None => Err(DecodeError::MissingEndpoint {
                relationship,
                node: external,
            }),
        }
    }

    fn weight(&self, record: &RelationshipRecord, fallback: f64) -> Result<f64, DecodeError> {
        Ok(match self.projection.property {
            None => fallback,
            Some((key, default_value)) => {
                match self.store.property_value(record.first_property, key)? {
                    Some(value) if !value.is_nan() => value,
                    _ => default_value,
                }
            }
        })
    }

    /// Adds a relationship of `node` to the outgoing or incoming
    /// relationships, depending on the projection.
    fn classify(
        &self,
        node: u64,
        relationship: u64,
        record: &RelationshipRecord,
        fallback: f64,
        outgoing: &mut Vec<Incident>,
        incoming: &mut Vec<Incident>,
    ) -> Result<(), DecodeError> {
        let (Some(source), Some(target)) = (
            self.dense(relationship, record.source)?,
            self.dense(relationship, record.target)?,
        ) else {
            return Ok(());
        };
        let weight = self.weight(record, fallback)?;
        let incident = |other| Incident {
            other,
            relationship,
            weight,
        };
        let (out, inc) = match self.projection.projection {
            Projection::Reversed => (incoming, outgoing),
            Projection::Natural | Projection::Undirected => (outgoing, incoming),
        };
        if source == node {
            out.push(incident(target));
        }
        if target == node {
            if self.is_undirected() {
                out.push(incident(source));
            } else {
                inc.push(incident(source));
            }
        }
        Ok(())
    }

    /// Collects the relationships of `node`, split in outgoing and incoming
    /// with respect to the projection, each sorted by the other endpoint and
    /// then by relationship id.
    ///
    /// For undirected projections all relationships are outgoing, and
    /// self-loops appear twice.
    fn incidents(
        &self,
        node: u64,
        fallback: f64,
    ) -> Result<(Vec<Incident>, Vec<Incident>), DecodeError> {
        let external = self.id_map.to_external(node);
        let mut outgoing = vec![];
        let mut incoming = vec![];
        let mut failure = None;
        self.store
            .for_each_chained_relationship(external, &mut |relationship, record| {
                if self.projection.matches(record.rel_type) {
                    if let Err(err) = self.classify(
                        node,
                        relationship,
                        record,
                        fallback,
                        &mut outgoing,
                        &mut incoming,
                    ) {
                        failure = Some(err);
                        return ControlFlow::Break(());
                    }
                }
                ControlFlow::Continue(())
            })?;
        if let Some(err) = failure {
            return Err(err);
        }
        for incidents in [&mut outgoing, &mut incoming] {
            incidents.sort_by_key(|i| (i.other, i.relationship));
        }
        Ok((outgoing, incoming))
    }

    /// Returns the outgoing and incoming relationships to visit in the
    /// given direction.
    fn select(
        &self,
        node: u64,
        direction: Direction,
        fallback: f64,
    ) -> Result<(Vec<Incident>, Vec<Incident>), DecodeError> {
        let (outgoing, mut incoming) = self.incidents(node, fallback)?;
        Ok(match direction {
            Direction::Outgoing => {
                incoming.clear();
                (outgoing, incoming)
            }
            _ if self.is_undirected() => {
                incoming.clear();
                (outgoing, incoming)
            }
            Direction::Incoming => (vec![], incoming),
            Direction::Both => (outgoing, incoming),
        })
    }
}

impl<S: GraphStore + Sync + ?Sized> Graph for StoreGraph<'_, S> {
    fn node_count(&self) -> u64 {
        self.id_map.node_count()
    }

    fn relationship_count(&self) -> u64 {
        self.relationship_count
    }

    fn supports(&self, _direction: Direction) -> bool {
        // Chains link relationships to both endpoints
        true
    }

    fn is_undirected(&self) -> bool {
        self.projection.projection == Projection::Undirected
    }

    fn has_relationship_property(&self) -> bool {
        self.projection.is_weighted()
    }

    fn degree(&self, node: u64, direction: Direction) -> Result<u32, DecodeError> {
        let (outgoing, incoming) = self.select(node, direction, 0.0)?;
        Ok(saturating_degree(outgoing.len() + incoming.len()))
    }

    fn for_each_relationship(
        &self,
        node: u64,
        direction: Direction,
        fallback: f64,
        visitor: &mut RelationshipVisitor<'_>,
    ) -> Result<(), DecodeError> {
        let (outgoing, incoming) = self.select(node, direction, fallback)?;
        let relationships = outgoing
            .iter()
            .map(|i| (node, i.other, i.weight))
            .chain(incoming.iter().map(|i| (i.other, node, i.weight)));
        for (source, target, weight) in relationships {
            if visitor(source, target, weight).is_break() {
                break;
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
