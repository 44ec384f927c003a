/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The capability trait shared by all graph representations.
//!
//! Graphs are accessed through dense node identifiers in
//! `[0 . . node_count)`. Relationships are visited through
//! [`for_each_relationship`](Graph::for_each_relationship), which passes the
//! source, the target, and the weight of each relationship to a visitor
//! that can stop the visit by returning [`ControlFlow::Break`].
//!
//! The trait is object safe, so that a [`GraphFactory`](crate::graphs::GraphFactory)
//! can choose the representation at construction time and hand out a
//! `Box<dyn Graph>`.

use crate::store::DecodeError;
use core::ops::ControlFlow;
use impl_tools::autoimpl;

/// The direction of the relationships of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Relationships whose source is the node.
    #[default]
    Outgoing,
    /// Relationships whose target is the node.
    Incoming,
    /// Outgoing relationships followed by incoming relationships.
    Both,
}

impl core::str::FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "outgoing" | "out" => Ok(Direction::Outgoing),
            "incoming" | "in" => Ok(Direction::Incoming),
            "both" => Ok(Direction::Both),
            _ => anyhow::bail!("Unknown direction {s:?}"),
        }
    }
}

/// A visitor of relationships, receiving the source, the target, and the
/// weight of each relationship.
pub type RelationshipVisitor<'a> = dyn FnMut(u64, u64, f64) -> ControlFlow<()> + 'a;

/// An immutable graph with dense node identifiers.
///
/// Targets of the relationships of a node in a given direction are visited
/// in ascending order, possibly with repetitions. For an undirected graph
/// all directions visit the same relationships, and [`Direction::Both`] is
/// equivalent to [`Direction::Outgoing`].
///
/// Methods reading a live store may fail with a [`DecodeError`]; methods of
/// in-memory graphs never fail.
///
/// A graph is released by dropping it, which returns the memory of its
/// buffers to their [tracker](crate::utils::MemoryTracker).
///
/// # Panics
///
/// Methods panic if they are passed a direction that is not
/// [supported](Graph::supports).
#[autoimpl(for<G: trait + ?Sized> &G, &mut G, Box<G>)]
pub trait Graph: Sync {
    /// Returns the number of nodes.
    fn node_count(&self) -> u64;

    /// Returns the number of relationships in the outgoing direction.
    fn relationship_count(&self) -> u64;

    /// Returns whether relationships in the given direction are available.
    fn supports(&self, direction: Direction) -> bool;

    /// Returns whether the graph is undirected.
    fn is_undirected(&self) -> bool;

    /// Returns whether relationships carry a weight property.
    fn has_relationship_property(&self) -> bool;

    /// Returns the number of relationships of a node in the given direction.
    ///
    /// Degrees larger than [`u32::MAX`] saturate.
    fn degree(&self, node: u64, direction: Direction) -> Result<u32, DecodeError>;

    /// Calls `visitor` on each relationship of `node` in the given
    /// direction, until the visitor returns [`ControlFlow::Break`].
    ///
    /// Weights are those of the relationship property, if
    /// [loaded](Graph::has_relationship_property), and `fallback` otherwise.
    /// Incoming relationships are passed with `node` as target.
    fn for_each_relationship(
        &self,
        node: u64,
        direction: Direction,
        fallback: f64,
        visitor: &mut RelationshipVisitor<'_>,
    ) -> Result<(), DecodeError>;

    /// Returns whether there is a relationship from `source` to `target`.
    ///
    /// The default implementation stops at the first target that is not
    /// smaller than `target`.
    fn has_relationship(&self, source: u64, target: u64) -> Result<bool, DecodeError> {
        let mut found = false;
        self.for_each_relationship(source, Direction::Outgoing, 0.0, &mut |_, t, _| {
            if t >= target {
                found = t == target;
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(found)
    }

    /// Returns the external identifier of a node.
    fn to_external(&self, node: u64) -> u64;

    /// Returns the dense identifier of an external identifier, if the node
    /// belongs to the graph.
    fn to_dense(&self, external: u64) -> Option<u64>;
}

/// Collects the targets of the relationships of a node in the given
/// direction.
///
/// For incoming relationships, the sources are collected.
pub fn neighbors(
    graph: &(impl Graph + ?Sized),
    node: u64,
    direction: Direction,
) -> Result<Vec<u64>, DecodeError> {
    let mut result = vec![];
    graph.for_each_relationship(node, direction, 0.0, &mut |s, t, _| {
        result.push(if t == node && s != node { s } else { t });
        ControlFlow::Continue(())
    })?;
    Ok(result)
}

/// Converts a number of relationships into a degree, saturating at
/// [`u32::MAX`].
#[inline(always)]
pub(crate) fn saturating_degree(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturating_degree() {
        assert_eq!(saturating_degree(0), 0);
        assert_eq!(saturating_degree(u32::MAX as usize), u32::MAX);
        assert_eq!(saturating_degree(u32::MAX as usize + 5), u32::MAX);
        assert_eq!(
            saturating_degree(u32::MAX as usize).saturating_add(1),
            u32::MAX
        );
    }
}
