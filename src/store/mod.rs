/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The record stores graphs are imported from.
//!
//! A store is a set of [record stores](RecordStore), one per record kind,
//! each of which is a space of fixed-size slots identified by a record id in
//! `[0 . . high_id)`. Slots are grouped in pages, and are read through
//! [cursors](RecordCursor) that can be positioned on any id and then decode
//! forward sequentially. A slot is either [in use](Slot::InUse) or
//! [unused](Slot::Unused) (never written, or deleted): unused slots are
//! skipped by importers.
//!
//! Relationships of a node are additionally linked in a chain starting at
//! [`NodeRecord::first_relationship`]: a relationship continues the chain of
//! its source through [`RelationshipRecord::source_next`] and the chain of
//! its target through [`RelationshipRecord::target_next`]. Self-loops appear
//! only once, in the chain of their source. Properties of a relationship are
//! similarly chained starting at [`RelationshipRecord::first_property`].
//!
//! Every inconsistency found while decoding is reported as a
//! [`DecodeError`], which aborts imports.

pub mod memory;
pub use memory::{Corruption, MemoryStore, MemoryStoreBuilder, RecordKind};

use impl_tools::autoimpl;
use thiserror::Error;

/// The null pointer of record chains.
pub const NO_ID: u64 = u64::MAX;

/// A corrupt or inconsistent record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Record {id} of the {store} store has invalid in-use marker {marker:#04x}")]
    InvalidMarker {
        store: &'static str,
        id: u64,
        marker: u8,
    },
    #[error("Record {id} of the {store} store points to {pointer}, past the high id {high_id}")]
    DanglingPointer {
        store: &'static str,
        id: u64,
        pointer: u64,
        high_id: u64,
    },
    #[error("Relationship {relationship} in the chain of node {node} is unused or not incident to the node")]
    BrokenChain { node: u64, relationship: u64 },
    #[error("The {chain} chain starting at record {start} does not terminate")]
    UnterminatedChain { chain: &'static str, start: u64 },
    #[error("Relationship {relationship} references node {node}, which is unused")]
    MissingEndpoint { relationship: u64, node: u64 },
}

/// The content of a slot returned by a [`RecordCursor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot<R> {
    InUse(u64, R),
    Unused(u64),
}

impl<R> Slot<R> {
    /// Returns the record id of the slot.
    pub fn id(&self) -> u64 {
        match self {
            Slot::InUse(id, _) | Slot::Unused(id) => *id,
        }
    }

    /// Returns the record, if the slot is in use.
    pub fn into_record(self) -> Option<R> {
        match self {
            Slot::InUse(_, record) => Some(record),
            Slot::Unused(_) => None,
        }
    }
}

/// A node record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRecord {
    /// A bitmap of label ids (bit `i` set iff the node has label `i`).
    pub labels: u64,
    pub first_relationship: u64,
}

impl NodeRecord {
    /// Returns true if the node has the given label.
    #[inline(always)]
    pub fn has_label(&self, label: u32) -> bool {
        label < 64 && self.labels & (1 << label) != 0
    }
}

/// A relationship record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipRecord {
    pub source: u64,
    pub target: u64,
    pub rel_type: u32,
    pub source_next: u64,
    pub target_next: u64,
    pub first_property: u64,
}

/// A property record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyRecord {
    pub key: u32,
    pub value: f64,
    pub next: u64,
}

/// A cursor over the slots of a [`RecordStore`].
///
/// After a [`seek`](RecordCursor::seek) the cursor returns the slots from
/// the given id onwards in id order, one per call to
/// [`next`](Iterator::next), until the high id of the store is reached.
pub trait RecordCursor<R>: Iterator<Item = Result<Slot<R>, DecodeError>> {
    /// Positions the cursor so that the next slot returned is the one with
    /// the given id.
    fn seek(&mut self, id: u64);
}

/// A paged space of fixed-size records.
#[autoimpl(for<S: trait + ?Sized> &S)]
pub trait RecordStore {
    type Record;
    type Cursor<'a>: RecordCursor<Self::Record>
    where
        Self: 'a;

    /// Returns one plus the largest id ever assigned.
    fn high_id(&self) -> u64;

    /// Returns the number of records in a page.
    fn records_per_page(&self) -> usize;

    /// Returns a cursor positioned at the first record.
    fn cursor(&self) -> Self::Cursor<'_>;

    /// Decodes the record with the given id, returning `None` if the slot is
    /// unused.
    fn record(&self, id: u64) -> Result<Option<Self::Record>, DecodeError>;
}

/// A graph store: node, relationship, and property records, plus the token
/// tables naming labels, relationship types, and property keys.
#[autoimpl(for<S: trait + ?Sized> &S)]
pub trait GraphStore {
    type Nodes: RecordStore<Record = NodeRecord> + Sync;
    type Relationships: RecordStore<Record = RelationshipRecord> + Sync;
    type Properties: RecordStore<Record = PropertyRecord> + Sync;

    fn nodes(&self) -> &Self::Nodes;
    fn relationships(&self) -> &Self::Relationships;
    fn properties(&self) -> &Self::Properties;

    fn label_id(&self, name: &str) -> Option<u32>;
    fn relationship_type_id(&self, name: &str) -> Option<u32>;
    fn relationship_type_name(&self, id: u32) -> Option<&str>;
    fn property_key_id(&self, name: &str) -> Option<u32>;

    /// Follows the property chain starting at `first_property` and returns
    /// the value of the first property with the given key.
    fn property_value(&self, first_property: u64, key: u32) -> Result<Option<f64>, DecodeError> {
        let properties = self.properties();
        let mut next = first_property;
        let mut steps = 0;
        while next != NO_ID {
            steps += 1;
            if steps > properties.high_id() {
                return Err(DecodeError::UnterminatedChain {
                    chain: "property",
                    start: first_property,
                });
            }
            let Some(property) = properties.record(next)? else {
                return Err(DecodeError::UnterminatedChain {
                    chain: "property",
                    start: first_property,
                });
            };
            if property.key == key {
                return Ok(Some(property.value));
            }
            next = property.next;
        }
        Ok(None)
    }

    /// Follows the relationship chain of `node` and calls `f` on each
    /// relationship id and record, in chain order.
    fn for_each_chained_relationship(
        &self,
        node: u64,
        f: &mut dyn FnMut(u64, &RelationshipRecord) -> core::ops::ControlFlow<()>,
    ) -> Result<(), DecodeError> {
        let Some(node_record) = self.nodes().record(node)? else {
            return Ok(());
        };
        let relationships = self.relationships();
        let mut next = node_record.first_relationship;
        let mut steps = 0;
        while next != NO_ID {
            steps += 1;
            if steps > relationships.high_id() {
                return Err(DecodeError::UnterminatedChain {
                    chain: "relationship",
                    start: node_record.first_relationship,
                });
            }
            let current = next;
            let record = relationships
                .record(current)?
                .ok_or(DecodeError::BrokenChain {
                    node,
                    relationship: current,
                })?;
            next = if record.source == node {
                record.source_next
            } else if record.target == node {
                record.target_next
            } else {
                return Err(DecodeError::BrokenChain {
                    node,
                    relationship: current,
                });
            };
            if f(current, &record).is_break() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let node = NodeRecord {
            labels: 0b101,
            first_relationship: NO_ID,
        };
        assert!(node.has_label(0));
        assert!(!node.has_label(1));
        assert!(node.has_label(2));
        assert!(!node.has_label(100));
    }

    #[test]
    fn test_slot() {
        let slot = Slot::InUse(3, 7);
        assert_eq!(slot.id(), 3);
        assert_eq!(slot.into_record(), Some(7));
        assert_eq!(Slot::<u8>::Unused(5).into_record(), None);
    }
}
