/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! An in-memory [graph store](GraphStore) with paged fixed-size records.
//!
//! Records are stored little-endian in pages of [`PAGE_BYTES`] bytes, each
//! preceded by an in-use marker byte (0 for unused, 1 for in use):
//!
//! | Record | Layout | Bytes |
//! |---|---|---|
//! | node | marker, labels `u64`, first relationship `u64` | 17 |
//! | relationship | marker, source `u64`, target `u64`, type `u32`, source next `u64`, target next `u64`, first property `u64` | 45 |
//! | property | marker, key `u32`, value `f64`, next `u64` | 21 |
//!
//! Stores are created by a [`MemoryStoreBuilder`], which maintains the
//! relationship and property chains.

use super::*;
use anyhow::{bail, ensure, Context, Result};
use core::marker::PhantomData;
use rand::Rng;

/// The size of a page in bytes.
pub const PAGE_BYTES: usize = 8192;

/// One plus the largest id of each record kind of a store, used to validate
/// pointers while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HighIds {
    pub nodes: u64,
    pub relationships: u64,
    pub properties: u64,
}

/// A record with a fixed-size little-endian encoding.
pub trait FixedSizeRecord: Copy {
    /// The size of the encoding, excluding the in-use marker.
    const SIZE: usize;
    /// The name of the store, for error messages.
    const STORE: &'static str;

    fn encode(&self, buf: &mut [u8]);

    /// Decodes the record with the given id, checking its pointers against
    /// the high ids of the store.
    fn decode(id: u64, buf: &[u8], high_ids: &HighIds) -> Result<Self, DecodeError>;
}

#[inline(always)]
fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

#[inline(always)]
fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn check_pointer(
    store: &'static str,
    id: u64,
    pointer: u64,
    high_id: u64,
    nullable: bool,
) -> Result<u64, DecodeError> {
    if (nullable && pointer == NO_ID) || pointer < high_id {
        Ok(pointer)
    } else {
        Err(DecodeError::DanglingPointer {
            store,
            id,
            pointer,
            high_id,
        })
    }
}

impl FixedSizeRecord for NodeRecord {
    const SIZE: usize = 16;
    const STORE: &'static str = "node";

    fn encode(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.labels.to_le_bytes());
        buf[8..16].copy_from_slice(&self.first_relationship.to_le_bytes());
    }

    fn decode(id: u64, buf: &[u8], high_ids: &HighIds) -> Result<Self, DecodeError> {
        Ok(NodeRecord {
            labels: read_u64(buf, 0),
            first_relationship: check_pointer(
                Self::STORE,
                id,
                read_u64(buf, 8),
                high_ids.relationships,
                true,
            )?,
        })
    }
}

impl FixedSizeRecord for RelationshipRecord {
    const SIZE: usize = 44;
    const STORE: &'static str = "relationship";

    fn encode(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.source.to_le_bytes());
        buf[8..16].copy_from_slice(&self.target.to_le_bytes());
        buf[16..20].copy_from_slice(&self.rel_type.to_le_bytes());
        buf[20..28].copy_from_slice(&self.source_next.to_le_bytes());
        buf[28..36].copy_from_slice(&self.target_next.to_le_bytes());
        buf[36..44].copy_from_slice(&self.first_property.to_le_bytes());
    }

    fn decode(id: u64, buf: &[u8], high_ids: &HighIds) -> Result<Self, DecodeError> {
        let store = Self::STORE;
        Ok(RelationshipRecord {
            source: check_pointer(store, id, read_u64(buf, 0), high_ids.nodes, false)?,
            target: check_pointer(store, id, read_u64(buf, 8), high_ids.nodes, false)?,
            rel_type: read_u32(buf, 16),
            source_next: check_pointer(store, id, read_u64(buf, 20), high_ids.relationships, true)?,
            target_next: check_pointer(store, id, read_u64(buf, 28), high_ids.relationships, true)?,
            first_property: check_pointer(store, id, read_u64(buf, 36), high_ids.properties, true)?,
        })
    }
}

impl FixedSizeRecord for PropertyRecord {
    const SIZE: usize = 20;
    const STORE: &'static str = "property";

    fn encode(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.key.to_le_bytes());
        buf[4..12].copy_from_slice(&self.value.to_le_bytes());
        buf[12..20].copy_from_slice(&self.next.to_le_bytes());
    }

    fn decode(id: u64, buf: &[u8], high_ids: &HighIds) -> Result<Self, DecodeError> {
        Ok(PropertyRecord {
            key: read_u32(buf, 0),
            value: f64::from_bits(read_u64(buf, 4)),
            next: check_pointer(Self::STORE, id, read_u64(buf, 12), high_ids.properties, true)?,
        })
    }
}

/// A [`RecordStore`] of fixed-size records stored in pages.
pub struct PagedRecords<R> {
    pages: Vec<Box<[u8]>>,
    records_per_page: usize,
    high_id: u64,
    high_ids: HighIds,
    _marker: PhantomData<R>,
}

impl<R> core::fmt::Debug for PagedRecords<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PagedRecords")
            .field("high_id", &self.high_id)
            .field("records_per_page", &self.records_per_page)
            .field("num_pages", &self.pages.len())
            .finish()
    }
}

impl<R: FixedSizeRecord> PagedRecords<R> {
    const SLOT_SIZE: usize = R::SIZE + 1;

    fn new(
        records: &[Option<R>],
        records_per_page: usize,
        high_ids: HighIds,
    ) -> Self {
        let pages = records
            .chunks(records_per_page)
            .map(|chunk| {
                let mut page = vec![0_u8; records_per_page * Self::SLOT_SIZE].into_boxed_slice();
                for (slot, record) in page.chunks_exact_mut(Self::SLOT_SIZE).zip(chunk) {
                    if let Some(record) = record {
                        slot[0] = 1;
                        record.encode(&mut slot[1..]);
                    }
                }
                page
            })
            .collect();
        Self {
            pages,
            records_per_page,
            high_id: records.len() as u64,
            high_ids,
            _marker: PhantomData,
        }
    }

    #[inline(always)]
    fn slot_bytes(&self, id: u64) -> &[u8] {
        let page = (id / self.records_per_page as u64) as usize;
        let offset = (id % self.records_per_page as u64) as usize * Self::SLOT_SIZE;
        &self.pages[page][offset..offset + Self::SLOT_SIZE]
    }

    fn slot_bytes_mut(&mut self, id: u64) -> &mut [u8] {
        let page = (id / self.records_per_page as u64) as usize;
        let offset = (id % self.records_per_page as u64) as usize * Self::SLOT_SIZE;
        &mut self.pages[page][offset..offset + Self::SLOT_SIZE]
    }

    fn decode_slot(&self, id: u64) -> Result<Slot<R>, DecodeError> {
        let bytes = self.slot_bytes(id);
        match bytes[0] {
            0 => Ok(Slot::Unused(id)),
            1 => Ok(Slot::InUse(id, R::decode(id, &bytes[1..], &self.high_ids)?)),
            marker => Err(DecodeError::InvalidMarker {
                store: R::STORE,
                id,
                marker,
            }),
        }
    }
}

/// A cursor over [`PagedRecords`].
#[derive(Debug)]
pub struct PageCursor<'a, R> {
    store: &'a PagedRecords<R>,
    next_id: u64,
}

impl<R: FixedSizeRecord> Iterator for PageCursor<'_, R> {
    type Item = Result<Slot<R>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_id >= self.store.high_id {
            return None;
        }
        let slot = self.store.decode_slot(self.next_id);
        self.next_id += 1;
        Some(slot)
    }
}

impl<R: FixedSizeRecord> RecordCursor<R> for PageCursor<'_, R> {
    fn seek(&mut self, id: u64) {
        self.next_id = id;
    }
}

impl<R: FixedSizeRecord> RecordStore for PagedRecords<R> {
    type Record = R;
    type Cursor<'a>
        = PageCursor<'a, R>
    where
        Self: 'a;

    fn high_id(&self) -> u64 {
        self.high_id
    }

    fn records_per_page(&self) -> usize {
        self.records_per_page
    }

    fn cursor(&self) -> PageCursor<'_, R> {
        PageCursor {
            store: self,
            next_id: 0,
        }
    }

    fn record(&self, id: u64) -> Result<Option<R>, DecodeError> {
        if id >= self.high_id {
            return Err(DecodeError::DanglingPointer {
                store: R::STORE,
                id,
                pointer: id,
                high_id: self.high_id,
            });
        }
        Ok(self.decode_slot(id)?.into_record())
    }
}

/// An in-memory graph store.
#[derive(Debug)]
pub struct MemoryStore {
    nodes: PagedRecords<NodeRecord>,
    relationships: PagedRecords<RelationshipRecord>,
    properties: PagedRecords<PropertyRecord>,
    labels: Vec<String>,
    relationship_types: Vec<String>,
    property_keys: Vec<String>,
}

impl MemoryStore {
    pub fn builder() -> MemoryStoreBuilder {
        MemoryStoreBuilder::new()
    }

    /// Returns the high ids of the store.
    pub fn high_ids(&self) -> HighIds {
        self.nodes.high_ids
    }
}

impl GraphStore for MemoryStore {
    type Nodes = PagedRecords<NodeRecord>;
    type Relationships = PagedRecords<RelationshipRecord>;
    type Properties = PagedRecords<PropertyRecord>;

    fn nodes(&self) -> &Self::Nodes {
        &self.nodes
    }

    fn relationships(&self) -> &Self::Relationships {
        &self.relationships
    }

    fn properties(&self) -> &Self::Properties {
        &self.properties
    }

    fn label_id(&self, name: &str) -> Option<u32> {
        token_id(&self.labels, name)
    }

    fn relationship_type_id(&self, name: &str) -> Option<u32> {
        token_id(&self.relationship_types, name)
    }

    fn relationship_type_name(&self, id: u32) -> Option<&str> {
        self.relationship_types.get(id as usize).map(String::as_str)
    }

    fn property_key_id(&self, name: &str) -> Option<u32> {
        token_id(&self.property_keys, name)
    }
}

fn token_id(tokens: &[String], name: &str) -> Option<u32> {
    tokens.iter().position(|t| t == name).map(|i| i as u32)
}

fn token_id_or_create(tokens: &mut Vec<String>, name: &str) -> u32 {
    token_id(tokens, name).unwrap_or_else(|| {
        tokens.push(name.to_owned());
        (tokens.len() - 1) as u32
    })
}

/// A kind of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Node,
    Relationship,
    Property,
}

/// A deliberate corruption applied to the encoded records by
/// [`MemoryStoreBuilder::corrupt`], used to test error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    /// Overwrites the in-use marker of a record.
    Marker(RecordKind, u64, u8),
    /// Makes the target of a relationship point past the high id of the
    /// node store.
    DanglingTarget(u64),
}

/// A builder for [`MemoryStore`].
///
/// # Examples
///
/// ```
/// use heapgraph::store::*;
///
/// # fn main() -> anyhow::Result<()> {
/// let mut builder = MemoryStore::builder();
/// let a = builder.add_node(&["Person"]);
/// let b = builder.add_node(&["Person"]);
/// builder.add_relationship(a, b, "KNOWS", &[("since", 2019.0)])?;
/// let store = builder.build();
/// assert_eq!(store.relationships().high_id(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStoreBuilder {
    nodes: Vec<Option<NodeRecord>>,
    relationships: Vec<Option<RelationshipRecord>>,
    properties: Vec<Option<PropertyRecord>>,
    labels: Vec<String>,
    relationship_types: Vec<String>,
    property_keys: Vec<String>,
    records_per_page: Option<usize>,
    corruptions: Vec<Corruption>,
}

impl Default for MemoryStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreBuilder {
    pub fn new() -> Self {
        Self {
            nodes: vec![],
            relationships: vec![],
            properties: vec![],
            labels: vec![],
            relationship_types: vec![],
            property_keys: vec![],
            records_per_page: None,
            corruptions: vec![],
        }
    }

    /// Uses pages of `records_per_page` records for all stores, instead of
    /// pages of [`PAGE_BYTES`] bytes.
    pub fn records_per_page(mut self, records_per_page: usize) -> Self {
        assert!(records_per_page > 0, "Pages must contain at least one record");
        self.records_per_page = Some(records_per_page);
        self
    }

    /// Creates a node with the given labels, returning its id.
    ///
    /// # Panics
    ///
    /// Panics if the store would contain more than 64 distinct labels.
    pub fn add_node(&mut self, labels: &[&str]) -> u64 {
        let mut bitmap = 0;
        for label in labels {
            let id = token_id_or_create(&mut self.labels, label);
            assert!(id < 64, "At most 64 labels are supported");
            bitmap |= 1 << id;
        }
        self.nodes.push(Some(NodeRecord {
            labels: bitmap,
            first_relationship: NO_ID,
        }));
        (self.nodes.len() - 1) as u64
    }

    /// Leaves `count` unused node slots, so that identifiers are not
    /// contiguous.
    pub fn skip_node_ids(&mut self, count: usize) {
        self.nodes.resize(self.nodes.len() + count, None);
    }

    /// Leaves `count` unused relationship slots.
    pub fn skip_relationship_ids(&mut self, count: usize) {
        self.relationships
            .resize(self.relationships.len() + count, None);
    }

    fn node_mut(&mut self, node: u64) -> Result<&mut NodeRecord> {
        self.nodes
            .get_mut(node as usize)
            .and_then(Option::as_mut)
            .with_context(|| format!("Node {node} does not exist"))
    }

    /// Creates a relationship with the given type and properties, returning
    /// its id.
    ///
    /// The relationship is linked at the head of the chains of its endpoints
    /// (only once for self-loops).
    pub fn add_relationship(
        &mut self,
        source: u64,
        target: u64,
        rel_type: &str,
        properties: &[(&str, f64)],
    ) -> Result<u64> {
        self.node_mut(target)?;
        let id = self.relationships.len() as u64;
        let source_next = core::mem::replace(&mut self.node_mut(source)?.first_relationship, id);
        let target_next = if source == target {
            NO_ID
        } else {
            core::mem::replace(&mut self.node_mut(target)?.first_relationship, id)
        };

        let mut first_property = NO_ID;
        for &(key, value) in properties.iter().rev() {
            let key = token_id_or_create(&mut self.property_keys, key);
            self.properties.push(Some(PropertyRecord {
                key,
                value,
                next: first_property,
            }));
            first_property = (self.properties.len() - 1) as u64;
        }

        let rel_type = token_id_or_create(&mut self.relationship_types, rel_type);
        self.relationships.push(Some(RelationshipRecord {
            source,
            target,
            rel_type,
            source_next,
            target_next,
            first_property,
        }));
        Ok(id)
    }

    /// Returns the pointer continuing the chain of `node` after `record`.
    fn chain_next(record: &RelationshipRecord, node: u64) -> u64 {
        if record.source == node {
            record.source_next
        } else {
            record.target_next
        }
    }

    fn set_chain_next(&mut self, relationship: u64, node: u64, next: u64) {
        if let Some(Some(record)) = self.relationships.get_mut(relationship as usize) {
            if record.source == node {
                record.source_next = next;
            } else {
                record.target_next = next;
            }
        }
    }

    fn unlink(&mut self, node: u64, relationship: u64, next: u64) -> Result<()> {
        let first = self.node_mut(node)?.first_relationship;
        if first == relationship {
            self.node_mut(node)?.first_relationship = next;
            return Ok(());
        }
        let mut current = first;
        while current != NO_ID {
            let record = self.relationships[current as usize]
                .with_context(|| format!("Relationship {current} is not in use"))?;
            let after = Self::chain_next(&record, node);
            if after == relationship {
                self.set_chain_next(current, node, next);
                return Ok(());
            }
            current = after;
        }
        bail!("Relationship {relationship} is not in the chain of node {node}")
    }

    /// Deletes a relationship and its properties, leaving an unused slot.
    pub fn delete_relationship(&mut self, relationship: u64) -> Result<()> {
        let record = self
            .relationships
            .get(relationship as usize)
            .copied()
            .flatten()
            .with_context(|| format!("Relationship {relationship} does not exist"))?;
        self.unlink(record.source, relationship, record.source_next)?;
        if record.target != record.source {
            self.unlink(record.target, relationship, record.target_next)?;
        }
        let mut property = record.first_property;
        while property != NO_ID {
            property = match self.properties[property as usize].take() {
                Some(p) => p.next,
                None => NO_ID,
            };
        }
        self.relationships[relationship as usize] = None;
        Ok(())
    }

    /// Deletes a node without relationships, leaving an unused slot.
    pub fn delete_node(&mut self, node: u64) -> Result<()> {
        let record = *self.node_mut(node)?;
        ensure!(
            record.first_relationship == NO_ID,
            "Node {node} still has relationships"
        );
        self.nodes[node as usize] = None;
        Ok(())
    }

    /// Registers a corruption to be applied by [`build`](Self::build).
    pub fn corrupt(&mut self, corruption: Corruption) {
        self.corruptions.push(corruption);
    }

    /// Creates `node_count` nodes with the given label and, for each pair of
    /// nodes `i < j`, a relationship from `i` to `j` with probability
    /// `connectedness`. Returns the ids of the new nodes.
    pub fn complete_graph(
        &mut self,
        node_count: usize,
        connectedness: f64,
        label: &str,
        rel_type: &str,
        rng: &mut impl Rng,
    ) -> Result<Vec<u64>> {
        ensure!(
            (0.0..=1.0).contains(&connectedness),
            "The connectedness must be in [0 . . 1], got {connectedness}"
        );
        let nodes = (0..node_count)
            .map(|_| self.add_node(&[label]))
            .collect::<Vec<_>>();
        for (i, &source) in nodes.iter().enumerate() {
            for &target in &nodes[i + 1..] {
                if rng.random_bool(connectedness) {
                    self.add_relationship(source, target, rel_type, &[])?;
                }
            }
        }
        Ok(nodes)
    }

    /// Encodes the records into pages.
    pub fn build(self) -> MemoryStore {
        let high_ids = HighIds {
            nodes: self.nodes.len() as u64,
            relationships: self.relationships.len() as u64,
            properties: self.properties.len() as u64,
        };
        let rpp = |size: usize| {
            self.records_per_page
                .unwrap_or_else(|| (PAGE_BYTES / (size + 1)).max(1))
        };
        let mut store = MemoryStore {
            nodes: PagedRecords::new(&self.nodes, rpp(NodeRecord::SIZE), high_ids),
            relationships: PagedRecords::new(
                &self.relationships,
                rpp(RelationshipRecord::SIZE),
                high_ids,
            ),
            properties: PagedRecords::new(&self.properties, rpp(PropertyRecord::SIZE), high_ids),
            labels: self.labels,
            relationship_types: self.relationship_types,
            property_keys: self.property_keys,
        };
        for corruption in self.corruptions {
            match corruption {
                Corruption::Marker(RecordKind::Node, id, marker) => {
                    store.nodes.slot_bytes_mut(id)[0] = marker
                }
                Corruption::Marker(RecordKind::Relationship, id, marker) => {
                    store.relationships.slot_bytes_mut(id)[0] = marker
                }
                Corruption::Marker(RecordKind::Property, id, marker) => {
                    store.properties.slot_bytes_mut(id)[0] = marker
                }
                Corruption::DanglingTarget(id) => {
                    store.relationships.slot_bytes_mut(id)[9..17]
                        .copy_from_slice(&high_ids.nodes.to_le_bytes());
                }
            }
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::ops::ControlFlow::Continue;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn chain(store: &MemoryStore, node: u64) -> Vec<u64> {
        let mut ids = vec![];
        store
            .for_each_chained_relationship(node, &mut |id, _| {
                ids.push(id);
                Continue(())
            })
            .unwrap();
        ids
    }

    #[test]
    fn test_records_round_trip_through_pages() -> Result<()> {
        let mut builder = MemoryStore::builder().records_per_page(2);
        let a = builder.add_node(&["A"]);
        builder.skip_node_ids(3);
        let b = builder.add_node(&["A", "B"]);
        let r = builder.add_relationship(a, b, "T", &[("w", 1.5), ("x", -2.0)])?;
        let store = builder.build();

        assert_eq!(store.nodes().high_id(), 5);
        assert_eq!(store.nodes().records_per_page(), 2);
        let slots = store.nodes().cursor().collect::<Result<Vec<_>, _>>()?;
        assert_eq!(slots.len(), 5);
        assert!(matches!(slots[0], Slot::InUse(0, _)));
        assert_eq!(slots[1], Slot::Unused(1));
        assert_eq!(slots[3], Slot::Unused(3));
        let b_record = store.nodes().record(b)?.unwrap();
        assert!(b_record.has_label(store.label_id("B").unwrap()));
        assert_eq!(b_record.first_relationship, r);

        let rel = store.relationships().record(r)?.unwrap();
        assert_eq!((rel.source, rel.target), (a, b));
        assert_eq!(store.relationship_type_name(rel.rel_type), Some("T"));
        let w = store.property_key_id("w").unwrap();
        let x = store.property_key_id("x").unwrap();
        assert_eq!(store.property_value(rel.first_property, w)?, Some(1.5));
        assert_eq!(store.property_value(rel.first_property, x)?, Some(-2.0));
        assert_eq!(store.property_key_id("y"), None);
        Ok(())
    }

    #[test]
    fn test_cursor_seek() -> Result<()> {
        let mut builder = MemoryStore::builder().records_per_page(3);
        for _ in 0..10 {
            builder.add_node(&[]);
        }
        let store = builder.build();
        let mut cursor = store.nodes().cursor();
        cursor.seek(7);
        let ids = cursor.map(|s| s.map(|s| s.id())).collect::<Result<Vec<_>, _>>()?;
        assert_eq!(ids, vec![7, 8, 9]);
        Ok(())
    }

    #[test]
    fn test_chains() -> Result<()> {
        let mut builder = MemoryStore::builder();
        let a = builder.add_node(&[]);
        let b = builder.add_node(&[]);
        let c = builder.add_node(&[]);
        let ab = builder.add_relationship(a, b, "T", &[])?;
        let ca = builder.add_relationship(c, a, "T", &[])?;
        let aa = builder.add_relationship(a, a, "T", &[])?;
        let bc = builder.add_relationship(b, c, "T", &[])?;

        let mut deleted = builder.clone();
        let store = builder.build();
        assert_eq!(chain(&store, a), vec![aa, ca, ab]);
        assert_eq!(chain(&store, b), vec![bc, ab]);
        assert_eq!(chain(&store, c), vec![bc, ca]);

        deleted.delete_relationship(ca)?;
        deleted.delete_relationship(aa)?;
        assert!(deleted.delete_node(c).is_err());
        deleted.delete_relationship(bc)?;
        deleted.delete_node(c)?;
        let store = deleted.build();
        assert_eq!(chain(&store, a), vec![ab]);
        assert_eq!(chain(&store, b), vec![ab]);
        assert_eq!(store.nodes().record(c)?, None);
        assert_eq!(store.relationships().record(ca)?, None);
        Ok(())
    }

    #[test]
    fn test_missing_nodes_are_rejected() {
        let mut builder = MemoryStore::builder();
        let a = builder.add_node(&[]);
        assert!(builder.add_relationship(a, 5, "T", &[]).is_err());
        assert!(builder.delete_relationship(0).is_err());
        // Nothing was linked
        assert_eq!(builder.build().nodes().record(a).unwrap().unwrap().first_relationship, NO_ID);
    }

    #[test]
    fn test_corruptions() -> Result<()> {
        let mut builder = MemoryStore::builder();
        let a = builder.add_node(&[]);
        let b = builder.add_node(&[]);
        let r = builder.add_relationship(a, b, "T", &[])?;
        let s = builder.add_relationship(b, a, "T", &[])?;
        builder.corrupt(Corruption::Marker(RecordKind::Relationship, r, 0x7f));
        builder.corrupt(Corruption::DanglingTarget(s));
        let store = builder.build();
        assert_eq!(
            store.relationships().record(r),
            Err(DecodeError::InvalidMarker {
                store: "relationship",
                id: r,
                marker: 0x7f
            })
        );
        assert!(matches!(
            store.relationships().record(s),
            Err(DecodeError::DanglingPointer { pointer: 2, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_complete_graph() -> Result<()> {
        let mut builder = MemoryStore::builder();
        let nodes = builder.complete_graph(10, 1.0, "N", "T", &mut SmallRng::seed_from_u64(0))?;
        assert_eq!(nodes.len(), 10);
        let store = builder.build();
        assert_eq!(store.relationships().high_id(), 45);
        let mut builder = MemoryStore::builder();
        builder.complete_graph(10, 0.0, "N", "T", &mut SmallRng::seed_from_u64(0))?;
        assert_eq!(builder.build().relationships().high_id(), 0);
        assert!(MemoryStore::builder()
            .complete_graph(3, 2.0, "N", "T", &mut SmallRng::seed_from_u64(0))
            .is_err());
        Ok(())
    }
}
