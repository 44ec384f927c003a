/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::adjacency::{AdjacencyBuilder, StagingBuffer};
use super::config::{Projection, ResolvedConfig, ResolvedProjection};
use super::scanner::StoreScanner;
use crate::graphs::adjacency::CompressedAdjacency;
use crate::graphs::IdMap;
use crate::parallel::ExecutionContext;
use crate::store::{DecodeError, GraphStore, RecordStore, RelationshipRecord};
use crate::utils::{human_bytes, MemoryTracker, Reservation};
use anyhow::{Context, Result};
use dsi_progress_logger::ConcurrentProgressLog;
use std::sync::atomic::{AtomicU64, Ordering};

/// The adjacencies built for a relationship projection.
#[derive(Debug)]
pub struct ImportedRelationships {
    pub outgoing: CompressedAdjacency,
    /// Present only for directed projections loaded with their inverse.
    pub incoming: Option<CompressedAdjacency>,
    /// The number of store relationships that contributed to the
    /// projection.
    pub relationship_count: u64,
}

/// The builders of a projection: outgoing, and optionally incoming.
struct Builders {
    outgoing: AdjacencyBuilder,
    incoming: Option<AdjacencyBuilder>,
}

/// The staging buffers filled by a scan task for a projection.
struct RangeBuffers {
    outgoing: StagingBuffer,
    incoming: Option<StagingBuffer>,
}

impl RangeBuffers {
    fn heap_size(&self) -> usize {
        self.outgoing.heap_size() + self.incoming.as_ref().map_or(0, StagingBuffer::heap_size)
    }
}

/// Staging buffers of a projection collected in range order, together
/// with the memory reserved for them.
#[derive(Default)]
struct Collected {
    outgoing: Vec<StagingBuffer>,
    incoming: Vec<StagingBuffer>,
    reservations: Vec<Reservation>,
}

/// Writes the relationship `source → target` into the buffers of a
/// projection.
#[inline(always)]
fn route(projection: Projection, buffers: &mut RangeBuffers, source: u64, target: u64, weight: f64) {
    let (source, target) = match projection {
        Projection::Reversed => (target, source),
        Projection::Natural | Projection::Undirected => (source, target),
    };
    buffers.outgoing.push(source, target, weight);
    match projection {
        Projection::Undirected => buffers.outgoing.push(target, source, weight),
        _ => {
            if let Some(incoming) = &mut buffers.incoming {
                incoming.push(target, source, weight);
            }
        }
    }
}

/// Translates the endpoints of a relationship to dense identifiers.
///
/// Returns `None` if an endpoint is not mapped and `filtered` is true, and
/// a [`DecodeError::MissingEndpoint`] if it is not mapped and `filtered` is
/// false.
fn dense_endpoints(
    id_map: &IdMap,
    id: u64,
    record: &RelationshipRecord,
    filtered: bool,
) -> Result<Option<(u64, u64)>, DecodeError> {
    match (id_map.to_dense(record.source), id_map.to_dense(record.target)) {
        (Some(source), Some(target)) => Ok(Some((source, target))),
        _ if filtered => Ok(None),
        (None, _) => Err(DecodeError::MissingEndpoint {
            relationship: id,
            node: record.source,
        }),
        (_, None) => Err(DecodeError::MissingEndpoint {
            relationship: id,
            node: record.target,
        }),
    }
}

/// Returns the weight of a relationship in a projection: the value of the
/// property, or its default value if the property is missing or NaN.
fn weight_of<S: GraphStore + ?Sized>(
    store: &S,
    rel: &ResolvedProjection,
    record: &RelationshipRecord,
) -> Result<f64, DecodeError> {
    Ok(match rel.property {
        None => 1.0,
        Some((key, default_value)) => match store.property_value(record.first_property, key)? {
            Some(value) if !value.is_nan() => value,
            _ => default_value,
        },
    })
}

/// Scans the relationship store once and builds the adjacencies of every
/// projection of the configuration.
///
/// Relationships with an endpoint outside `id_map` are skipped when a node
/// label filter is active, and are a [`DecodeError`] otherwise.
pub fn import_relationships<S: GraphStore + Sync + ?Sized>(
    store: &S,
    id_map: &IdMap,
    config: &ResolvedConfig,
    ctx: &ExecutionContext,
    tracker: &MemoryTracker,
    pl: &mut impl ConcurrentProgressLog,
) -> Result<Vec<ImportedRelationships>> {
    let node_count = id_map.node_count() as usize;
    let projections = &config.relationships;
    let builders = projections
        .iter()
        .map(|rel| Builders {
            outgoing: AdjacencyBuilder::new(node_count, ctx.concurrency(), rel.is_weighted()),
            incoming: rel
                .inverse
                .then(|| AdjacencyBuilder::new(node_count, ctx.concurrency(), rel.is_weighted())),
        })
        .collect::<Vec<_>>();
    let counters = projections
        .iter()
        .map(|_| AtomicU64::new(0))
        .collect::<Vec<_>>();

    let relationships = store.relationships();
    let scanner = StoreScanner::new(relationships, config.records_per_range);
    let filtered = config.label.is_some();

    let mut collected = projections
        .iter()
        .map(|_| Collected::default())
        .collect::<Vec<_>>();

    pl.item_name("record");
    pl.start(format!(
        "Scanning {} relationship records for {} projections...",
        relationships.high_id(),
        projections.len()
    ));
    scanner.scan(
        ctx,
        |range, reader| {
            let mut buffers = builders
                .iter()
                .map(|b| RangeBuffers {
                    outgoing: b.outgoing.staging_buffer(),
                    incoming: b.incoming.as_ref().map(AdjacencyBuilder::staging_buffer),
                })
                .collect::<Vec<_>>();
            let mut counts = vec![0_u64; projections.len()];
            for item in reader {
                let (id, record) = item?;
                if !projections.iter().any(|rel| rel.matches(record.rel_type)) {
                    continue;
                }
                let Some((source, target)) = dense_endpoints(id_map, id, &record, filtered)? else {
                    continue;
                };
                for (i, rel) in projections.iter().enumerate() {
                    if rel.matches(record.rel_type) {
                        let weight = weight_of(store, rel, &record)?;
                        route(rel.projection, &mut buffers[i], source, target, weight);
                        counts[i] += 1;
                    }
                }
            }
            for (counter, count) in counters.iter().zip(&counts) {
                counter.fetch_add(*count, Ordering::Relaxed);
            }
            log::trace!("Range {} staged {:?} relationships", range.id, counts);
            Ok(buffers)
        },
        |range, buffers| {
            for (collected, buffers) in collected.iter_mut().zip(buffers) {
                let bytes = buffers.heap_size();
                let reservation = tracker.reserve(bytes).with_context(|| {
                    format!("Could not stage the relationships of range {}", range.id)
                })?;
                collected.reservations.push(reservation);
                collected.outgoing.push(buffers.outgoing);
                collected.incoming.extend(buffers.incoming);
            }
            Ok(())
        },
        pl,
    )?;
    pl.done();

    let mut imported = Vec::with_capacity(projections.len());
    for (((rel, builders), collected), counter) in projections
        .iter()
        .zip(&builders)
        .zip(collected)
        .zip(&counters)
    {
        let staged = collected
            .reservations
            .iter()
            .map(Reservation::bytes)
            .sum::<usize>();
        log::debug!(
            "Projection {} staged {}",
            rel.name,
            human_bytes(staged)
        );
        let outgoing = builders
            .outgoing
            .build(&collected.outgoing, ctx, tracker, pl)
            .with_context(|| format!("Could not build the adjacency of {}", rel.name))?;
        let incoming = builders
            .incoming
            .as_ref()
            .map(|builder| {
                builder
                    .build(&collected.incoming, ctx, tracker, pl)
                    .with_context(|| format!("Could not build the inverse adjacency of {}", rel.name))
            })
            .transpose()?;
        // Releases the staging buffers and their reservations
        drop(collected);
        let relationship_count = counter.load(Ordering::Relaxed);
        log::info!(
            "Imported {} {} relationships ({} projection)",
            relationship_count,
            rel.name,
            rel.projection
        );
        imported.push(ImportedRelationships {
            outgoing,
            incoming,
            relationship_count,
        });
    }
    Ok(imported)
}

/// Scans the relationship store and counts the relationships of a
/// projection, applying the same rules as [`import_relationships`], without
/// building any adjacency.
pub fn count_relationships<S: GraphStore + Sync + ?Sized>(
    store: &S,
    id_map: &IdMap,
    rel: &ResolvedProjection,
    filtered: bool,
    config: &ResolvedConfig,
    ctx: &ExecutionContext,
    pl: &mut impl ConcurrentProgressLog,
) -> Result<u64> {
    let relationships = store.relationships();
    let scanner = StoreScanner::new(relationships, config.records_per_range);
    let counter = AtomicU64::new(0);
    pl.item_name("record");
    pl.start(format!(
        "Counting {} relationships in {} records...",
        rel.name,
        relationships.high_id()
    ));
    scanner.scan(
        ctx,
        |_, reader| {
            let mut count = 0;
            for item in reader {
                let (id, record) = item?;
                if !rel.matches(record.rel_type) {
                    continue;
                }
                if dense_endpoints(id_map, id, &record, filtered)?.is_some() {
                    count += 1;
                }
            }
            counter.fetch_add(count, Ordering::Relaxed);
            Ok(())
        },
        |_, ()| Ok(()),
        pl,
    )?;
    pl.done();
    Ok(counter.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::config::{ImportConfig, RelationshipProjection};
    use crate::import::nodes::import_nodes;
    use crate::store::{Corruption, MemoryStore, RecordKind};
    use dsi_progress_logger::no_logging;

    fn load(
        store: &MemoryStore,
        config: ImportConfig,
    ) -> Result<(IdMap, Vec<ImportedRelationships>)> {
        let config = config.resolve(store)?;
        let ctx = ExecutionContext::new(config.concurrency)?;
        let tracker = MemoryTracker::unbounded();
        let id_map = import_nodes(
            store,
            config.label,
            config.records_per_range,
            &ctx,
            &tracker,
            no_logging![],
        )?;
        let imported = import_relationships(store, &id_map, &config, &ctx, &tracker, no_logging![])?;
        Ok((id_map, imported))
    }

    fn targets(adjacency: &CompressedAdjacency, node: usize) -> Vec<u64> {
        adjacency.targets(node).collect()
    }

    /// A triangle plus a self-loop: 0 → 1, 1 → 2, 0 → 2, 2 → 2.
    fn triangle() -> Result<MemoryStore> {
        let mut builder = MemoryStore::builder().records_per_page(2);
        let n = (0..3).map(|_| builder.add_node(&["N"])).collect::<Vec<_>>();
        builder.add_relationship(n[0], n[1], "R", &[("w", 0.5)])?;
        builder.add_relationship(n[1], n[2], "R", &[])?;
        builder.add_relationship(n[0], n[2], "S", &[("w", f64::NAN)])?;
        builder.add_relationship(n[2], n[2], "R", &[("w", 4.0)])?;
        Ok(builder.build())
    }

    #[test]
    fn test_projections() -> Result<()> {
        let store = triangle()?;
        let config = ImportConfig::default()
            .with_concurrency(2)
            .with_records_per_range(1)
            .with_load_inverse(true)
            .with_relationships(vec![
                RelationshipProjection::all(),
                RelationshipProjection::of_type("R").with_projection(Projection::Reversed),
                RelationshipProjection::all().with_projection(Projection::Undirected),
            ]);
        let (_, imported) = load(&store, config)?;

        let natural = &imported[0];
        assert_eq!(natural.relationship_count, 4);
        assert_eq!(targets(&natural.outgoing, 0), vec![1, 2]);
        assert_eq!(targets(&natural.outgoing, 2), vec![2]);
        let incoming = natural.incoming.as_ref().unwrap();
        assert_eq!(targets(incoming, 2), vec![0, 1, 2]);
        assert_eq!(incoming.degree(0), 0);

        let reversed = &imported[1];
        assert_eq!(reversed.relationship_count, 3);
        assert_eq!(targets(&reversed.outgoing, 1), vec![0]);
        assert_eq!(targets(&reversed.outgoing, 2), vec![1, 2]);
        assert_eq!(targets(reversed.incoming.as_ref().unwrap(), 0), vec![1]);

        let undirected = &imported[2];
        assert_eq!(undirected.relationship_count, 4);
        assert!(undirected.incoming.is_none());
        assert_eq!(targets(&undirected.outgoing, 0), vec![1, 2]);
        assert_eq!(targets(&undirected.outgoing, 1), vec![0, 2]);
        // The self-loop is written twice
        assert_eq!(targets(&undirected.outgoing, 2), vec![0, 1, 2, 2]);
        assert_eq!(undirected.outgoing.relationship_count(), 8);
        Ok(())
    }

    #[test]
    fn test_weights_and_defaults() -> Result<()> {
        let store = triangle()?;
        let config = ImportConfig::default()
            .with_concurrency(1)
            .with_relationships(vec![RelationshipProjection::all().with_property("w", -1.0)]);
        let (_, imported) = load(&store, config)?;
        let outgoing = &imported[0].outgoing;
        let weights = |node| outgoing.weights(node).unwrap().collect::<Vec<_>>();
        // NaN values are replaced by the default
        assert_eq!(weights(0), vec![0.5, -1.0]);
        assert_eq!(weights(1), vec![-1.0]);
        assert_eq!(weights(2), vec![4.0]);
        Ok(())
    }

    #[test]
    fn test_label_filter_drops_relationships() -> Result<()> {
        let mut builder = MemoryStore::builder();
        let a = builder.add_node(&["Keep"]);
        let b = builder.add_node(&["Drop"]);
        let c = builder.add_node(&["Keep"]);
        builder.add_relationship(a, c, "R", &[])?;
        builder.add_relationship(a, b, "R", &[])?;
        builder.add_relationship(b, c, "R", &[])?;
        let store = builder.build();
        let config = ImportConfig::default()
            .with_concurrency(2)
            .with_node_label("Keep");
        let (id_map, imported) = load(&store, config)?;
        assert_eq!(id_map.node_count(), 2);
        assert_eq!(imported[0].relationship_count, 1);
        assert_eq!(targets(&imported[0].outgoing, 0), vec![1]);
        Ok(())
    }

    #[test]
    fn test_inconsistent_relationships_are_errors() -> Result<()> {
        let mut builder = MemoryStore::builder();
        let a = builder.add_node(&[]);
        let b = builder.add_node(&[]);
        let r = builder.add_relationship(a, b, "R", &[])?;
        // The slot of the target is marked as unused
        let mut unused_target = builder.clone();
        unused_target.corrupt(Corruption::Marker(RecordKind::Node, b, 0));
        let err = load(&unused_target.build(), ImportConfig::default().with_concurrency(1))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<DecodeError>(),
            Some(&DecodeError::MissingEndpoint {
                relationship: r,
                node: b
            })
        );

        builder.corrupt(Corruption::DanglingTarget(r));
        let err = load(&builder.build(), ImportConfig::default().with_concurrency(1)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DecodeError>(),
            Some(DecodeError::DanglingPointer { .. })
        ));
        Ok(())
    }
}
