/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Import of graphs from a [`GraphStore`].
//!
//! An import is a pipeline of parallel scans:
//!
//! 1. the node store is scanned to build the [`IdMap`] of the nodes
//!    matching the label filter;
//! 2. the relationship store is scanned once, and each scan task stages the
//!    relationships of each projection in private buffers;
//! 3. the staged relationships are compressed in parallel, node partition by
//!    node partition, and merged in node order into a
//!    [`CompressedAdjacency`](crate::graphs::CompressedAdjacency) per
//!    direction.
//!
//! Any error aborts the whole import, and all buffers built so far are
//! released. [`GraphLoader`] drives the pipeline.
//!
//! # Examples
//!
//! ```
//! use heapgraph::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut builder = MemoryStore::builder();
//! let a = builder.add_node(&["Person"]);
//! let b = builder.add_node(&["Person"]);
//! builder.add_relationship(a, b, "KNOWS", &[("since", 2010.0)])?;
//! let store = builder.build();
//!
//! let (graph, stats) = GraphLoader::new(&store)
//!     .add_node_label("Person")
//!     .add_relationship_type("KNOWS")
//!     .global_projection(Projection::Undirected)
//!     .relationship_property("since", 0.0)
//!     .concurrency(2)
//!     .load_huge()?;
//! assert_eq!(graph.node_count(), 2);
//! assert_eq!(graph.degree(1, Direction::Outgoing)?, 1);
//! assert_eq!(stats.relationship_count("KNOWS"), Some(1));
//! # Ok(())
//! # }
//! ```

pub mod adjacency;
pub mod config;
pub mod nodes;
pub mod relationships;
pub mod scanner;

pub use config::{ImportConfig, Projection, PropertyMapping, RelationshipProjection};
pub use scanner::{ScanRange, StoreScanner};

use crate::graphs::{GraphFactory, HugeGraph, IdMap, StoreGraph};
use crate::parallel::{ExecutionContext, TerminationFlag};
use crate::store::GraphStore;
use crate::traits::Graph;
use crate::utils::{human_bytes, MemoryBudget, MemoryTracker};
use anyhow::{ensure, Result};
use config::ResolvedConfig;
use itertools::Itertools;
use dsi_progress_logger::{no_logging, ConcurrentProgressLog};
use rayon::ThreadPool;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Statistics about an import.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImportStats {
    pub node_count: u64,
    /// The number of store relationships loaded by each projection.
    pub relationship_counts: Vec<(String, u64)>,
    /// The bytes in use on the memory tracker at the end of the import.
    pub tracked_bytes: usize,
    pub elapsed: Duration,
}

impl ImportStats {
    /// Returns the number of relationships loaded by the projection with
    /// the given name.
    pub fn relationship_count(&self, name: &str) -> Option<u64> {
        self.relationship_counts
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, count)| count)
    }
}

impl core::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} nodes, {}, {} tracked, {:.3}s",
            self.node_count,
            self.relationship_counts
                .iter()
                .map(|(name, count)| format!("{count} {name} relationships"))
                .join(", "),
            human_bytes(self.tracked_bytes),
            self.elapsed.as_secs_f64()
        )
    }
}

/// A fluent builder loading graphs from a store.
///
/// By default all nodes and all relationships are loaded, in their natural
/// direction, without weights, into a [`HugeGraph`]. The first call to
/// [`add_relationship_type`](GraphLoader::add_relationship_type) replaces the
/// default projection of all relationships.
#[derive(Debug)]
pub struct GraphLoader<'s, S: ?Sized> {
    store: &'s S,
    config: ImportConfig,
    custom_relationships: bool,
    global_projection: Option<Projection>,
    global_property: Option<PropertyMapping>,
    factory: GraphFactory,
    termination: TerminationFlag,
    pool: Option<Arc<ThreadPool>>,
    tracker: Option<MemoryTracker>,
}

impl<'s, S: GraphStore + Sync + ?Sized> GraphLoader<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            config: ImportConfig::default(),
            custom_relationships: false,
            global_projection: None,
            global_property: None,
            factory: GraphFactory::default(),
            termination: TerminationFlag::new(),
            pool: None,
            tracker: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ImportConfig) -> Self {
        self.config = config;
        self.custom_relationships = true;
        self
    }

    /// Loads only the nodes with the given label.
    pub fn add_node_label(mut self, label: impl Into<String>) -> Self {
        self.config.node_label = Some(label.into());
        self
    }

    /// Adds a projection of the relationships of the given type.
    pub fn add_relationship_type(self, rel_type: impl Into<String>) -> Self {
        self.add_relationship_projection(RelationshipProjection::of_type(rel_type))
    }

    pub fn add_relationship_projection(mut self, projection: RelationshipProjection) -> Self {
        if !self.custom_relationships {
            self.config.relationships.clear();
            self.custom_relationships = true;
        }
        self.config.relationships.push(projection);
        self
    }

    /// Sets the projection of all relationship projections.
    pub fn global_projection(mut self, projection: Projection) -> Self {
        self.global_projection = Some(projection);
        self
    }

    /// Loads the given property as weight in all relationship projections
    /// that do not specify one.
    pub fn relationship_property(mut self, key: impl Into<String>, default_value: f64) -> Self {
        self.global_property = Some(PropertyMapping {
            key: key.into(),
            default_value,
        });
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Also builds incoming adjacencies of directed projections.
    pub fn load_inverse(mut self, load_inverse: bool) -> Self {
        self.config.load_inverse = load_inverse;
        self
    }

    /// Sets the memory budget; ignored if a [tracker](GraphLoader::tracker)
    /// is passed.
    pub fn memory(mut self, memory: MemoryBudget) -> Self {
        self.config.memory = memory;
        self
    }

    pub fn records_per_range(mut self, records_per_range: usize) -> Self {
        self.config.records_per_range = Some(records_per_range);
        self
    }

    /// Uses the given termination flag: terminating it aborts the import.
    pub fn termination(mut self, termination: TerminationFlag) -> Self {
        self.termination = termination;
        self
    }

    /// Runs the import on the given pool instead of a dedicated one.
    pub fn thread_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Accounts the memory of the import on the given tracker.
    pub fn tracker(mut self, tracker: MemoryTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Selects the graph representation built by [`load`](GraphLoader::load).
    pub fn graph(mut self, factory: GraphFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Returns the configuration with the global settings applied.
    pub fn effective_config(&self) -> ImportConfig {
        let mut config = self.config.clone();
        for rel in &mut config.relationships {
            if let Some(projection) = self.global_projection {
                rel.projection = projection;
            }
            if rel.property.is_none() {
                rel.property.clone_from(&self.global_property);
            }
        }
        config
    }

    fn prepare(&self) -> Result<(ResolvedConfig, ExecutionContext, MemoryTracker)> {
        let config = self.effective_config().resolve(self.store)?;
        let ctx = match &self.pool {
            Some(pool) => ExecutionContext::with_pool(pool.clone(), config.concurrency)?,
            None => ExecutionContext::new(config.concurrency)?,
        }
        .with_termination(self.termination.clone());
        let tracker = self
            .tracker
            .clone()
            .unwrap_or_else(|| MemoryTracker::new(config.memory));
        Ok((config, ctx, tracker))
    }

    fn import_nodes(
        &self,
        config: &ResolvedConfig,
        ctx: &ExecutionContext,
        tracker: &MemoryTracker,
        pl: &mut impl ConcurrentProgressLog,
    ) -> Result<Arc<IdMap>> {
        Ok(Arc::new(nodes::import_nodes(
            self.store,
            config.label,
            config.records_per_range,
            ctx,
            tracker,
            pl,
        )?))
    }

    /// Loads a [`HugeGraph`] for each relationship projection; the graphs
    /// share the same identifier map.
    pub fn load_all(&self) -> Result<(Vec<HugeGraph>, ImportStats)> {
        self.load_all_with_logging(no_logging![])
    }

    /// Like [`load_all`](GraphLoader::load_all), but logging progress on
    /// `pl`.
    pub fn load_all_with_logging(
        &self,
        pl: &mut impl ConcurrentProgressLog,
    ) -> Result<(Vec<HugeGraph>, ImportStats)> {
        let start = Instant::now();
        let (config, ctx, tracker) = self.prepare()?;
        log::info!(
            "Loading {} projections with {} threads (memory budget: {})",
            config.relationships.len(),
            ctx.concurrency(),
            config.memory
        );
        let id_map = self.import_nodes(&config, &ctx, &tracker, pl)?;
        let imported =
            relationships::import_relationships(self.store, &id_map, &config, &ctx, &tracker, pl)?;

        let mut relationship_counts = vec![];
        let mut graphs = vec![];
        for (rel, imported) in config.relationships.iter().zip(imported) {
            relationship_counts.push((rel.name.clone(), imported.relationship_count));
            graphs.push(HugeGraph::new(
                rel.name.clone(),
                id_map.clone(),
                imported.outgoing,
                imported.incoming,
                rel.projection == Projection::Undirected,
            ));
        }
        let stats = ImportStats {
            node_count: id_map.node_count(),
            relationship_counts,
            tracked_bytes: tracker.used(),
            elapsed: start.elapsed(),
        };
        log::info!("Loaded {stats}");
        Ok((graphs, stats))
    }

    /// Loads a [`HugeGraph`]; there must be exactly one relationship
    /// projection.
    pub fn load_huge(&self) -> Result<(HugeGraph, ImportStats)> {
        self.load_huge_with_logging(no_logging![])
    }

    pub fn load_huge_with_logging(
        &self,
        pl: &mut impl ConcurrentProgressLog,
    ) -> Result<(HugeGraph, ImportStats)> {
        self.ensure_single_projection()?;
        let (mut graphs, stats) = self.load_all_with_logging(pl)?;
        let graph = graphs.pop().ok_or_else(|| anyhow::anyhow!("No graph was loaded"))?;
        Ok((graph, stats))
    }

    /// Imports the nodes only, and returns a [`StoreGraph`] reading the
    /// relationships from the store; there must be exactly one relationship
    /// projection.
    ///
    /// Relationships are scanned once to count them and to check their
    /// endpoints.
    pub fn load_store_view(&self) -> Result<(StoreGraph<'s, S>, ImportStats)> {
        self.load_store_view_with_logging(no_logging![])
    }

    pub fn load_store_view_with_logging(
        &self,
        pl: &mut impl ConcurrentProgressLog,
    ) -> Result<(StoreGraph<'s, S>, ImportStats)> {
        let start = Instant::now();
        self.ensure_single_projection()?;
        let (config, ctx, tracker) = self.prepare()?;
        let id_map = self.import_nodes(&config, &ctx, &tracker, pl)?;
        let rel = config.relationships[0].clone();
        let filtered = config.label.is_some();
        let count = relationships::count_relationships(
            self.store, &id_map, &rel, filtered, &config, &ctx, pl,
        )?;
        let outgoing = if rel.projection == Projection::Undirected {
            2 * count
        } else {
            count
        };
        let stats = ImportStats {
            node_count: id_map.node_count(),
            relationship_counts: vec![(rel.name.clone(), count)],
            tracked_bytes: tracker.used(),
            elapsed: start.elapsed(),
        };
        log::info!("Loaded view over {stats}");
        Ok((
            StoreGraph::new(self.store, id_map, rel, filtered, outgoing),
            stats,
        ))
    }

    /// Loads the graph representation selected by
    /// [`graph`](GraphLoader::graph); there must be exactly one relationship
    /// projection.
    pub fn load(&self) -> Result<(Box<dyn Graph + 's>, ImportStats)> {
        self.load_with_logging(no_logging![])
    }

    pub fn load_with_logging(
        &self,
        pl: &mut impl ConcurrentProgressLog,
    ) -> Result<(Box<dyn Graph + 's>, ImportStats)> {
        let (graph, stats): (Box<dyn Graph + 's>, _) = match self.factory {
            GraphFactory::Compressed => {
                let (graph, stats) = self.load_huge_with_logging(pl)?;
                (Box::new(graph), stats)
            }
            GraphFactory::StoreView => {
                let (graph, stats) = self.load_store_view_with_logging(pl)?;
                (Box::new(graph), stats)
            }
        };
        Ok((graph, stats))
    }

    fn ensure_single_projection(&self) -> Result<()> {
        let count = self.config.relationships.len();
        ensure!(
            count == 1,
            "A single relationship projection is required, got {count}"
        );
        Ok(())
    }
}
