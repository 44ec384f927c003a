/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Graph representations.
//!
//! - [`HugeGraph`] holds the relationships in compressed adjacencies built
//!   by an import;
//! - [`StoreGraph`] reads the relationships from the store at each visit.
//!
//! Both implement [`Graph`](crate::traits::Graph), and a [`GraphFactory`]
//! passed to a [loader](crate::import::GraphLoader) selects which one is
//! built.

pub mod adjacency;
pub use adjacency::CompressedAdjacency;

pub mod id_map;
pub use id_map::{IdMap, IdMapBuilder};

mod huge_graph;
pub use huge_graph::HugeGraph;

mod store_graph;
pub use store_graph::StoreGraph;

/// The graph representation built by a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GraphFactory {
    /// A [`HugeGraph`]: relationships are scanned once and compressed.
    #[default]
    Compressed,
    /// A [`StoreGraph`]: only nodes are imported.
    StoreView,
}

impl core::str::FromStr for GraphFactory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compressed" | "huge" => Ok(GraphFactory::Compressed),
            "view" | "store" => Ok(GraphFactory::StoreView),
            _ => anyhow::bail!("Unknown graph representation {s:?}"),
        }
    }
}

pub mod prelude {
    pub use super::GraphFactory;
    pub use super::HugeGraph;
    pub use super::StoreGraph;
    pub use super::{IdMap, IdMapBuilder};
}
