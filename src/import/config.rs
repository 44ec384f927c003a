/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Import configuration and its validation against a store.
//!
//! An [`ImportConfig`] refers to labels, relationship types, and property
//! keys by name; [`ImportConfig::resolve`] translates the names into store
//! tokens, rejecting invalid configurations before any scan starts.

use crate::store::GraphStore;
use crate::utils::MemoryBudget;
use anyhow::{bail, ensure, Context, Result};

/// How the relationships of a projection are materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Projection {
    /// Relationships keep the direction they have in the store.
    #[default]
    Natural,
    /// Relationships are loaded with source and target swapped.
    Reversed,
    /// Each relationship is loaded in both directions.
    Undirected,
}

impl Projection {
    pub fn is_directed(&self) -> bool {
        *self != Projection::Undirected
    }
}

impl core::str::FromStr for Projection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "natural" => Ok(Projection::Natural),
            "reverse" | "reversed" => Ok(Projection::Reversed),
            "undirected" => Ok(Projection::Undirected),
            _ => bail!("Unknown projection {s:?} (expected natural, reversed, or undirected)"),
        }
    }
}

impl core::fmt::Display for Projection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Projection::Natural => "natural",
            Projection::Reversed => "reversed",
            Projection::Undirected => "undirected",
        })
    }
}

/// A relationship property loaded as weight, with the value used when a
/// relationship does not carry it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyMapping {
    pub key: String,
    pub default_value: f64,
}

/// The relationships of one type (or of all types) to load, with their
/// projection and optional weight property.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelationshipProjection {
    /// The relationship type; `None` selects all types.
    pub rel_type: Option<String>,
    pub projection: Projection,
    pub property: Option<PropertyMapping>,
}

impl RelationshipProjection {
    /// All relationships, in their natural direction, without weights.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of_type(rel_type: impl Into<String>) -> Self {
        Self {
            rel_type: Some(rel_type.into()),
            ..Self::default()
        }
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, default_value: f64) -> Self {
        self.property = Some(PropertyMapping {
            key: key.into(),
            default_value,
        });
        self
    }

    /// Returns the name used in statistics: the type, or `*` for all types.
    pub fn name(&self) -> &str {
        self.rel_type.as_deref().unwrap_or("*")
    }
}

/// Import options.
///
/// The default configuration loads all nodes and all relationships in
/// their natural direction using the number of threads of the current
/// rayon pool.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImportConfig {
    /// The number of workers scanning the store and building adjacencies.
    pub concurrency: usize,
    /// Only nodes with this label are loaded.
    pub node_label: Option<String>,
    /// The relationship projections to load, one graph each.
    pub relationships: Vec<RelationshipProjection>,
    /// Whether directed projections also load incoming relationships.
    pub load_inverse: bool,
    pub memory: MemoryBudget,
    /// Overrides the number of records decoded by a scan task.
    pub records_per_range: Option<usize>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            concurrency: rayon::current_num_threads(),
            node_label: None,
            relationships: vec![RelationshipProjection::all()],
            load_inverse: false,
            memory: MemoryBudget::default(),
            records_per_range: None,
        }
    }
}

impl ImportConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_node_label(mut self, label: impl Into<String>) -> Self {
        self.node_label = Some(label.into());
        self
    }

    pub fn with_relationships(mut self, relationships: Vec<RelationshipProjection>) -> Self {
        self.relationships = relationships;
        self
    }

    pub fn with_load_inverse(mut self, load_inverse: bool) -> Self {
        self.load_inverse = load_inverse;
        self
    }

    pub fn with_memory(mut self, memory: MemoryBudget) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_records_per_range(mut self, records_per_range: usize) -> Self {
        self.records_per_range = Some(records_per_range);
        self
    }

    /// Validates the configuration against a store, translating names into
    /// tokens.
    pub fn resolve(&self, store: &(impl GraphStore + ?Sized)) -> Result<ResolvedConfig> {
        ensure!(
            self.concurrency > 0,
            "The concurrency must be positive, got {}",
            self.concurrency
        );
        ensure!(
            !self.relationships.is_empty(),
            "At least one relationship projection is required"
        );
        if let Some(records) = self.records_per_range {
            ensure!(records > 0, "The number of records per range must be positive");
        }

        let label = self
            .node_label
            .as_deref()
            .map(|name| {
                store
                    .label_id(name)
                    .with_context(|| format!("Unknown node label {name:?}"))
            })
            .transpose()?;

        let relationships = self
            .relationships
            .iter()
            .map(|rel| {
                let rel_type = rel
                    .rel_type
                    .as_deref()
                    .map(|name| {
                        store
                            .relationship_type_id(name)
                            .with_context(|| format!("Unknown relationship type {name:?}"))
                    })
                    .transpose()?;
                let property = rel
                    .property
                    .as_ref()
                    .map(|mapping| -> Result<_> {
                        let key = store.property_key_id(&mapping.key).with_context(|| {
                            format!("Unknown relationship property {:?}", mapping.key)
                        })?;
                        ensure!(
                            !mapping.default_value.is_nan(),
                            "The default value of property {:?} is NaN",
                            mapping.key
                        );
                        Ok((key, mapping.default_value))
                    })
                    .transpose()?;
                Ok(ResolvedProjection {
                    name: rel.name().to_owned(),
                    rel_type,
                    projection: rel.projection,
                    property,
                    inverse: self.load_inverse && rel.projection.is_directed(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ResolvedConfig {
            concurrency: self.concurrency,
            label,
            relationships,
            memory: self.memory,
            records_per_range: self.records_per_range,
        })
    }
}

/// A relationship projection whose names have been resolved to tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProjection {
    pub name: String,
    pub rel_type: Option<u32>,
    pub projection: Projection,
    /// Property key token and default value.
    pub property: Option<(u32, f64)>,
    /// Whether the incoming adjacency is built as well.
    pub inverse: bool,
}

impl ResolvedProjection {
    pub fn is_weighted(&self) -> bool {
        self.property.is_some()
    }

    pub fn matches(&self, rel_type: u32) -> bool {
        self.rel_type.map_or(true, |t| t == rel_type)
    }
}

/// An [`ImportConfig`] validated against a store.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub concurrency: usize,
    pub label: Option<u32>,
    pub relationships: Vec<ResolvedProjection>,
    pub memory: MemoryBudget,
    pub records_per_range: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> Result<MemoryStore> {
        let mut builder = MemoryStore::builder();
        let a = builder.add_node(&["Person"]);
        let b = builder.add_node(&["Person", "City"]);
        builder.add_relationship(a, b, "LIVES_IN", &[("since", 2001.0)])?;
        Ok(builder.build())
    }

    #[test]
    fn test_resolve() -> Result<()> {
        let store = store()?;
        let config = ImportConfig::default()
            .with_concurrency(2)
            .with_node_label("City")
            .with_load_inverse(true)
            .with_relationships(vec![
                RelationshipProjection::of_type("LIVES_IN").with_property("since", 1.0),
                RelationshipProjection::all().with_projection(Projection::Undirected),
            ]);
        let resolved = config.resolve(&store)?;
        assert_eq!(resolved.label, store.label_id("City"));
        assert_eq!(resolved.relationships.len(), 2);
        let lives_in = &resolved.relationships[0];
        assert_eq!(lives_in.name, "LIVES_IN");
        assert_eq!(lives_in.rel_type, store.relationship_type_id("LIVES_IN"));
        assert_eq!(lives_in.property, Some((0, 1.0)));
        assert!(lives_in.inverse);
        let all = &resolved.relationships[1];
        assert_eq!(all.name, "*");
        assert!(all.matches(17));
        // Undirected projections have no inverse
        assert!(!all.inverse);
        Ok(())
    }

    #[test]
    fn test_invalid_configurations() -> Result<()> {
        let store = store()?;
        let base = ImportConfig::default().with_concurrency(1);
        assert!(base.clone().with_concurrency(0).resolve(&store).is_err());
        assert!(base.clone().with_relationships(vec![]).resolve(&store).is_err());
        assert!(base.clone().with_records_per_range(0).resolve(&store).is_err());
        let err = base
            .clone()
            .with_node_label("Planet")
            .resolve(&store)
            .unwrap_err();
        assert!(err.to_string().contains("Planet"));
        let err = base
            .clone()
            .with_relationships(vec![RelationshipProjection::of_type("ORBITS")])
            .resolve(&store)
            .unwrap_err();
        assert!(err.to_string().contains("ORBITS"));
        let err = base
            .clone()
            .with_relationships(vec![RelationshipProjection::all().with_property("weight", 0.0)])
            .resolve(&store)
            .unwrap_err();
        assert!(err.to_string().contains("weight"));
        Ok(())
    }

    #[test]
    fn test_projection_names() -> Result<()> {
        assert_eq!("natural".parse::<Projection>()?, Projection::Natural);
        assert_eq!("REVERSE".parse::<Projection>()?, Projection::Reversed);
        assert_eq!("undirected".parse::<Projection>()?, Projection::Undirected);
        assert!("sideways".parse::<Projection>().is_err());
        assert_eq!(Projection::Reversed.to_string(), "reversed");
        Ok(())
    }
}
