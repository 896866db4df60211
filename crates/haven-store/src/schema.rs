//! Entity schema descriptors and column family naming.
//!
//! Each entity namespace maps to one column family holding the items keyed by
//! their primary key. Every declared index gets its own column family keyed by
//! `attribute value || 0x00 || item key`, which supports prefix scans for one
//! partition. A single shared column family holds unique claims.

use crate::query::SortOrder;

/// Column family names that do not belong to a single namespace.
pub mod cf {
    /// Unique claims, keyed by `namespace || 0x00 || claim`, value = holder key.
    pub const CLAIMS: &str = "claims";
}

/// A secondary access path over one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDef {
    /// Index name used by callers of `Store::query`.
    pub name: &'static str,
    /// Attribute whose value partitions the index.
    pub attribute: &'static str,
}

impl IndexDef {
    /// An index named after the attribute it covers.
    #[must_use]
    pub const fn on(attribute: &'static str) -> Self {
        Self {
            name: attribute,
            attribute,
        }
    }
}

/// Describes one entity namespace: where it lives, how it is keyed, searched,
/// sorted and indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    /// Namespace (column family) name.
    pub namespace: &'static str,
    /// Primary key attribute.
    pub key_attr: &'static str,
    /// Attributes matched by free-text search.
    pub searchable: &'static [&'static str],
    /// Sort field used when the caller supplies none.
    pub default_sort: &'static str,
    /// Sort order used when the caller supplies none.
    pub default_order: SortOrder,
    /// Declared secondary indexes.
    pub indexes: &'static [IndexDef],
}

impl EntitySchema {
    /// Look up a declared index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&'static IndexDef> {
        self.indexes.iter().find(|idx| idx.name == name)
    }

    /// Column family holding the entries of `index`.
    #[must_use]
    pub fn index_cf(&self, index: &IndexDef) -> String {
        format!("{}__by_{}", self.namespace, index.attribute)
    }

    /// Every column family this namespace needs.
    #[must_use]
    pub fn column_families(&self) -> Vec<String> {
        std::iter::once(self.namespace.to_string())
            .chain(self.indexes.iter().map(|idx| self.index_cf(idx)))
            .collect()
    }
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families(schemas: &[&EntitySchema]) -> Vec<String> {
    let mut names: Vec<String> = schemas
        .iter()
        .flat_map(|schema| schema.column_families())
        .collect();
    names.push(cf::CLAIMS.to_string());
    names.sort();
    names.dedup();
    names
}
