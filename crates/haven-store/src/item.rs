//! Items and attribute predicates.
//!
//! An item is a flat map from attribute names to JSON values. The reserved
//! attributes `createdAt`, `updatedAt` and `isActive` are present on every
//! stored item.

use serde_json::{Map, Value};

use crate::error::{Result, StoreError};
use crate::schema::EntitySchema;

/// A stored item.
pub type Item = Map<String, Value>;

/// Creation timestamp attribute.
pub const CREATED_AT: &str = "createdAt";
/// Last modification timestamp attribute.
pub const UPDATED_AT: &str = "updatedAt";
/// Soft-delete flag attribute.
pub const IS_ACTIVE: &str = "isActive";

/// Read the primary key of `item` according to `schema`.
///
/// # Errors
///
/// Returns `StoreError::MissingKey` if the key attribute is absent, empty or
/// not a string.
pub fn key_of<'a>(schema: &EntitySchema, item: &'a Item) -> Result<&'a str> {
    match item.get(schema.key_attr) {
        Some(Value::String(key)) if !key.is_empty() => Ok(key),
        _ => Err(StoreError::MissingKey {
            namespace: schema.namespace,
            attribute: schema.key_attr,
        }),
    }
}

/// Fill in the reserved attributes a new item must carry.
pub(crate) fn stamp_new(item: &mut Item, now: &str) {
    item.entry(CREATED_AT)
        .or_insert_with(|| Value::String(now.to_string()));
    item.entry(UPDATED_AT)
        .or_insert_with(|| Value::String(now.to_string()));
    item.entry(IS_ACTIVE).or_insert(Value::Bool(true));
}

/// Merge `partial` into `existing`, never touching the key attribute, and set
/// a fresh `updatedAt`.
pub(crate) fn merge(schema: &EntitySchema, existing: &Item, partial: Item, now: &str) -> Item {
    let mut merged = existing.clone();
    for (name, value) in partial {
        if name == schema.key_attr {
            continue;
        }
        merged.insert(name, value);
    }
    merged.insert(UPDATED_AT.to_string(), Value::String(now.to_string()));
    merged
}

/// A single attribute condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The attribute equals the value.
    Eq(String, Value),
    /// The attribute equals one of the values.
    OneOf(String, Vec<Value>),
}

impl Condition {
    /// Attribute the condition reads.
    #[must_use]
    pub fn attribute(&self) -> &str {
        match self {
            Self::Eq(name, _) | Self::OneOf(name, _) => name,
        }
    }

    fn matches(&self, item: &Item) -> bool {
        match self {
            Self::Eq(name, expected) => item.get(name) == Some(expected),
            Self::OneOf(name, allowed) => item
                .get(name)
                .is_some_and(|actual| allowed.iter().any(|v| v == actual)),
        }
    }
}

/// An AND-combination of attribute conditions, evaluated by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

impl Predicate {
    /// The predicate that matches everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition.
    #[must_use]
    pub fn eq(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(attribute.into(), value.into()));
        self
    }

    /// Add an equality condition when `value` is present.
    #[must_use]
    pub fn eq_opt<V: Into<Value>>(self, attribute: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.eq(attribute, value),
            None => self,
        }
    }

    /// Add a membership condition.
    #[must_use]
    pub fn one_of<V: Into<Value>>(
        mut self,
        attribute: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.conditions.push(Condition::OneOf(
            attribute.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// The conditions in insertion order.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Whether the predicate has no conditions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate the predicate against an item.
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        self.conditions.iter().all(|c| c.matches(item))
    }
}

/// A unique claim guarding a conditional write.
///
/// The write succeeds when nobody holds `claim`, when the write's own item
/// holds it, or when the holder no longer satisfies `live_when` (cancelled,
/// moved elsewhere, deleted).
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueGuard {
    /// Claim name, unique within the namespace.
    pub claim: String,
    /// Condition under which a holder still owns the claim.
    pub live_when: Predicate,
}

impl UniqueGuard {
    /// Create a guard.
    #[must_use]
    pub fn new(claim: impl Into<String>, live_when: Predicate) -> Self {
        Self {
            claim: claim.into(),
            live_when,
        }
    }
}
