//! Filter, search, sort and paginate pipeline.
//!
//! A [`ListQuery`] describes where candidates come from (a full scan or one
//! index partition), which equality conditions the store evaluates, which
//! filters run in memory afterwards, an optional free-text search and the
//! page to return. [`execute`] runs the whole pipeline against a [`Store`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::item::{Item, Predicate};
use crate::schema::EntitySchema;
use crate::Store;

/// Page size used when the caller supplies none.
pub const DEFAULT_LIMIT: u32 = 10;
/// Largest page size a caller may request.
pub const MAX_LIMIT: u32 = 100;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    Desc,
}

/// Paging and sorting inputs as supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size.
    pub limit: Option<u32>,
    /// Attribute to sort by.
    pub sort_by: Option<String>,
    /// Sort direction.
    #[serde(alias = "order")]
    pub sort_order: Option<SortOrder>,
}

impl PageRequest {
    /// A request for one page of the given size.
    #[must_use]
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Sort by `attribute` in `order`.
    #[must_use]
    pub fn sorted_by(mut self, attribute: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(attribute.into());
        self.sort_order = Some(order);
        self
    }

    /// Page number, at least 1.
    #[must_use]
    pub fn page_number(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size, clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn limit_clamped(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// A filter evaluated in memory after the store returns candidates.
#[derive(Debug, Clone, PartialEq)]
pub enum PostFilter {
    /// Case-insensitive substring match on a string attribute.
    Contains {
        /// Attribute to inspect.
        attribute: String,
        /// Lower-cased needle.
        needle: String,
    },
    /// The array attribute contains the tag (case-insensitive).
    HasTag {
        /// Attribute to inspect.
        attribute: String,
        /// Lower-cased tag.
        tag: String,
    },
    /// Case-insensitive equality on a string attribute.
    EqIgnoreCase {
        /// Attribute to inspect.
        attribute: String,
        /// Lower-cased value.
        value: String,
    },
    /// Inclusive range over a string attribute holding ISO dates or
    /// timestamps. Open ends are unbounded.
    Range {
        /// Attribute to inspect.
        attribute: String,
        /// Lower bound.
        from: Option<String>,
        /// Upper bound.
        to: Option<String>,
    },
}

impl PostFilter {
    /// Case-insensitive substring filter.
    #[must_use]
    pub fn contains(attribute: impl Into<String>, needle: &str) -> Self {
        Self::Contains {
            attribute: attribute.into(),
            needle: needle.to_lowercase(),
        }
    }

    /// Array membership filter.
    #[must_use]
    pub fn has_tag(attribute: impl Into<String>, tag: &str) -> Self {
        Self::HasTag {
            attribute: attribute.into(),
            tag: tag.to_lowercase(),
        }
    }

    /// Case-insensitive equality filter.
    #[must_use]
    pub fn eq_ignore_case(attribute: impl Into<String>, value: &str) -> Self {
        Self::EqIgnoreCase {
            attribute: attribute.into(),
            value: value.to_lowercase(),
        }
    }

    /// Inclusive range filter.
    #[must_use]
    pub fn range(attribute: impl Into<String>, from: Option<String>, to: Option<String>) -> Self {
        Self::Range {
            attribute: attribute.into(),
            from,
            to,
        }
    }

    /// Evaluate the filter against an item.
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        match self {
            Self::Contains { attribute, needle } => item
                .get(attribute)
                .and_then(Value::as_str)
                .is_some_and(|s| s.to_lowercase().contains(needle.as_str())),
            Self::HasTag { attribute, tag } => item
                .get(attribute)
                .and_then(Value::as_array)
                .is_some_and(|tags| {
                    tags.iter()
                        .filter_map(Value::as_str)
                        .any(|t| t.to_lowercase() == *tag)
                }),
            Self::EqIgnoreCase { attribute, value } => item
                .get(attribute)
                .and_then(Value::as_str)
                .is_some_and(|s| s.to_lowercase() == *value),
            Self::Range {
                attribute,
                from,
                to,
            } => {
                let Some(actual) = item.get(attribute).and_then(Value::as_str) else {
                    return false;
                };
                from.as_deref().map_or(true, |from| actual >= from)
                    && to.as_deref().map_or(true, |to| actual <= to)
            }
        }
    }
}

/// Where a query takes its candidates from.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Source {
    /// Every item of the namespace.
    #[default]
    Scan,
    /// One partition of a declared index.
    Index {
        /// Index name.
        name: String,
        /// Partition value.
        partition: Value,
    },
}

/// A complete list request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Candidate source.
    pub source: Source,
    /// Conditions evaluated by the store.
    pub predicate: Predicate,
    /// Conditions evaluated in memory.
    pub filters: Vec<PostFilter>,
    /// Free-text search over the schema's searchable attributes.
    pub search: Option<String>,
    /// Paging and sorting.
    pub page: PageRequest,
}

impl ListQuery {
    /// A query over the whole namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take candidates from one index partition instead of a full scan.
    #[must_use]
    pub fn by_index(mut self, name: impl Into<String>, partition: impl Into<Value>) -> Self {
        self.source = Source::Index {
            name: name.into(),
            partition: partition.into(),
        };
        self
    }

    /// Add a store-side equality condition.
    #[must_use]
    pub fn eq(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicate = self.predicate.eq(attribute, value);
        self
    }

    /// Add a store-side equality condition when `value` is present.
    #[must_use]
    pub fn eq_opt<V: Into<Value>>(mut self, attribute: impl Into<String>, value: Option<V>) -> Self {
        self.predicate = self.predicate.eq_opt(attribute, value);
        self
    }

    /// Add an in-memory filter.
    #[must_use]
    pub fn filter(mut self, filter: PostFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add an in-memory filter when present.
    #[must_use]
    pub fn filter_opt(self, filter: Option<PostFilter>) -> Self {
        match filter {
            Some(filter) => self.filter(filter),
            None => self,
        }
    }

    /// Set the free-text search. Blank searches are ignored.
    #[must_use]
    pub fn search(mut self, search: Option<&str>) -> Self {
        self.search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        self
    }

    /// Set paging and sorting.
    #[must_use]
    pub fn page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Number of items matching the query across all pages.
    pub total: usize,
    /// 1-based page number.
    pub page: u32,
    /// Number of pages, 0 when nothing matched.
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// Convert every item, keeping the paging metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            total_pages: self.total_pages,
        }
    }

    /// Fallible [`Page::map`].
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn try_map<U, E>(
        self, f: impl FnMut(T) -> std::result::Result<U, E>,
    ) -> std::result::Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<std::result::Result<_, _>>()?,
            total: self.total,
            page: self.page,
            total_pages: self.total_pages,
        })
    }
}

/// Run a query against the store.
///
/// # Errors
///
/// Returns an error if the underlying scan or index query fails.
pub fn execute<S: Store + ?Sized>(
    store: &S,
    schema: &EntitySchema,
    query: &ListQuery,
) -> Result<Page<Item>> {
    let candidates = match &query.source {
        Source::Scan => store.scan(schema, &query.predicate)?,
        Source::Index { name, partition } => {
            store.query(schema, name, partition, &query.predicate)?
        }
    };
    Ok(apply(schema, candidates, query))
}

/// Filter, search, sort and paginate candidates already fetched from the
/// store.
#[must_use]
pub fn apply(schema: &EntitySchema, candidates: Vec<Item>, query: &ListQuery) -> Page<Item> {
    let mut items: Vec<Item> = candidates
        .into_iter()
        .filter(|item| query.filters.iter().all(|f| f.matches(item)))
        .filter(|item| {
            query
                .search
                .as_deref()
                .map_or(true, |needle| matches_search(schema.searchable, item, needle))
        })
        .collect();

    let sort_by = query.page.sort_by.as_deref().unwrap_or(schema.default_sort);
    let order = query.page.sort_order.unwrap_or(schema.default_order);
    sort_items(&mut items, sort_by, order);

    paginate(items, &query.page)
}

/// Whether any searchable attribute contains the lower-cased `needle`.
#[must_use]
pub fn matches_search(searchable: &[&str], item: &Item, needle: &str) -> bool {
    searchable.iter().any(|attr| match item.get(*attr) {
        Some(Value::String(s)) => s.to_lowercase().contains(needle),
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .any(|s| s.to_lowercase().contains(needle)),
        _ => false,
    })
}

/// Order two attribute values.
///
/// Only values of the same kind compare: numbers numerically, strings
/// lexicographically, booleans `false < true`. Anything else is `Equal`.
#[must_use]
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

/// Stable sort; equal items keep their input order in both directions.
fn sort_items(items: &mut [Item], attribute: &str, order: SortOrder) {
    items.sort_by(|a, b| {
        let ord = compare_values(a.get(attribute), b.get(attribute));
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

/// Cut one page out of an already ordered list.
#[must_use]
pub fn paginate<T>(items: Vec<T>, request: &PageRequest) -> Page<T> {
    let page = request.page_number();
    let limit = request.limit_clamped() as usize;
    let total = items.len();
    let skip = (page as usize - 1).saturating_mul(limit);

    Page {
        items: items.into_iter().skip(skip).take(limit).collect(),
        total,
        page,
        total_pages: total.div_ceil(limit),
    }
}
