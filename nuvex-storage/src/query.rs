//! Collection queries and cache partition keys.
//!
//! A [`CollectionQuery`] is the filter/order pair sent to the remote store.
//! Two logically equivalent queries compare and hash equal (filters are kept
//! sorted), so they land on the same cache partition.

use chrono::{DateTime, FixedOffset};
use nuvex_core::{EntityIdType, EntityKind, ProjectId};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Row filter. Only equality is needed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Filter {
    Eq { column: String, value: String },
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Self::Eq { column, .. } => column,
        }
    }

    fn matches(&self, row: &Value) -> bool {
        match self {
            Self::Eq { column, value } => match row.get(column) {
                Some(Value::String(s)) => s == value,
                Some(Value::Null) | None => false,
                Some(other) => other.to_string() == *value,
            },
        }
    }
}

/// Sort order on a single column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Filter and order applied to one remote collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CollectionQuery {
    filters: Vec<Filter>,
    order: Option<Order>,
}

impl CollectionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality filter.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::Eq {
            column: column.into(),
            value: value.into(),
        });
        self.filters.sort();
        self.filters.dedup();
        self
    }

    /// Set the sort order, replacing any previous one.
    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    /// Query-string pairs in PostgREST syntax, e.g. `("project_id", "eq.p1")`.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|filter| match filter {
                Filter::Eq { column, value } => (column.clone(), format!("eq.{value}")),
            })
            .collect();
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            pairs.push(("order".to_string(), format!("{}.{direction}", order.column)));
        }
        pairs
    }

    /// Evaluate the query over in-memory rows.
    ///
    /// Rows are compared through their JSON form. RFC 3339 strings are
    /// compared as instants; nulls sort after every value in ascending order.
    pub fn apply<T: Serialize>(&self, rows: Vec<T>) -> Vec<T> {
        let mut keyed: Vec<(Value, T)> = rows
            .into_iter()
            .map(|row| (serde_json::to_value(&row).unwrap_or(Value::Null), row))
            .filter(|(value, _)| self.filters.iter().all(|f| f.matches(value)))
            .collect();
        if let Some(order) = &self.order {
            keyed.sort_by(|(a, _), (b, _)| {
                let ordering = compare_column(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        keyed.into_iter().map(|(_, row)| row).collect()
    }
}

impl fmt::Display for CollectionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs = self.to_query_pairs();
        if pairs.is_empty() {
            return f.write_str("*");
        }
        for (i, (key, value)) in pairs.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

fn compare_column(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (parse_instant(a), parse_instant(b)) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let a = a.as_f64().unwrap_or(0.0);
            let b = b.as_f64().unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}

fn parse_instant(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).ok()
}

/// Identity of one cache partition: an entity kind plus the query that
/// populates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    kind: EntityKind,
    query: CollectionQuery,
}

impl PartitionKey {
    pub fn new(kind: EntityKind, query: CollectionQuery) -> Self {
        Self { kind, query }
    }

    /// Every project, newest first.
    pub fn all_projects() -> Self {
        Self::new(
            EntityKind::Project,
            CollectionQuery::new().order_by("created_at", false),
        )
    }

    /// Every review, newest first.
    pub fn all_reviews() -> Self {
        Self::new(
            EntityKind::Review,
            CollectionQuery::new().order_by("created_at", false),
        )
    }

    /// Reviews of one project, newest first.
    pub fn reviews_for_project(project_id: &ProjectId) -> Self {
        Self::new(
            EntityKind::Review,
            CollectionQuery::new()
                .eq("project_id", project_id.as_str())
                .order_by("created_at", false),
        )
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn query(&self) -> &CollectionQuery {
        &self.query
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?{}", self.kind, self.query)
    }
}
