use super::Lookup;
use crate::schema::ModelId;

use indexmap::{IndexMap, IndexSet};

/// A backend-independent realization of one query snapshot.
///
/// Lookups are grouped by the field's *storage* name; groups and the lookups
/// within them preserve the order in which the application added them. A
/// driver turns the plan into whatever its backend executes.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub model: ModelId,

    /// Positive filter terms, by storage name.
    pub filters: IndexMap<String, Vec<Lookup>>,

    /// Negative filter terms, by storage name. A row matching every exclude
    /// group is dropped.
    pub excludes: IndexMap<String, Vec<Lookup>>,

    /// Plans whose result sets are merged into this one.
    pub unions: Vec<QueryPlan>,

    /// Plans whose result sets this one is restricted to.
    pub intersections: Vec<QueryPlan>,

    /// Raw backend expressions, passed through untouched.
    pub where_raw: Vec<String>,

    /// Relation paths marked for eager resolution.
    pub load_related: Vec<String>,
}

impl QueryPlan {
    pub fn new(model: ModelId) -> QueryPlan {
        QueryPlan {
            model,
            filters: IndexMap::new(),
            excludes: IndexMap::new(),
            unions: vec![],
            intersections: vec![],
            where_raw: vec![],
            load_related: vec![],
        }
    }

    pub fn push_filter(&mut self, storage_name: impl Into<String>, lookups: Vec<Lookup>) {
        self.filters
            .entry(storage_name.into())
            .or_default()
            .extend(lookups);
    }

    pub fn push_exclude(&mut self, storage_name: impl Into<String>, lookups: Vec<Lookup>) {
        self.excludes
            .entry(storage_name.into())
            .or_default()
            .extend(lookups);
    }

    /// The distinct storage names this plan filters on, positive and
    /// negative combined. Capability checks for stores that cannot combine
    /// fields key off this.
    pub fn filtered_fields(&self) -> IndexSet<&str> {
        self.filters
            .keys()
            .chain(self.excludes.keys())
            .map(String::as_str)
            .collect()
    }
}
